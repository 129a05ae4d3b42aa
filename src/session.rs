use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::{cookie::Key, MemoryStore, Session, SessionManagerLayer};

use crate::{
    error::{AppError, AuthError, ConfigError},
    handlers::AppState,
    models::User,
    provider::Provider,
};

// Session keys
const USER_SESSION_KEY: &str = "user";
const PENDING_LOGIN_KEY: &str = "pending_login";

pub const SESSION_COOKIE_NAME: &str = "oauth_profile_session";

#[derive(Clone)]
pub struct SessionManager {
    store: MemoryStore,
    key: Key,
    secure: bool,
}

impl SessionManager {
    /// Derives the cookie signing key from `secret`, which must be at least
    /// 64 bytes long.
    pub fn new(secret: &str, secure: bool) -> Result<Self, ConfigError> {
        let key = Key::try_from(secret.as_bytes()).map_err(|e| {
            ConfigError::Invalid(format!("SESSION_SECRET cannot be used as a key: {}", e))
        })?;

        Ok(Self {
            store: MemoryStore::default(),
            key,
            secure,
        })
    }

    /// Wraps `router` in the session layer.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let layer = SessionManagerLayer::new(self.store.clone())
            .with_secure(self.secure)
            .with_same_site(tower_sessions::cookie::SameSite::Lax)
            .with_http_only(true)
            .with_name(SESSION_COOKIE_NAME)
            .with_signed(self.key.clone());

        router.layer(layer)
    }
}

/// Login started by `/auth/{provider}` and awaiting its callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub provider: Provider,
    pub csrf_state: String,
}

// Session extension trait for easier session management
pub trait SessionExt {
    async fn get_user(&self) -> Result<Option<User>, AppError>;
    async fn bind_user(&self, user: &User) -> Result<(), AppError>;
    async fn begin_login(&self, pending: PendingLogin) -> Result<(), AppError>;
    async fn take_pending_login(&self) -> Result<Option<PendingLogin>, AppError>;
    async fn end(&self) -> Result<(), AppError>;
}

impl SessionExt for Session {
    async fn get_user(&self) -> Result<Option<User>, AppError> {
        self.get::<User>(USER_SESSION_KEY).await.map_err(|e| {
            tracing::error!("Failed to get user session: {}", e);
            AppError::Auth(AuthError::InvalidSession)
        })
    }

    async fn bind_user(&self, user: &User) -> Result<(), AppError> {
        // New id on login so a pre-login cookie cannot ride the session
        self.cycle_id().await.map_err(|e| {
            tracing::error!("Failed to cycle session id: {}", e);
            AppError::Auth(AuthError::InvalidSession)
        })?;

        self.insert(USER_SESSION_KEY, user).await.map_err(|e| {
            tracing::error!("Failed to set user session: {}", e);
            AppError::Auth(AuthError::InvalidSession)
        })?;

        tracing::info!("User session created for user ID: {}", user.id);
        Ok(())
    }

    async fn begin_login(&self, pending: PendingLogin) -> Result<(), AppError> {
        self.insert(PENDING_LOGIN_KEY, pending).await.map_err(|e| {
            tracing::error!("Failed to store pending login: {}", e);
            AppError::Auth(AuthError::InvalidSession)
        })
    }

    async fn take_pending_login(&self) -> Result<Option<PendingLogin>, AppError> {
        self.remove::<PendingLogin>(PENDING_LOGIN_KEY)
            .await
            .map_err(|e| {
                tracing::error!("Failed to read pending login: {}", e);
                AppError::Auth(AuthError::InvalidSession)
            })
    }

    async fn end(&self) -> Result<(), AppError> {
        self.flush().await.map_err(|e| {
            tracing::error!("Failed to clear session: {}", e);
            AppError::Auth(AuthError::InvalidSession)
        })?;

        tracing::info!("User session cleared");
        Ok(())
    }
}

/// Extracts the user bound to the session, or redirects to the login route.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let login_route = AppState::from_ref(state).variant.login_route();

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match session.get_user().await {
            Ok(Some(user)) => Ok(AuthenticatedUser(user)),
            Ok(None) => {
                tracing::debug!("No authenticated user, redirecting to {}", login_route);
                Err(Redirect::to(login_route).into_response())
            }
            Err(e) => Err(e.into_response()),
        }
    }
}
