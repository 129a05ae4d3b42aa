use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use oauth2::CsrfToken;
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    auth::AuthService,
    config::Variant,
    error::{AppError, AuthError},
    session::{AuthenticatedUser, PendingLogin, SessionExt},
    templates::{IndexTemplate, ProfileTemplate},
};

// Application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub variant: Variant,
}

// Query parameters for OAuth2 callbacks
#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn index_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let template = IndexTemplate::new(state.auth_service.providers());
    let html = template.render()?;
    Ok(Html(html))
}

pub async fn auth_start_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let provider = state.auth_service.enabled_provider(&provider)?;
    let (auth_url, csrf_token) = state.auth_service.authorize_url(provider)?;

    session
        .begin_login(PendingLogin {
            provider,
            csrf_state: csrf_token.secret().clone(),
        })
        .await?;

    tracing::debug!("Redirecting to {} consent screen", provider.label());
    Ok(Redirect::to(&auth_url))
}

pub async fn auth_callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<AuthCallbackQuery>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let provider = state.auth_service.enabled_provider(&provider)?;

    // Consumed up front so a failed callback cannot be replayed
    let pending = session.take_pending_login().await?;

    if let Some(error) = query.error {
        tracing::warn!("{} OAuth2 error: {}", provider.label(), error);
        return Err(AuthError::ProviderDenied(error).into());
    }

    let code = query.code.ok_or(AuthError::MissingAuthCode)?;
    let state_param = query.state.ok_or(AuthError::StateMismatch)?;
    let pending = pending
        .filter(|pending| pending.provider == provider)
        .ok_or(AuthError::StateMismatch)?;

    let user = state
        .auth_service
        .handle_callback(provider, code, state_param, CsrfToken::new(pending.csrf_state))
        .await?;

    session.bind_user(&user).await?;

    tracing::info!(
        "User {} successfully authenticated via {}",
        user.id,
        provider.label()
    );
    Ok(Redirect::to("/profile"))
}

pub async fn profile_handler(
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let html = ProfileTemplate::new(&user).render()?;
    Ok(Html(html))
}

pub async fn logout_handler(State(state): State<AppState>, session: Session) -> Response {
    match session.end().await {
        Ok(()) => {
            tracing::info!("User logged out successfully");
            Redirect::to(state.variant.logout_redirect()).into_response()
        }
        Err(e) => {
            tracing::error!("Logout failed: {}", e);
            Redirect::to("/").into_response()
        }
    }
}
