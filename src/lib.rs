pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod reconcile;
pub mod routes;
pub mod session;
pub mod templates;

pub use auth::{AuthService, OAuth2Config};
pub use config::{Config, ProviderSettings, Variant};
pub use database::{Database, UserRepository};
pub use error::{AppError, AuthError, ConfigError};
pub use handlers::AppState;
pub use models::{ProviderIdentity, User};
pub use provider::{Provider, ProviderEndpoints};
pub use reconcile::IdentityReconciler;
pub use routes::router;
pub use session::{AuthenticatedUser, SessionExt, SessionManager};
