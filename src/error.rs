use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("OAuth2 state mismatch")]
    StateMismatch,

    #[error("Missing OAuth2 authorization code")]
    MissingAuthCode,

    #[error("Provider denied authorization: {0}")]
    ProviderDenied(String),

    #[error("Failed to exchange code for token: {0}")]
    TokenExchange(String),

    #[error("Failed to fetch user profile: {0}")]
    ProfileFetch(String),

    #[error("Unknown OAuth2 provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid session")]
    InvalidSession,
}

/// Errors raised while loading the credential store.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppError {
    fn server_error(status: StatusCode, error: &str, message: &str) -> Response {
        (
            status,
            Json(json!({
                "error": error,
                "message": message,
            })),
        )
            .into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Auth(AuthError::UnknownProvider(ref name)) => {
                tracing::warn!("Login requested for unknown provider: {}", name);
                StatusCode::NOT_FOUND.into_response()
            }

            // Provider-side failures go back to the home page without detail
            AppError::Auth(ref auth_error) => {
                tracing::warn!("Authentication failed, redirecting home: {}", auth_error);
                Redirect::to("/").into_response()
            }

            AppError::Database(ref db_error) => {
                tracing::error!("Database error: {}", db_error);
                Self::server_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error",
                    "A database error occurred. Please try again later.",
                )
            }

            AppError::Template(ref template_error) => {
                tracing::error!("Template error: {}", template_error);
                Self::server_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Template error",
                    "A page rendering error occurred.",
                )
            }

            AppError::Http(ref http_error) => {
                tracing::error!("HTTP client error: {}", http_error);
                Self::server_error(
                    StatusCode::BAD_GATEWAY,
                    "External service error",
                    "Failed to communicate with external service. Please try again later.",
                )
            }

            AppError::Config(ref config_error) => {
                tracing::error!("Configuration error: {}", config_error);
                Self::server_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error",
                    "Server configuration error.",
                )
            }

            AppError::Migration(ref migration_error) => {
                tracing::error!("Migration error: {}", migration_error);
                Self::server_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database migration error",
                    "Database initialization failed.",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn location(response: &Response) -> &str {
        response.headers().get("location").unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_state_mismatch_redirects_home() {
        let response = AppError::Auth(AuthError::StateMismatch).into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_token_exchange_failure_hides_detail() {
        let error = AppError::Auth(AuthError::TokenExchange("invalid_grant".to_string()));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_provider_denied_redirects_home() {
        let error = AppError::Auth(AuthError::ProviderDenied("access_denied".to_string()));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_unknown_provider_returns_404() {
        let error = AppError::Auth(AuthError::UnknownProvider("twitter".to_string()));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_database_error_returns_500() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_template_error_returns_500() {
        let error = AppError::Template(askama::Error::Fmt(std::fmt::Error));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_config_error_returns_500() {
        let error = AppError::Config(ConfigError::MissingEnvVar("SESSION_SECRET"));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::StateMismatch.to_string(), "OAuth2 state mismatch");
        assert_eq!(
            AuthError::ProfileFetch("HTTP 401".to_string()).to_string(),
            "Failed to fetch user profile: HTTP 401"
        );
        assert_eq!(
            ConfigError::MissingEnvVar("GITHUB_CLIENT_ID").to_string(),
            "missing environment variable: GITHUB_CLIENT_ID"
        );
    }

    #[test]
    fn test_app_error_from_conversions() {
        let app_error: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(app_error, AppError::Database(_)));

        let app_error: AppError = AuthError::InvalidSession.into();
        assert!(matches!(app_error, AppError::Auth(_)));

        let app_error: AppError = ConfigError::Invalid("bad".to_string()).into();
        assert!(matches!(app_error, AppError::Config(_)));
    }
}
