use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{
        auth_callback_handler, auth_start_handler, index_handler, logout_handler,
        profile_handler, AppState,
    },
    session::SessionManager,
};

pub fn router(state: AppState, sessions: &SessionManager) -> Router {
    let app = Router::new()
        .route("/", get(index_handler))
        // Authentication routes
        .route("/auth/:provider", get(auth_start_handler))
        .route("/auth/:provider/callback", get(auth_callback_handler))
        // Session routes
        .route("/profile", get(profile_handler))
        .route("/logout", get(logout_handler).post(logout_handler))
        .with_state(state);

    sessions.apply(app).layer(TraceLayer::new_for_http())
}
