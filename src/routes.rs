// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{ledger, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Every route requires a bearer token.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (stores, live sessions, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/sessions", post(quiz::start_session))
        .route(
            "/sessions/{id}",
            get(quiz::get_session).delete(quiz::close_session),
        )
        .route("/sessions/{id}/answers", put(quiz::select_answer))
        .route("/sessions/{id}/advance", post(quiz::advance))
        .route("/sessions/{id}/retreat", post(quiz::retreat))
        .route("/sessions/{id}/submit", post(quiz::submit))
        .route("/sessions/{id}/retake", post(quiz::retake))
        .route("/sessions/{id}/acknowledge", post(quiz::acknowledge))
        .route("/sessions/{id}/attempts", get(quiz::list_attempts));

    let ledger_routes = Router::new().route("/balance", get(ledger::get_balance));

    Router::new()
        .nest("/api/quiz", quiz_routes)
        .nest("/api/ledger", ledger_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
