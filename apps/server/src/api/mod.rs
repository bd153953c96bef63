//! API layer - routes, handlers, and middleware

pub mod handlers;
pub mod middleware;

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.server.cors_origins.clone();
    let dashboard_path = state.config.smart.dashboard_path.clone();

    let api = Router::new()
        .route("/patient", get(handlers::patient))
        .route(
            "/vitals",
            get(handlers::list_vitals).post(handlers::create_vitals),
        )
        .route("/vitals/catalogue", get(handlers::catalogue))
        .route("/vitals/check", get(handlers::check))
        .route("/allergies", get(handlers::allergies));

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(info))
        .route("/favicon.ico", get(favicon))
        // EHR launch URL; `/` accepts the same parameters
        .route("/", get(handlers::launch))
        .route("/launch", get(handlers::launch))
        .route("/callback", get(handlers::callback))
        .route(&dashboard_path, get(handlers::dashboard))
        .nest("/api", api)
        .with_state(state)
        // Applied in reverse order
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors(&cors_origins))
        .layer(middleware::trace())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "bedside-server"
    }))
}

async fn info(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let smart = state.smart_config();
    let authorized = state
        .client(&jar)
        .is_ok_and(|client| client.session().is_ok());
    (
        StatusCode::OK,
        Json(json!({
            "server": "Bedside SMART launcher",
            "version": env!("CARGO_PKG_VERSION"),
            "clientId": smart.client_id,
            "redirectUri": smart.redirect_uri,
            "authorized": authorized,
            "activeSessions": state.sessions.len()
        })),
    )
}

async fn favicon() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
