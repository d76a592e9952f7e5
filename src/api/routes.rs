use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{health, tasks};
use super::state::AppState;

/// Thin optional wrapper (spec §6): `POST /tasks`, `GET /tasks/:id`,
/// pause/resume/abort, `GET /healthz`. The agent core has no HTTP
/// dependency; this only exists so the crate is runnable as a standalone
/// sidecar, the way the teacher's own binary runs a local-only server.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:1420".parse::<HeaderValue>().unwrap(),
            "http://localhost:5173".parse::<HeaderValue>().unwrap(),
            "http://127.0.0.1:1420".parse::<HeaderValue>().unwrap(),
            "http://127.0.0.1:5173".parse::<HeaderValue>().unwrap(),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/healthz", get(health::health_check))
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/:id", get(tasks::get_task))
        .route("/tasks/:id/pause", post(tasks::pause_task))
        .route("/tasks/:id/resume", post(tasks::resume_task))
        .route("/tasks/:id/abort", post(tasks::abort_task))
        .layer(cors)
        .with_state(state)
}
