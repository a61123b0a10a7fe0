//! Router assembly (§6 External Interfaces) — wires every handler onto its
//! path, applies CORS and request logging, and mounts the SPA fallback last
//! so it never shadows an API route.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handlers, job_handlers, library_handlers, scan_handlers, settings_handlers, spa_handlers};
use super::middleware::cors::cors_layer;
use super::middleware::logging::logging_middleware;
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/library/sources", get(library_handlers::list_sources))
        .route("/api/library/items", get(library_handlers::list_items))
        .route("/api/library/items/:item_id/episodes", get(library_handlers::list_episodes))
        .route("/api/jobs", get(job_handlers::list_jobs).post(job_handlers::enqueue_job))
        .route("/api/jobs/stream", get(job_handlers::stream_jobs))
        .route("/api/jobs/:id", get(job_handlers::job_detail))
        .route("/api/jobs/:id/lines", put(job_handlers::update_lines))
        .route("/api/scan", post(scan_handlers::trigger_scan))
        .route("/api/settings", get(settings_handlers::get_settings).put(settings_handlers::update_settings))
        .route("/healthz", get(health_handlers::health_check));

    Router::new()
        .merge(api)
        .fallback(spa_handlers::spa_fallback)
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
