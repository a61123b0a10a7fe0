//! CORS Middleware
//!
//! Configures Cross-Origin Resource Sharing for the HTTP surface (C8). The
//! daemon has no browser-facing session cookies of its own; the permissive
//! origin predicate exists so the bundled SPA can be served from a
//! different dev-server port than the API during development.

use std::time::Duration;

use axum::http::{header, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |_, _| true))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
