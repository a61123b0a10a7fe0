//! Presentation layer: the HTTP surface (C8) over the application services.

pub mod http;

pub use http::state::AppState;
