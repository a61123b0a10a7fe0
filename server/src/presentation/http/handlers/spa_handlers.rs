//! SPA fallback handler (§6 `GET /...`).
//!
//! Any path whose basename contains no `.` is treated as a client-side
//! route and gets `index.html`; anything else is served as a static asset
//! if present, falling back to `index.html`, and 404s when no UI directory
//! is configured at all.

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::presentation::http::state::AppState;

fn looks_like_route(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or("");
    !basename.contains('.')
}

async fn serve_file(path: &std::path::Path) -> Option<Response> {
    let bytes = tokio::fs::read(path).await.ok()?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some(([(header::CONTENT_TYPE, mime.as_ref().to_string())], bytes).into_response())
}

pub async fn spa_fallback(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(root) = &state.ui_static_dir else {
        return (StatusCode::NOT_FOUND, "ui disabled").into_response();
    };

    let index_path = root.join("index.html");
    let request_path = uri.path().trim_start_matches('/');

    if looks_like_route(request_path) {
        return serve_file(&index_path)
            .await
            .unwrap_or_else(|| (StatusCode::NOT_FOUND, "ui assets not found").into_response());
    }

    let traversal = std::path::Path::new(request_path).components().any(|c| matches!(c, std::path::Component::ParentDir));
    if !traversal {
        let asset_path = root.join(request_path);
        if let Some(response) = serve_file(&asset_path).await {
            return response;
        }
    }

    serve_file(&index_path).await.unwrap_or_else(|| (StatusCode::NOT_FOUND, "ui assets not found").into_response())
}
