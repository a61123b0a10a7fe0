//! Scan handler (§6 `POST /api/scan`).

use axum::extract::State;
use axum::http::StatusCode;

use crate::presentation::http::state::AppState;

/// Invalidates the scanner's source/item/episode caches. The next read of
/// any library endpoint re-walks the configured roots.
pub async fn trigger_scan(State(state): State<AppState>) -> StatusCode {
    state.scanner.invalidate();
    StatusCode::ACCEPTED
}
