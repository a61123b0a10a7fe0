//! Runtime settings handlers (§6 `GET/PUT /api/settings`).

use axum::extract::State;
use axum::Json;

use crate::presentation::http::state::AppState;
use crate::shared::error::CoreError;
use crate::shared::settings::RuntimeSettings;

pub async fn get_settings(State(state): State<AppState>) -> Json<RuntimeSettings> {
    Json(state.settings.get().await)
}

/// Persists the new settings, then re-registers the cron entry and pushes
/// the new target language into the scheduler, scanner, and pipeline so the
/// change takes effect without a restart (§9: re-registration must drop the
/// old cron entry before adding the new one).
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<RuntimeSettings>,
) -> Result<Json<RuntimeSettings>, CoreError> {
    let saved = state.settings.update(req).await.map_err(CoreError::BadRequest)?;

    state
        .scheduler
        .register(&saved.cron_expr, state.cancellation.child_token())
        .await
        .map_err(CoreError::BadRequest)?;

    state.scheduler.update_target_language(saved.target_language.clone()).await;
    state.scanner.update_target_language(saved.target_language.clone()).await;
    state.pipeline.update_target_language(saved.target_language.clone()).await;

    Ok(Json(saved))
}
