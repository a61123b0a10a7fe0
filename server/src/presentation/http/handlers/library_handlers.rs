//! Library handlers (§6 `GET /api/library/sources|items|items/{itemID}/episodes`).

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::domain::entities::{Item, Source};
use crate::presentation::http::dto::library_dto::{latest_job_for_media_path, EpisodeView, EpisodesResponse};
use crate::presentation::http::state::AppState;
use crate::shared::error::CoreError;

pub async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<Source>>, CoreError> {
    let sources = state.scanner.scan_sources().await?;
    Ok(Json(sources))
}

#[derive(Debug, serde::Deserialize)]
pub struct ItemsQuery {
    pub source: Option<String>,
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<Vec<Item>>, CoreError> {
    let mut items = Vec::new();
    match query.source {
        Some(source_id) => items.extend(state.scanner.scan_items(&source_id).await?),
        None => {
            for source in state.scanner.scan_sources().await? {
                items.extend(state.scanner.scan_items(&source.id).await?);
            }
        }
    }
    Ok(Json(items))
}

pub async fn list_episodes(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<EpisodesResponse>, CoreError> {
    let episodes = state.scanner.scan_episodes_by_item(&item_id).await?;
    let jobs = state.queue.list().await;

    let views = episodes
        .into_iter()
        .map(|episode| {
            let job = latest_job_for_media_path(&jobs, &episode.media_path);
            EpisodeView::decorate(episode, job)
        })
        .collect();

    Ok(Json(EpisodesResponse { target_language: state.scanner.target_language().await, episodes: views }))
}
