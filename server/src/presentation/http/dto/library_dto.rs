//! Library DTOs (§6 `GET /api/library/items/{itemID}/episodes`).

use serde::Serialize;

use crate::domain::entities::{Episode, SubtitleCoverage, TranslationJob};
use crate::domain::value_objects::JobState;

/// An `Episode` decorated with the status of whatever job is currently
/// (or was most recently) translating it, joined on `media_path`.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeView {
    pub id: String,
    pub item_id: String,
    pub season: Option<u32>,
    pub name: String,
    pub media_path: String,
    pub subtitles: SubtitleCoverage,
    pub translatable: bool,
    pub in_progress: bool,
    pub job_status: Option<JobState>,
    pub job_source: Option<String>,
}

impl EpisodeView {
    pub fn decorate(episode: Episode, job: Option<&TranslationJob>) -> Self {
        let in_progress = matches!(job.map(|j| &j.status), Some(JobState::Pending) | Some(JobState::Running));
        Self {
            id: episode.id,
            item_id: episode.item_id,
            season: episode.season,
            name: episode.name,
            media_path: episode.media_path,
            subtitles: episode.subtitles,
            translatable: episode.translatable,
            in_progress,
            job_status: job.map(|j| j.status.clone()),
            job_source: job.map(|j| j.source.to_string()),
        }
    }
}

/// `GET /api/library/items/{itemID}/episodes` response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodesResponse {
    pub target_language: String,
    pub episodes: Vec<EpisodeView>,
}

/// Picks, for a given media path, the job most relevant to display: a
/// non-terminal one if present, otherwise the most recently updated job.
pub fn latest_job_for_media_path<'a>(jobs: &'a [TranslationJob], media_path: &str) -> Option<&'a TranslationJob> {
    let mut matching: Vec<&TranslationJob> = jobs.iter().filter(|j| j.payload.media_file == media_path).collect();
    if matching.is_empty() {
        return None;
    }
    matching.sort_by_key(|j| j.updated_at);
    if let Some(active) = matching.iter().rev().find(|j| !j.status.is_terminal()) {
        return Some(active);
    }
    matching.last().copied()
}
