//! Job DTOs (§6 `POST/GET /api/jobs`, `GET /api/jobs/{id}`, `PUT /api/jobs/{id}/lines`).

use serde::{Deserialize, Serialize};

use crate::domain::entities::TranslationJob;

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueResponse {
    pub created: bool,
    pub job: TranslationJob,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobDetailQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub translated: usize,
    pub total: usize,
    pub percent: f64,
}

impl Progress {
    pub fn compute(translated: usize, total: usize) -> Self {
        let percent = if total == 0 { 0.0 } else { (translated as f64 / total as f64) * 100.0 };
        Self { translated: translated.min(total.max(translated)), total, percent }
    }
}

/// The bundle this job translates, projected for display — not the fuller
/// scanner `Episode` (a job has no item/source linkage of its own; only
/// the media/subtitle/nfo paths it was created with).
#[derive(Debug, Clone, Serialize)]
pub struct JobEpisodeView {
    pub media_path: String,
    pub subtitle_path: Option<String>,
    pub nfo_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewLine {
    pub index: usize,
    pub original_text: String,
    pub translated_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobDetailResponse {
    pub job: TranslationJob,
    pub target_language: String,
    pub progress: Progress,
    pub episode: JobEpisodeView,
    pub preview: Vec<PreviewLine>,
    pub preview_offset: usize,
    pub preview_limit: usize,
    pub editable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditLine {
    pub index: usize,
    pub translated_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditLinesRequest {
    pub lines: Vec<EditLine>,
}
