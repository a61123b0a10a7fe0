//! TranslationJob and BatchCheckpoint (§3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::JobState;

/// `source` discriminant on a `TranslationJob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Cron,
    Manual,
}

impl std::fmt::Display for JobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobSource::Cron => write!(f, "cron"),
            JobSource::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(JobSource::Cron),
            "manual" => Ok(JobSource::Manual),
            other => Err(format!("unknown job source: {other}")),
        }
    }
}

/// The bundle a job was created to translate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub media_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfo_file: Option<String>,
}

/// A durable, resumable translation job (§3 TranslationJob).
///
/// Identity: `id` (`job-<N>`). Natural key: `dedupe_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationJob {
    pub id: String,
    pub dedupe_key: String,
    pub source: JobSource,
    pub payload: JobPayload,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranslationJob {
    /// Computes the canonical dedupe key: `media_path | subtitle_path | target_language`.
    pub fn dedupe_key(media_path: &str, subtitle_path: Option<&str>, target_language: &str) -> String {
        format!(
            "{} | {} | {}",
            media_path,
            subtitle_path.unwrap_or("[embedded]"),
            target_language
        )
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Inbound shape for `POST /api/jobs` and cron-driven enqueue (§4.4/§6).
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    pub media_path: String,
    #[serde(default)]
    pub subtitle_path: Option<String>,
    #[serde(default)]
    pub nfo_path: Option<String>,
    /// Target language for this enqueue; the HTTP layer fills this from
    /// runtime settings when the caller omits it.
    #[serde(default)]
    pub target_language: Option<String>,
}

/// A per-batch checkpoint of already-translated lines (§3 BatchCheckpoint).
///
/// Invariant: `texts.len() == batch_end - batch_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    pub job_id: String,
    pub batch_start: usize,
    pub batch_end: usize,
    pub texts: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl BatchCheckpoint {
    pub fn len(&self) -> usize {
        self.batch_end - self.batch_start
    }

    pub fn is_empty(&self) -> bool {
        self.batch_start == self.batch_end
    }
}
