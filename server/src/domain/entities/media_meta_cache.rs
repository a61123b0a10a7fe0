//! MediaMetaCache entity (§3) — subtitle-language coverage observed by the
//! video prober and directory scan, cached with a TTL so repeat scans don't
//! re-invoke ffprobe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaMetaCache {
    pub media_path: String,
    pub target_language: String,
    pub external_languages: Vec<String>,
    pub embedded_languages: Vec<String>,
    pub has_target_external: bool,
    pub has_target_embedded: bool,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaMetaCache {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
