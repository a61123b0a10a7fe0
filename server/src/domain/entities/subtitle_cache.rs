//! SubtitleCache entity and the `SubtitleLine` grammar it stores (§3, A2).

use serde::{Deserialize, Serialize};

/// One line of a parsed subtitle file. The SRT codec (A2) is the default
/// concrete producer/consumer of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleLine {
    pub index: usize,
    pub start: String,
    pub end: String,
    pub text: String,
}

/// A cached, already-extracted subtitle (§3 SubtitleCache).
///
/// Key convention: `<media_path>|s:<stream_index>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleCache {
    pub cache_key: String,
    pub lines: Vec<SubtitleLine>,
    pub language: Option<String>,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_hint: Option<String>,
    pub is_temp: bool,
    pub job_id: Option<String>,
}

impl SubtitleCache {
    pub fn cache_key_for(media_path: &str, stream_index: usize) -> String {
        format!("{media_path}|s:{stream_index}")
    }
}
