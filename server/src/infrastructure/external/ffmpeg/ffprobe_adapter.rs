//! FFprobe/FFmpeg-backed `VideoProbe` adapter (A3).
//!
//! Shells out to `ffprobe`/`ffmpeg` the way the teacher's `FFprobeAdapter`
//! shells out to `ffprobe`, narrowed to what the scanner and pipeline need:
//! embedded subtitle-track language codes, and extraction of the first
//! subtitle stream as SRT bytes when the pipeline has no external source
//! subtitle (§4.2, §4.4 step 2, §4.5 step 1).

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::domain::value_objects::Language;

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub embedded_languages: Vec<String>,
    pub extracted_srt: Option<Vec<u8>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ffprobe failed: {0}")]
    ExecutionFailed(String),
    #[error("timeout running ffprobe")]
    Timeout,
    #[error("parse error: {0}")]
    ParseError(String),
}

/// Out-of-scope collaborator (§1): opaque subprocess returning embedded
/// subtitle-track language codes and an extracted SRT byte stream.
#[async_trait]
pub trait VideoProbe: Send + Sync {
    async fn probe(&self, media_path: &str, target_lang: &str) -> Result<ProbeResult, ProbeError>;
}

pub struct FfprobeAdapter {
    timeout: Duration,
}

impl FfprobeAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_ffprobe(&self, args: &[&str]) -> Result<String, ProbeError> {
        let output = timeout(self.timeout, Command::new("ffprobe").args(args).output())
            .await
            .map_err(|_| ProbeError::Timeout)??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(ProbeError::ExecutionFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    fn subtitle_languages(json: &serde_json::Value) -> Vec<String> {
        json.get("streams")
            .and_then(|s| s.as_array())
            .map(|streams| {
                streams
                    .iter()
                    .filter(|s| s.get("codec_type").and_then(|c| c.as_str()) == Some("subtitle"))
                    .filter_map(|s| {
                        s.get("tags")
                            .and_then(|t| t.get("language"))
                            .and_then(|l| l.as_str())
                            .map(|l| Language::parse(l).base().to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Extracts the first subtitle stream as SRT bytes, in-memory via a pipe
    /// to stdout. Returns `None` when the media has no subtitle stream.
    async fn extract_first_subtitle(&self, media_path: &str) -> Result<Option<Vec<u8>>, ProbeError> {
        let output = timeout(
            self.timeout,
            Command::new("ffmpeg")
                .args([
                    "-v",
                    "quiet",
                    "-i",
                    media_path,
                    "-map",
                    "0:s:0",
                    "-c:s",
                    "srt",
                    "-f",
                    "srt",
                    "pipe:1",
                ])
                .output(),
        )
        .await
        .map_err(|_| ProbeError::Timeout)??;

        if output.status.success() && !output.stdout.is_empty() {
            Ok(Some(output.stdout))
        } else {
            Ok(None)
        }
    }
}

impl Default for FfprobeAdapter {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl VideoProbe for FfprobeAdapter {
    async fn probe(&self, media_path: &str, _target_lang: &str) -> Result<ProbeResult, ProbeError> {
        let args = &[
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            media_path,
        ];
        let json_str = self.run_ffprobe(args).await?;
        let json: serde_json::Value =
            serde_json::from_str(&json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

        let embedded_languages = Self::subtitle_languages(&json);
        let extracted_srt = if embedded_languages.is_empty() {
            None
        } else {
            self.extract_first_subtitle(media_path).await?
        };

        Ok(ProbeResult {
            embedded_languages,
            extracted_srt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtitle_languages_normalizes_aliases() {
        let json = serde_json::json!({
            "streams": [
                {"codec_type": "video"},
                {"codec_type": "subtitle", "tags": {"language": "eng"}},
                {"codec_type": "subtitle", "tags": {"language": "fre"}},
            ]
        });
        assert_eq!(FfprobeAdapter::subtitle_languages(&json), vec!["en", "fr"]);
    }
}
