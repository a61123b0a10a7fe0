//! `AppConfig` — startup environment loading (§6, A1).
//!
//! `LLM_API_KEY` absence is a fatal startup error. Every other variable
//! falls back to a documented default; a malformed numeric/duration value
//! is logged as a warning and replaced by the default rather than panicking.

use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct MediaRoot {
    pub id: String,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm_api_key: String,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub llm_timeout: Duration,

    pub search_api_key: Option<String>,
    pub search_api_url: String,

    pub cron_expr: String,
    pub target_language: String,

    pub media_roots: Vec<MediaRoot>,

    pub agent_max_iterations: usize,
    pub agent_bundle_concurrency: usize,

    pub data_dir: String,
    pub settings_file: String,

    pub ui_static_dir: Option<String>,

    pub port: u16,
    pub queue_workers: usize,
    pub scanner_source_ttl_secs: u64,
    pub scanner_item_ttl_secs: u64,
    pub scanner_episode_ttl_secs: u64,
    pub scanner_max_concurrency: usize,
}

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "malformed config value, using default");
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    /// Loads configuration from the environment. Returns an error string
    /// (not a panic) when a required variable is absent so the caller can
    /// log and exit cleanly (A1).
    pub fn from_env() -> Result<Self, String> {
        let llm_api_key =
            std::env::var("LLM_API_KEY").map_err(|_| "LLM_API_KEY is required but not set".to_string())?;

        let mut media_roots = Vec::new();
        for (env_key, id, name) in [
            ("MOVIE_DIR", "movies", "Movies"),
            ("TV_DIR", "tv", "TV Shows"),
            ("ANIME_DIR", "anime", "Anime"),
        ] {
            let default_path = format!("/movies/{id}");
            let path = env_or_default(env_key, &default_path);
            media_roots.push(MediaRoot {
                id: id.to_string(),
                name: name.to_string(),
                path,
            });
        }

        Ok(Self {
            llm_api_key,
            llm_api_url: env_or_default(
                "LLM_API_URL",
                "https://api.openai.com/v1/chat/completions",
            ),
            llm_model: env_or_default("LLM_MODEL", "gpt-4o-mini"),
            llm_max_tokens: env_parse_or_default("LLM_MAX_TOKENS", 4096),
            llm_temperature: env_parse_or_default("LLM_TEMPERATURE", 0.2),
            llm_timeout: Duration::from_secs(env_parse_or_default("LLM_TIMEOUT", 120)),

            search_api_key: std::env::var("SEARCH_API_KEY").ok(),
            search_api_url: env_or_default("SEARCH_API_URL", "https://api.tavily.com/search"),

            // The `cron` crate's `Schedule` parser requires a leading
            // seconds field (sec min hour dom month dow); "0 0 0 * * *" is
            // the 6-field equivalent of the conventional 5-field "daily at
            // midnight" expression.
            cron_expr: env_or_default("CRON_EXPR", "0 0 0 * * *"),
            target_language: env_or_default("TARGET_LANGUAGE", "zh"),

            media_roots,

            agent_max_iterations: env_parse_or_default("AGENT_MAX_ITERATIONS", 10),
            agent_bundle_concurrency: env_parse_or_default("AGENT_BUNDLE_CONCURRENCY", 1),

            data_dir: env_or_default("DATA_DIR", "/app/data"),
            settings_file: env_or_default("SETTINGS_FILE", "/app/config/settings.json"),

            ui_static_dir: std::env::var("UI_STATIC_DIR").ok(),

            port: env_parse_or_default("PORT", 8080),
            queue_workers: env_parse_or_default("QUEUE_WORKERS", 2),
            scanner_source_ttl_secs: env_parse_or_default("SCANNER_SOURCE_TTL_SECS", 60),
            scanner_item_ttl_secs: env_parse_or_default("SCANNER_ITEM_TTL_SECS", 30),
            scanner_episode_ttl_secs: env_parse_or_default("SCANNER_EPISODE_TTL_SECS", 10),
            scanner_max_concurrency: env_parse_or_default("SCANNER_MAX_CONCURRENCY", 8),
        })
    }

    pub fn database_path(&self) -> String {
        format!("{}/ctxtrans.db", self.data_dir.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_numeric_falls_back_to_default() {
        std::env::set_var("AGENT_MAX_ITERATIONS_TEST_KEY", "not-a-number");
        let value: usize = env_parse_or_default("AGENT_MAX_ITERATIONS_TEST_KEY", 10);
        assert_eq!(value, 10);
        std::env::remove_var("AGENT_MAX_ITERATIONS_TEST_KEY");
    }
}
