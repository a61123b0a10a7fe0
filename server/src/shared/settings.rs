//! Runtime settings store (§6 `GET/PUT /api/settings`) — a small JSON
//! projection of the mutable subset of `AppConfig`, written atomically via
//! temp-file + rename, matching the SRT/output-file write convention (A2/C5)
//! rather than inventing a second persistence mechanism for one file.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub cron_expr: String,
    pub target_language: String,
}

impl RuntimeSettings {
    fn validate(&self) -> Result<(), String> {
        if self.llm_api_url.trim().is_empty() {
            return Err("llm_api_url must not be empty".to_string());
        }
        if self.llm_model.trim().is_empty() {
            return Err("llm_model must not be empty".to_string());
        }
        if self.target_language.trim().is_empty() {
            return Err("target_language must not be empty".to_string());
        }
        if self.cron_expr.parse::<cron::Schedule>().is_err() {
            return Err(format!("invalid cron expression: {}", self.cron_expr));
        }
        Ok(())
    }
}

/// Guards the on-disk settings file; loaded once at startup, mutated only
/// through `update`, which validates, persists, then swaps the in-memory copy.
pub struct SettingsStore {
    path: String,
    current: RwLock<RuntimeSettings>,
}

impl SettingsStore {
    /// Loads `path` if present; otherwise seeds from `defaults` without
    /// writing (the file is created on the first successful `update`).
    pub async fn load_or_default(path: String, defaults: RuntimeSettings) -> Self {
        let loaded = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<RuntimeSettings>(&bytes).ok(),
            Err(_) => None,
        };
        Self {
            path,
            current: RwLock::new(loaded.unwrap_or(defaults)),
        }
    }

    pub async fn get(&self) -> RuntimeSettings {
        self.current.read().await.clone()
    }

    /// Validates, writes atomically (temp file + rename), then swaps the
    /// in-memory copy on success.
    pub async fn update(&self, new_settings: RuntimeSettings) -> Result<RuntimeSettings, String> {
        new_settings.validate()?;

        let body = serde_json::to_vec_pretty(&new_settings).map_err(|e| e.to_string())?;
        let tmp_path = format!("{}.tmp-{}", self.path, uuid::Uuid::new_v4());
        if let Some(parent) = std::path::Path::new(&self.path).parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        tokio::fs::write(&tmp_path, &body).await.map_err(|e| e.to_string())?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| e.to_string())?;

        *self.current.write().await = new_settings.clone();
        Ok(new_settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RuntimeSettings {
        RuntimeSettings {
            llm_api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            llm_api_key: "sk-test".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            cron_expr: "0 0 * * * *".to_string(),
            target_language: "zh".to_string(),
        }
    }

    #[tokio::test]
    async fn update_persists_and_rereads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json").to_string_lossy().to_string();
        let store = SettingsStore::load_or_default(path.clone(), sample()).await;

        let mut updated = sample();
        updated.target_language = "fr".to_string();
        store.update(updated.clone()).await.unwrap();

        let reloaded = SettingsStore::load_or_default(path, sample()).await;
        assert_eq!(reloaded.get().await.target_language, "fr");
    }

    #[tokio::test]
    async fn update_rejects_invalid_cron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json").to_string_lossy().to_string();
        let store = SettingsStore::load_or_default(path, sample()).await;

        let mut bad = sample();
        bad.cron_expr = "not a cron".to_string();
        assert!(store.update(bad).await.is_err());
    }
}
