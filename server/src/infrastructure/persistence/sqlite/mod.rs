//! `SqlitePersistenceStore` — the concrete `PersistenceStore` (§4.1) over
//! the single-writer WAL pool in `infrastructure::database`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

use crate::domain::entities::{
    BatchCheckpoint, JobPayload, JobSource, MediaMetaCache, SubtitleCache, SubtitleLine, TranslationJob,
};
use crate::domain::repositories::PersistenceStore;
use crate::domain::value_objects::JobState;
use crate::shared::error::StoreError;

pub struct SqlitePersistenceStore {
    pool: Pool<Sqlite>,
}

impl SqlitePersistenceStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<TranslationJob, StoreError> {
    let status_raw: String = row.try_get("status").map_err(|e| StoreError::Database(e.to_string()))?;
    let source_raw: String = row.try_get("source").map_err(|e| StoreError::Database(e.to_string()))?;
    let payload_raw: String = row.try_get("payload").map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(TranslationJob {
        id: row.try_get("id").map_err(|e| StoreError::Database(e.to_string()))?,
        dedupe_key: row
            .try_get("dedupe_key")
            .map_err(|e| StoreError::Database(e.to_string()))?,
        source: JobSource::from_str(&source_raw).map_err(StoreError::Database)?,
        payload: serde_json::from_str::<JobPayload>(&payload_raw)?,
        status: JobState::from_str(&status_raw).map_err(StoreError::Database)?,
        error_message: row
            .try_get("error_message")
            .map_err(|e| StoreError::Database(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Database(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StoreError::Database(e.to_string()))?,
    })
}

#[async_trait]
impl PersistenceStore for SqlitePersistenceStore {
    async fn load_jobs(&self) -> Result<Vec<TranslationJob>, StoreError> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_job).collect()
    }

    async fn upsert_job(&self, job: &TranslationJob) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&job.payload)?;
        sqlx::query(
            r#"
            INSERT INTO jobs (id, dedupe_key, source, payload, status, error_message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                dedupe_key = excluded.dedupe_key,
                source = excluded.source,
                payload = excluded.payload,
                status = excluded.status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&job.id)
        .bind(&job.dedupe_key)
        .bind(job.source.to_string())
        .bind(payload)
        .bind(job.status.to_string())
        .bind(&job.error_message)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_job_data(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM job_batch_checkpoints WHERE job_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM subtitle_cache WHERE job_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_batch_checkpoint(&self, checkpoint: &BatchCheckpoint) -> Result<(), StoreError> {
        let texts = serde_json::to_string(&checkpoint.texts)?;
        sqlx::query(
            r#"
            INSERT INTO job_batch_checkpoints (job_id, batch_start, batch_end, texts, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(job_id, batch_start, batch_end) DO UPDATE SET
                texts = excluded.texts,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&checkpoint.job_id)
        .bind(checkpoint.batch_start as i64)
        .bind(checkpoint.batch_end as i64)
        .bind(texts)
        .bind(checkpoint.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_batch_checkpoints(&self, job_id: &str) -> Result<Vec<BatchCheckpoint>, StoreError> {
        let rows = sqlx::query(
            "SELECT job_id, batch_start, batch_end, texts, updated_at FROM job_batch_checkpoints \
             WHERE job_id = ? ORDER BY batch_start ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let texts_raw: String = row.try_get("texts").map_err(|e| StoreError::Database(e.to_string()))?;
                Ok(BatchCheckpoint {
                    job_id: row
                        .try_get("job_id")
                        .map_err(|e| StoreError::Database(e.to_string()))?,
                    batch_start: row
                        .try_get::<i64, _>("batch_start")
                        .map_err(|e| StoreError::Database(e.to_string()))? as usize,
                    batch_end: row
                        .try_get::<i64, _>("batch_end")
                        .map_err(|e| StoreError::Database(e.to_string()))? as usize,
                    texts: serde_json::from_str(&texts_raw)?,
                    updated_at: row
                        .try_get("updated_at")
                        .map_err(|e| StoreError::Database(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn clear_job_temp(&self, job_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM job_batch_checkpoints WHERE job_id = ?")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM subtitle_cache WHERE job_id = ? AND is_temp = 1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put_subtitle_cache(&self, entry: &SubtitleCache) -> Result<(), StoreError> {
        let lines = serde_json::to_string(&entry.lines)?;
        sqlx::query(
            r#"
            INSERT INTO subtitle_cache (cache_key, lines, language, format, path_hint, is_temp, job_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                lines = excluded.lines,
                language = excluded.language,
                format = excluded.format,
                path_hint = excluded.path_hint,
                is_temp = excluded.is_temp,
                job_id = excluded.job_id
            "#,
        )
        .bind(&entry.cache_key)
        .bind(lines)
        .bind(&entry.language)
        .bind(&entry.format)
        .bind(&entry.path_hint)
        .bind(entry.is_temp)
        .bind(&entry.job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_subtitle_cache(&self, cache_key: &str) -> Result<Option<SubtitleCache>, StoreError> {
        let row = sqlx::query("SELECT * FROM subtitle_cache WHERE cache_key = ?")
            .bind(cache_key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let lines_raw: String = row.try_get("lines").map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Some(SubtitleCache {
            cache_key: row
                .try_get("cache_key")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            lines: serde_json::from_str::<Vec<SubtitleLine>>(&lines_raw)?,
            language: row
                .try_get("language")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            format: row
                .try_get("format")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            path_hint: row
                .try_get("path_hint")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            is_temp: row
                .try_get("is_temp")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            job_id: row
                .try_get("job_id")
                .map_err(|e| StoreError::Database(e.to_string()))?,
        }))
    }

    async fn put_media_meta_cache(&self, entry: &MediaMetaCache) -> Result<(), StoreError> {
        let external = serde_json::to_string(&entry.external_languages)?;
        let embedded = serde_json::to_string(&entry.embedded_languages)?;
        sqlx::query(
            r#"
            INSERT INTO media_meta_cache
                (media_path, target_language, external_languages, embedded_languages,
                 has_target_external, has_target_embedded, expires_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(media_path, target_language) DO UPDATE SET
                external_languages = excluded.external_languages,
                embedded_languages = excluded.embedded_languages,
                has_target_external = excluded.has_target_external,
                has_target_embedded = excluded.has_target_embedded,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.media_path)
        .bind(&entry.target_language)
        .bind(external)
        .bind(embedded)
        .bind(entry.has_target_external)
        .bind(entry.has_target_embedded)
        .bind(entry.expires_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_media_meta_cache(
        &self,
        media_path: &str,
        target_language: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MediaMetaCache>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM media_meta_cache WHERE media_path = ? AND target_language = ? AND expires_at > ?",
        )
        .bind(media_path)
        .bind(target_language)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let external_raw: String = row
            .try_get("external_languages")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let embedded_raw: String = row
            .try_get("embedded_languages")
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Some(MediaMetaCache {
            media_path: row
                .try_get("media_path")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            target_language: row
                .try_get("target_language")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            external_languages: serde_json::from_str(&external_raw)?,
            embedded_languages: serde_json::from_str(&embedded_raw)?,
            has_target_external: row
                .try_get("has_target_external")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            has_target_embedded: row
                .try_get("has_target_embedded")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            expires_at: row
                .try_get("expires_at")
                .map_err(|e| StoreError::Database(e.to_string()))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| StoreError::Database(e.to_string()))?,
        }))
    }

    async fn delete_expired_media_meta_cache(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM media_meta_cache WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::JobPayload;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqlitePersistenceStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::infrastructure::database::initialize_schema(&pool).await.unwrap();
        SqlitePersistenceStore::new(pool)
    }

    fn sample_job(id: &str) -> TranslationJob {
        let now = Utc::now();
        TranslationJob {
            id: id.to_string(),
            dedupe_key: format!("{id}-key"),
            source: JobSource::Manual,
            payload: JobPayload {
                media_file: "/lib/ep01.mkv".to_string(),
                subtitle_file: Some("/lib/ep01.srt".to_string()),
                nfo_file: None,
            },
            status: JobState::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_and_load_round_trips() {
        let store = test_store().await;
        let job = sample_job("job-1");
        store.upsert_job(&job).await.unwrap();

        let loaded = store.load_jobs().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "job-1");
        assert_eq!(loaded[0].status, JobState::Pending);
    }

    #[tokio::test]
    async fn checkpoints_are_ordered_by_batch_start() {
        let store = test_store().await;
        for (start, end) in [(50, 100), (0, 50), (100, 150)] {
            store
                .save_batch_checkpoint(&BatchCheckpoint {
                    job_id: "job-1".to_string(),
                    batch_start: start,
                    batch_end: end,
                    texts: vec!["x".to_string(); end - start],
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let loaded = store.load_batch_checkpoints("job-1").await.unwrap();
        let starts: Vec<usize> = loaded.iter().map(|c| c.batch_start).collect();
        assert_eq!(starts, vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn clear_job_temp_removes_checkpoints_and_temp_subtitles_only() {
        let store = test_store().await;
        store
            .save_batch_checkpoint(&BatchCheckpoint {
                job_id: "job-1".to_string(),
                batch_start: 0,
                batch_end: 1,
                texts: vec!["x".to_string()],
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .put_subtitle_cache(&SubtitleCache {
                cache_key: "temp".to_string(),
                lines: vec![],
                language: None,
                format: "srt".to_string(),
                path_hint: None,
                is_temp: true,
                job_id: Some("job-1".to_string()),
            })
            .await
            .unwrap();
        store
            .put_subtitle_cache(&SubtitleCache {
                cache_key: "persistent".to_string(),
                lines: vec![],
                language: None,
                format: "srt".to_string(),
                path_hint: None,
                is_temp: false,
                job_id: Some("job-1".to_string()),
            })
            .await
            .unwrap();

        store.clear_job_temp("job-1").await.unwrap();

        assert!(store.load_batch_checkpoints("job-1").await.unwrap().is_empty());
        assert!(store.get_subtitle_cache("temp").await.unwrap().is_none());
        assert!(store.get_subtitle_cache("persistent").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn media_meta_cache_respects_expiry() {
        let store = test_store().await;
        let now = Utc::now();
        store
            .put_media_meta_cache(&MediaMetaCache {
                media_path: "/lib/ep01.mkv".to_string(),
                target_language: "zh".to_string(),
                external_languages: vec!["en".to_string()],
                embedded_languages: vec![],
                has_target_external: false,
                has_target_embedded: false,
                expires_at: now + chrono::Duration::seconds(30),
                updated_at: now,
            })
            .await
            .unwrap();

        assert!(store
            .get_media_meta_cache("/lib/ep01.mkv", "zh", now)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_media_meta_cache("/lib/ep01.mkv", "zh", now + chrono::Duration::seconds(31))
            .await
            .unwrap()
            .is_none());

        let deleted = store
            .delete_expired_media_meta_cache(now + chrono::Duration::seconds(31))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }
}
