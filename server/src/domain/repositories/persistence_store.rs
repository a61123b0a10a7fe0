//! PersistenceStore trait (§4.1, Design Notes: "keep the store interface narrow").

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{BatchCheckpoint, MediaMetaCache, SubtitleCache, TranslationJob};
use crate::shared::error::StoreError;

/// The single abstraction the rest of the system uses to reach durable
/// storage. Deliberately narrow: jobs/checkpoints errors propagate, cache
/// table errors are treated by callers as misses (§4.1 failure semantics).
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load_jobs(&self) -> Result<Vec<TranslationJob>, StoreError>;
    async fn upsert_job(&self, job: &TranslationJob) -> Result<(), StoreError>;
    async fn delete_job(&self, id: &str) -> Result<(), StoreError>;
    /// Removes checkpoints and any subtitle-cache rows owned by `id`, atomically.
    async fn delete_job_data(&self, id: &str) -> Result<(), StoreError>;

    async fn save_batch_checkpoint(&self, checkpoint: &BatchCheckpoint) -> Result<(), StoreError>;
    async fn load_batch_checkpoints(&self, job_id: &str) -> Result<Vec<BatchCheckpoint>, StoreError>;
    /// Removes checkpoints and all `is_temp=true` subtitle cache rows for `job_id` (Q1).
    async fn clear_job_temp(&self, job_id: &str) -> Result<(), StoreError>;

    async fn put_subtitle_cache(&self, entry: &SubtitleCache) -> Result<(), StoreError>;
    async fn get_subtitle_cache(&self, cache_key: &str) -> Result<Option<SubtitleCache>, StoreError>;

    async fn put_media_meta_cache(&self, entry: &MediaMetaCache) -> Result<(), StoreError>;
    async fn get_media_meta_cache(
        &self,
        media_path: &str,
        target_language: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MediaMetaCache>, StoreError>;
    async fn delete_expired_media_meta_cache(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
