//! Job Queue (C3) — an in-memory job map and dedupe index backed by a
//! bounded channel worker pool, durable via an optional `PersistenceStore`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::domain::entities::{JobPayload, TranslationJob};
use crate::domain::entities::job::JobSource;
use crate::domain::repositories::PersistenceStore;
use crate::domain::value_objects::JobState;

/// Terminal-job retention ceiling (I4).
const MAX_JOBS: usize = 1000;
const PENDING_CHANNEL_CAPACITY: usize = 4096;

/// What the caller supplies to create a new job; `dedupe_key` is computed by
/// the caller via `TranslationJob::dedupe_key` so the queue stays agnostic
/// of how it's derived.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source: JobSource,
    pub dedupe_key: String,
    pub payload: JobPayload,
}

/// Executes one job to completion. Implemented by the translation pipeline
/// (C5); kept as a trait so the queue never depends on pipeline internals.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: TranslationJob) -> Result<(), String>;
}

struct QueueState {
    jobs: HashMap<String, TranslationJob>,
    dedupe: HashMap<String, String>,
}

pub struct JobQueue {
    store: Option<Arc<dyn PersistenceStore>>,
    state: RwLock<QueueState>,
    next_id: AtomicU64,
    worker_count: usize,
    pending_tx: mpsc::Sender<String>,
    pending_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    stop_tx: watch::Sender<bool>,
    started: AtomicBool,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    /// Hydrates from the store (if any): loads every persisted job, promotes
    /// `running` jobs to `pending` (crash recovery), reinstates dedupe
    /// reservations for non-terminal jobs, and advances the id
    /// high-watermark past every `job-<N>` suffix seen.
    pub async fn new(worker_count: usize, store: Option<Arc<dyn PersistenceStore>>) -> Self {
        let (pending_tx, pending_rx) = mpsc::channel(PENDING_CHANNEL_CAPACITY);
        let (stop_tx, _stop_rx) = watch::channel(false);

        let mut jobs = HashMap::new();
        let mut dedupe = HashMap::new();
        let mut max_seen: u64 = 0;

        if let Some(store) = &store {
            match store.load_jobs().await {
                Ok(loaded) => {
                    for mut job in loaded {
                        if let Some(n) = job.id.strip_prefix("job-").and_then(|n| n.parse::<u64>().ok()) {
                            max_seen = max_seen.max(n);
                        }
                        if job.status == JobState::Running {
                            job.status = JobState::Pending;
                            job.touch();
                            if let Err(err) = store.upsert_job(&job).await {
                                tracing::warn!(job_id = %job.id, error = %err, "failed to persist crash-recovered job");
                            }
                        }
                        if !job.status.is_terminal() && !job.dedupe_key.is_empty() {
                            dedupe.insert(job.dedupe_key.clone(), job.id.clone());
                        }
                        jobs.insert(job.id.clone(), job);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to hydrate job queue from store");
                }
            }
        }

        Self {
            store,
            state: RwLock::new(QueueState { jobs, dedupe }),
            next_id: AtomicU64::new(max_seen + 1),
            worker_count: worker_count.max(1),
            pending_tx,
            pending_rx: Arc::new(Mutex::new(pending_rx)),
            stop_tx,
            started: AtomicBool::new(false),
            worker_handles: Mutex::new(Vec::new()),
        }
    }

    /// (O2) second `Enqueue` for an in-flight dedupe key returns the
    /// existing job rather than creating a new one.
    pub async fn enqueue(&self, req: NewJob) -> (TranslationJob, bool) {
        let snapshot = {
            let mut state = self.state.write().await;
            if let Some(existing_id) = state.dedupe.get(&req.dedupe_key) {
                let existing = state.jobs.get(existing_id).expect("dedupe entry without job").clone();
                return (existing, false);
            }

            let now = Utc::now();
            let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let job = TranslationJob {
                id: id.clone(),
                dedupe_key: req.dedupe_key.clone(),
                source: req.source,
                payload: req.payload,
                status: JobState::Pending,
                error_message: None,
                created_at: now,
                updated_at: now,
            };
            state.dedupe.insert(req.dedupe_key, id.clone());
            state.jobs.insert(id, job.clone());
            job
        };

        if let Some(store) = &self.store {
            if let Err(err) = store.upsert_job(&snapshot).await {
                tracing::warn!(job_id = %snapshot.id, error = %err, "failed to persist new job");
            }
        }

        if self.started.load(Ordering::SeqCst) {
            let tx = self.pending_tx.clone();
            let id = snapshot.id.clone();
            match tx.try_send(id.clone()) {
                Ok(()) => {}
                Err(_) => {
                    tokio::spawn(async move {
                        let _ = tx.send(id).await;
                    });
                }
            }
        }

        (snapshot, true)
    }

    pub async fn get(&self, id: &str) -> Option<TranslationJob> {
        self.state.read().await.jobs.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<TranslationJob> {
        self.state.read().await.jobs.values().cloned().collect()
    }

    /// Deletes a job and its owned data regardless of status (operator delete).
    pub async fn delete(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.write().await;
            match state.jobs.remove(id) {
                Some(job) => {
                    state.dedupe.remove(&job.dedupe_key);
                    true
                }
                None => false,
            }
        };
        if removed {
            if let Some(store) = &self.store {
                if let Err(err) = store.delete_job_data(id).await {
                    tracing::warn!(job_id = %id, error = %err, "failed to delete job data");
                }
                if let Err(err) = store.delete_job(id).await {
                    tracing::warn!(job_id = %id, error = %err, "failed to delete job");
                }
            }
        }
        removed
    }

    /// Idempotent. Spawns `worker_count` workers pulling from the pending
    /// channel, after flushing every currently-pending id onto it.
    pub async fn start(self: &Arc<Self>, executor: Arc<dyn JobExecutor>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let pending_ids: Vec<String> = {
            let state = self.state.read().await;
            state
                .jobs
                .values()
                .filter(|j| j.status == JobState::Pending)
                .map(|j| j.id.clone())
                .collect()
        };
        for id in pending_ids {
            let _ = self.pending_tx.send(id).await;
        }

        let mut handles = self.worker_handles.lock().await;
        for _ in 0..self.worker_count {
            let queue = Arc::clone(self);
            let executor = Arc::clone(&executor);
            let mut stop_rx = self.stop_tx.subscribe();
            let pending_rx = Arc::clone(&self.pending_rx);
            handles.push(tokio::spawn(async move {
                loop {
                    let id = tokio::select! {
                        _ = stop_rx.changed() => break,
                        id = async { pending_rx.lock().await.recv().await } => match id {
                            Some(id) => id,
                            None => break,
                        },
                    };
                    queue.run_one(id, executor.as_ref()).await;
                }
            }));
        }
    }

    /// Idempotent; waits for every worker to drain and exit.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let mut handles = self.worker_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }

    async fn run_one(&self, id: String, executor: &dyn JobExecutor) {
        let job = match self.mark_running(&id).await {
            Some(job) => job,
            None => return,
        };

        let result = executor.execute(job).await;
        match result {
            Ok(()) => self.mark_terminal(&id, JobState::Success, None).await,
            Err(err) => self.mark_terminal(&id, JobState::Failed, Some(err)).await,
        }
    }

    async fn mark_running(&self, id: &str) -> Option<TranslationJob> {
        let snapshot = {
            let mut state = self.state.write().await;
            let job = state.jobs.get_mut(id)?;
            if job.status != JobState::Pending {
                tracing::warn!(job_id = %id, status = %job.status, "worker pulled job not in pending state");
                return None;
            }
            job.status = JobState::Running;
            job.touch();
            job.clone()
        };
        if let Some(store) = &self.store {
            if let Err(err) = store.upsert_job(&snapshot).await {
                tracing::warn!(job_id = %id, error = %err, "failed to persist running transition");
            }
        }
        Some(snapshot)
    }

    async fn mark_terminal(&self, id: &str, status: JobState, error_message: Option<String>) {
        let (snapshot, pruned) = {
            let mut state = self.state.write().await;
            let Some(job) = state.jobs.get_mut(id) else { return };
            job.status = status;
            job.error_message = error_message;
            job.touch();
            state.dedupe.remove(&job.dedupe_key.clone());
            let snapshot = job.clone();

            let pruned = prune_terminal_overflow(&mut state.jobs);
            (snapshot, pruned)
        };

        if let Some(store) = &self.store {
            if let Err(err) = store.upsert_job(&snapshot).await {
                tracing::warn!(job_id = %id, error = %err, "failed to persist terminal transition");
            }
            for pruned_id in &pruned {
                if let Err(err) = store.delete_job_data(pruned_id).await {
                    tracing::warn!(job_id = %pruned_id, error = %err, "failed to delete pruned job data");
                }
                if let Err(err) = store.delete_job(pruned_id).await {
                    tracing::warn!(job_id = %pruned_id, error = %err, "failed to delete pruned job");
                }
            }
        }
    }
}

/// (I4/Q3) Drops the oldest terminal jobs, by `updated_at`, down to
/// `MAX_JOBS`. Non-terminal jobs are never touched; if they alone exceed the
/// ceiling this is back-pressure, not an eviction trigger.
fn prune_terminal_overflow(jobs: &mut HashMap<String, TranslationJob>) -> Vec<String> {
    if jobs.len() <= MAX_JOBS {
        return Vec::new();
    }

    let mut terminal_ids: Vec<(String, chrono::DateTime<Utc>)> = jobs
        .values()
        .filter(|j| j.status.is_terminal())
        .map(|j| (j.id.clone(), j.updated_at))
        .collect();
    terminal_ids.sort_by_key(|(_, updated_at)| *updated_at);

    let overflow = jobs.len() - MAX_JOBS;
    if terminal_ids.len() < overflow {
        tracing::warn!(
            total = jobs.len(),
            terminal = terminal_ids.len(),
            "job count exceeds max_jobs with insufficient terminal jobs to prune; back-pressure condition"
        );
    }

    let to_drop = terminal_ids.into_iter().take(overflow);
    let mut dropped = Vec::new();
    for (id, _) in to_drop {
        jobs.remove(&id);
        dropped.push(id);
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn new_job(key: &str) -> NewJob {
        NewJob {
            source: JobSource::Manual,
            dedupe_key: key.to_string(),
            payload: JobPayload {
                media_file: format!("/media/{key}.mkv"),
                subtitle_file: None,
                nfo_file: None,
            },
        }
    }

    struct CountingExecutor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl JobExecutor for CountingExecutor {
        async fn execute(&self, _job: TranslationJob) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn enqueue_dedupes_in_flight_jobs() {
        let queue = JobQueue::new(1, None).await;
        let (first, created_first) = queue.enqueue(new_job("a")).await;
        let (second, created_second) = queue.enqueue(new_job("a")).await;
        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn enqueue_allows_retry_after_terminal() {
        let queue = Arc::new(JobQueue::new(1, None).await);
        let executor = Arc::new(CountingExecutor { calls: AtomicUsize::new(0), fail: false });
        queue.start(executor.clone()).await;

        let (job, _) = queue.enqueue(new_job("b")).await;
        for _ in 0..50 {
            if queue.get(&job.id).await.unwrap().status == JobState::Success {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(queue.get(&job.id).await.unwrap().status, JobState::Success);

        let (retry, created) = queue.enqueue(new_job("b")).await;
        assert!(created);
        assert_ne!(retry.id, job.id);

        queue.stop().await;
    }

    #[tokio::test]
    async fn failed_jobs_persist_error_message() {
        let queue = Arc::new(JobQueue::new(1, None).await);
        let executor = Arc::new(CountingExecutor { calls: AtomicUsize::new(0), fail: true });
        queue.start(executor.clone()).await;

        let (job, _) = queue.enqueue(new_job("c")).await;
        for _ in 0..50 {
            if queue.get(&job.id).await.unwrap().status == JobState::Failed {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let final_job = queue.get(&job.id).await.unwrap();
        assert_eq!(final_job.status, JobState::Failed);
        assert_eq!(final_job.error_message.as_deref(), Some("boom"));

        queue.stop().await;
    }

    #[test]
    fn prune_drops_oldest_terminal_first() {
        let mut jobs = HashMap::new();
        let base = Utc::now();
        for i in 0..(MAX_JOBS + 5) {
            let id = format!("job-{i}");
            jobs.insert(
                id.clone(),
                TranslationJob {
                    id,
                    dedupe_key: String::new(),
                    source: JobSource::Manual,
                    payload: JobPayload { media_file: String::new(), subtitle_file: None, nfo_file: None },
                    status: JobState::Success,
                    error_message: None,
                    created_at: base,
                    updated_at: base + chrono::Duration::seconds(i as i64),
                },
            );
        }
        let dropped = prune_terminal_overflow(&mut jobs);
        assert_eq!(dropped.len(), 5);
        assert_eq!(jobs.len(), MAX_JOBS);
        assert!(!jobs.contains_key("job-0"));
        assert!(jobs.contains_key(&format!("job-{}", MAX_JOBS + 4)));
    }
}
