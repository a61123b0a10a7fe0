//! Scheduler & Source Layer (C4) — cron-driven and HTTP-triggered producers
//! that walk configured media roots and convert eligible bundles into
//! enqueue requests, guarded by a process-wide single-flight lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use cron::Schedule;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::services::job_queue::{JobQueue, NewJob};
use crate::domain::entities::job::{JobPayload, JobSource};
use crate::domain::entities::{MediaMetaCache, TranslationJob};
use crate::domain::repositories::PersistenceStore;
use crate::domain::value_objects::{media_extensions, Language};
use crate::infrastructure::external::ffmpeg::VideoProbe;
use crate::infrastructure::external::nfo::NfoParser;

#[derive(Debug, Clone)]
pub struct MediaRootConfig {
    pub id: String,
    pub path: String,
}

/// Lowercase 2-3 letter language token, optionally with a regional
/// fragment, trailing the basename behind a `.`/`_`/`-` boundary.
static LANG_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)[._-]([a-z]{2,3}(?:-[a-z]{2,4})?)$").unwrap());

const META_CACHE_TTL: ChronoDuration = ChronoDuration::hours(1);

fn strip_all_extensions(path: &Path) -> (PathBuf, String) {
    let parent = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
    (parent, stem)
}

/// Strips a trailing language-code suffix if present, returning `(base,
/// token)`. Only strips when the trailing segment is strictly lowercase,
/// matching the convention real release groups use for subtitle suffixes.
fn strip_language_suffix(stem: &str) -> (String, Option<String>) {
    match LANG_SUFFIX_RE.captures(stem) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (stem.to_string(), None),
    }
}

#[derive(Debug, Clone)]
enum FileKind {
    Media,
    Subtitle { language_token: Option<String> },
}

#[derive(Debug, Clone)]
struct CandidateFile {
    path: PathBuf,
    kind: FileKind,
}

pub struct Scheduler {
    roots: Vec<MediaRootConfig>,
    target_language: RwLock<String>,
    store: Option<Arc<dyn PersistenceStore>>,
    video_probe: Arc<dyn VideoProbe>,
    queue: Arc<JobQueue>,
    bundle_concurrency: usize,
    last_trigger: RwLock<HashMap<String, DateTime<Utc>>>,
    current_schedule: RwLock<Option<Schedule>>,
    running: AtomicBool,
    cron_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        roots: Vec<MediaRootConfig>,
        target_language: String,
        store: Option<Arc<dyn PersistenceStore>>,
        video_probe: Arc<dyn VideoProbe>,
        queue: Arc<JobQueue>,
        bundle_concurrency: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            roots,
            target_language: RwLock::new(target_language),
            store,
            video_probe,
            queue,
            bundle_concurrency: bundle_concurrency.max(1),
            last_trigger: RwLock::new(HashMap::new()),
            current_schedule: RwLock::new(None),
            running: AtomicBool::new(false),
            cron_handle: Mutex::new(None),
        })
    }

    pub async fn update_target_language(&self, new_language: String) {
        *self.target_language.write().await = new_language;
    }

    /// Registers `cron_expr`, aborting any previously-registered task first
    /// so re-registration on settings update never produces duplicate fires.
    pub async fn register(self: &Arc<Self>, cron_expr: &str, cancellation: CancellationToken) -> Result<(), String> {
        let schedule: Schedule = cron_expr.parse().map_err(|e| format!("invalid cron expression: {e}"))?;

        if let Some(handle) = self.cron_handle.lock().await.take() {
            handle.abort();
        }
        *self.current_schedule.write().await = Some(schedule.clone());

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scheduler.run_tick().await;

            loop {
                let now = Utc::now();
                let next = match schedule.after(&now).next() {
                    Some(next) => next,
                    None => break,
                };
                let sleep_duration = (next - now).to_std().unwrap_or(std::time::Duration::from_secs(1));

                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(sleep_duration) => {
                        scheduler.run_tick().await;
                    }
                }
            }
        });

        *self.cron_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Single-flight guard: overlapping ticks collapse into the in-flight one.
    pub async fn run_tick(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("scheduler tick already in flight, skipping");
            return;
        }
        self.run_tick_inner().await;
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_tick_inner(&self) {
        let target_language = self.target_language.read().await.clone();
        let now = Utc::now();

        if let Some(store) = &self.store {
            if let Err(err) = store.delete_expired_media_meta_cache(now).await {
                tracing::warn!(error = %err, "failed to prune expired media-meta-cache rows");
            }
        }

        for root in self.roots.clone() {
            let start_time = self.start_time_for(&root.id, now).await;
            if let Err(err) = self.scan_root(&root, start_time, now, &target_language).await {
                tracing::warn!(root = %root.id, error = %err, "scheduler root scan failed");
            }
            self.last_trigger.write().await.insert(root.id.clone(), now);
        }
    }

    async fn start_time_for(&self, root_id: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(last) = self.last_trigger.read().await.get(root_id) {
            return *last;
        }

        let floor = now - ChronoDuration::days(14);
        let last_scheduled_fire = match self.current_schedule.read().await.as_ref() {
            Some(schedule) => schedule.after(&floor).take_while(|fire| *fire < now).last(),
            None => None,
        };
        last_scheduled_fire.unwrap_or(floor).max(floor)
    }

    async fn scan_root(
        &self,
        root: &MediaRootConfig,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
        target_language: &str,
    ) -> Result<(), String> {
        let root_path = PathBuf::from(&root.path);
        if tokio::fs::metadata(&root_path).await.is_err() {
            return Ok(());
        }

        let groups = collect_groups(&root_path).await?;

        // Bundles within a run are processed concurrently, bounded by
        // `bundle_concurrency` (§5 "per-run bundle workers"); failures are
        // per-bundle and independent, so each is simply logged rather than
        // aborting the remaining set.
        stream::iter(groups.into_iter())
            .map(|((_dir, _base), files)| self.process_bundle(files, start_time, now, target_language))
            .buffer_unordered(self.bundle_concurrency)
            .collect::<Vec<()>>()
            .await;

        Ok(())
    }

    async fn process_bundle(&self, files: Vec<CandidateFile>, start_time: DateTime<Utc>, now: DateTime<Utc>, target_language: &str) {
        let media_path = match files.iter().find(|f| matches!(f.kind, FileKind::Media)) {
            Some(f) => f.path.clone(),
            None => return,
        };

        let nfo_candidates = NfoParser::find_nfo_candidates(&media_path);
        let mut best_date: Option<NaiveDate> = None;
        let mut best_nfo: Option<PathBuf> = None;
        for candidate in &nfo_candidates {
            if let Ok(Some(meta)) = NfoParser::parse(candidate).await {
                if let Some(date_str) = meta.best_date() {
                    if let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                        if best_date.map(|b| date > b).unwrap_or(true) {
                            best_date = Some(date);
                            best_nfo = Some(candidate.clone());
                        }
                    }
                }
            }
        }

        let release_date = match best_date {
            Some(d) => d,
            None => return, // never enqueue an undated bundle
        };
        if release_date < start_time.date_naive() {
            return;
        }

        let target = Language::parse(target_language);
        let subtitle_entries: Vec<&CandidateFile> = files
            .iter()
            .filter(|f| matches!(f.kind, FileKind::Subtitle { .. }))
            .collect();

        let has_external_target = subtitle_entries.iter().any(|f| match &f.kind {
            FileKind::Subtitle { language_token: Some(tok) } => target.matches(tok),
            _ => false,
        });
        if has_external_target {
            return; // already has a target-language subtitle
        }

        let external_source = subtitle_entries
            .iter()
            .find(|f| match &f.kind {
                FileKind::Subtitle { language_token: Some(tok) } => !target.matches(tok),
                FileKind::Subtitle { language_token: None } => true,
                _ => false,
            })
            .map(|f| f.path.clone());

        let media_path_str = media_path.to_string_lossy().to_string();
        let subtitle_path = if external_source.is_some() {
            external_source
        } else {
            let probe = self.embedded_languages(&media_path_str, target_language, now).await;
            let has_embedded_target = probe.iter().any(|l| target.matches(l));
            if has_embedded_target || probe.is_empty() {
                return; // already translated, or nothing to translate from
            }
            None // embedded source; the pipeline extracts it during translation
        };

        let dedupe_key = TranslationJob::dedupe_key(&media_path_str, subtitle_path.as_deref(), target_language);
        let payload = JobPayload {
            media_file: media_path_str,
            subtitle_file: subtitle_path.map(|p| p.to_string_lossy().to_string()),
            nfo_file: best_nfo.map(|p| p.to_string_lossy().to_string()),
        };

        self.queue
            .enqueue(NewJob { source: JobSource::Cron, dedupe_key, payload })
            .await;
    }

    /// Re-checks cached media-meta before shelling out to the video prober.
    async fn embedded_languages(&self, media_path: &str, target_language: &str, now: DateTime<Utc>) -> Vec<String> {
        if let Some(store) = &self.store {
            if let Ok(Some(cached)) = store.get_media_meta_cache(media_path, target_language, now).await {
                return cached.embedded_languages;
            }
        }

        let probe = match self.video_probe.probe(media_path, target_language).await {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(media_path, error = %err, "video probe failed during scheduler scan");
                return Vec::new();
            }
        };

        if let Some(store) = &self.store {
            let target = Language::parse(target_language);
            let has_target_embedded = probe.embedded_languages.iter().any(|l| target.matches(l));
            let entry = MediaMetaCache {
                media_path: media_path.to_string(),
                target_language: target_language.to_string(),
                external_languages: Vec::new(),
                embedded_languages: probe.embedded_languages.clone(),
                has_target_external: false,
                has_target_embedded,
                expires_at: now + META_CACHE_TTL,
                updated_at: now,
            };
            if let Err(err) = store.put_media_meta_cache(&entry).await {
                tracing::warn!(media_path, error = %err, "failed to cache media meta");
            }
        }

        probe.embedded_languages
    }
}

async fn collect_groups(root: &Path) -> Result<HashMap<(PathBuf, String), Vec<CandidateFile>>, String> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut groups: HashMap<(PathBuf, String), Vec<CandidateFile>> = HashMap::new();
        for entry in walkdir::WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(path_str) = path.to_str() else { continue };
            let is_media = media_extensions::is_media_file(path_str);
            let is_sub = media_extensions::is_translatable_subtitle_file(path_str);
            if !is_media && !is_sub {
                continue;
            }

            let (dir, raw_stem) = strip_all_extensions(path);
            if is_media {
                groups.entry((dir, raw_stem)).or_default().push(CandidateFile {
                    path: path.to_path_buf(),
                    kind: FileKind::Media,
                });
            } else {
                let (base, token) = strip_language_suffix(&raw_stem);
                groups.entry((dir, base)).or_default().push(CandidateFile {
                    path: path.to_path_buf(),
                    kind: FileKind::Subtitle { language_token: token },
                });
            }
        }
        groups
    })
    .await
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_lowercase_language_suffix() {
        assert_eq!(strip_language_suffix("episode01.en"), ("episode01".to_string(), Some("en".to_string())));
        assert_eq!(strip_language_suffix("episode01.pt-br"), ("episode01".to_string(), Some("pt-br".to_string())));
        assert_eq!(strip_language_suffix("episode01"), ("episode01".to_string(), None));
        assert_eq!(strip_language_suffix("Episode.EN"), ("Episode.EN".to_string(), None));
    }
}
