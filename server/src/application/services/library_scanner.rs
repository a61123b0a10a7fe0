//! Library Scanner (C2) — a three-tier read-through cache over the
//! filesystem (sources -> items -> episodes), classifying each media
//! file's subtitle coverage and target-language translatability.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::domain::entities::{Episode, Item, MediaMetaCache, Source, SubtitleCoverage};
use crate::domain::repositories::PersistenceStore;
use crate::domain::value_objects::{media_extensions, Language};
use crate::infrastructure::external::ffmpeg::VideoProbe;
use crate::shared::error::ScannerError;

const META_CACHE_TTL: ChronoDuration = ChronoDuration::hours(1);

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct ScannerTtls {
    pub sources: Duration,
    pub items: Duration,
    pub episodes: Duration,
}

impl Default for ScannerTtls {
    fn default() -> Self {
        Self {
            sources: Duration::from_secs(60),
            items: Duration::from_secs(30),
            episodes: Duration::from_secs(10),
        }
    }
}

struct CachedEntry<T> {
    value: T,
    version: u64,
    fetched_at: Instant,
}

impl<T: Clone> CachedEntry<T> {
    fn is_fresh(&self, current_version: u64, ttl: Duration) -> bool {
        self.version == current_version && self.fetched_at.elapsed() < ttl
    }
}

/// Three-tier read-through cache (P1-P3, T8-T10). All three cache maps and
/// the config-version counter are guarded by one `RwLock` each, matching
/// §5's "single RwLock protecting the three cache maps".
pub struct LibraryScanner {
    sources_config: Vec<SourceConfig>,
    target_language: RwLock<String>,
    config_version: AtomicU64,
    ttls: ScannerTtls,
    max_concurrency: usize,
    video_probe: Arc<dyn VideoProbe>,
    store: Option<Arc<dyn PersistenceStore>>,

    sources_cache: RwLock<Option<CachedEntry<Vec<Source>>>>,
    items_cache: RwLock<HashMap<String, CachedEntry<Vec<Item>>>>,
    episodes_cache: RwLock<HashMap<String, CachedEntry<Vec<Episode>>>>,
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Episode name cleaning (§4.2): `S\d+E(\d+)` stems become `E<epnum>
/// <residual>` with trailing release-quality tokens stripped. Delegates the
/// actual season/episode/quality/release-group recognition to the
/// `media-identifier` filename parser (the scheduler's bundle-naming
/// tool, per its Cargo.toml note) rather than re-deriving those patterns
/// here; anything the parser can't place as an episode just gets its
/// extracted title back.
pub fn clean_episode_name(stem: &str) -> String {
    let parsed = media_identifier::parse(stem);
    match parsed.episode_info.episode {
        Some(ep) => match parsed.episode_info.episode_title.or(parsed.title) {
            Some(title) if !title.trim().is_empty() => format!("E{ep} {}", title.trim()),
            _ => format!("E{ep}"),
        },
        None => parsed.title.unwrap_or_else(|| stem.to_string()),
    }
}

pub fn parse_season_number(stem: &str) -> Option<u32> {
    media_identifier::parse(stem).episode_info.season.map(u32::from)
}

impl LibraryScanner {
    pub fn new(
        sources_config: Vec<SourceConfig>,
        target_language: String,
        ttls: ScannerTtls,
        max_concurrency: usize,
        video_probe: Arc<dyn VideoProbe>,
        store: Option<Arc<dyn PersistenceStore>>,
    ) -> Self {
        Self {
            sources_config,
            target_language: RwLock::new(target_language),
            config_version: AtomicU64::new(1),
            ttls,
            max_concurrency: max_concurrency.max(1),
            video_probe,
            store,
            sources_cache: RwLock::new(None),
            items_cache: RwLock::new(HashMap::new()),
            episodes_cache: RwLock::new(HashMap::new()),
        }
    }

    fn version(&self) -> u64 {
        self.config_version.load(Ordering::SeqCst)
    }

    /// Bumps the config version, marking every cached entry stale (T9).
    pub fn invalidate(&self) {
        self.config_version.fetch_add(1, Ordering::SeqCst);
    }

    /// Hot-swaps the target language and invalidates caches (T10).
    pub async fn update_target_language(&self, new_language: String) {
        *self.target_language.write().await = new_language;
        self.invalidate();
    }

    pub async fn target_language(&self) -> String {
        self.target_language.read().await.clone()
    }

    /// Tier 1 (P1: preserves configured order).
    pub async fn scan_sources(&self) -> Result<Vec<Source>, ScannerError> {
        let version = self.version();
        {
            let cache = self.sources_cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.is_fresh(version, self.ttls.sources) {
                    return Ok(entry.value.clone());
                }
            }
        }

        let mut sources = Vec::with_capacity(self.sources_config.len());
        for cfg in &self.sources_config {
            let path = Path::new(&cfg.path);
            if tokio::fs::metadata(path).await.is_err() {
                continue;
            }
            let item_count = count_top_level_dirs(path).await.unwrap_or(0);
            sources.push(Source {
                id: cfg.id.clone(),
                name: cfg.name.clone(),
                path: cfg.path.clone(),
                item_count,
            });
        }

        let mut cache = self.sources_cache.write().await;
        *cache = Some(CachedEntry {
            value: sources.clone(),
            version,
            fetched_at: Instant::now(),
        });
        Ok(sources)
    }

    fn source_path(&self, source_id: &str) -> Result<PathBuf, ScannerError> {
        self.sources_config
            .iter()
            .find(|c| c.id == source_id)
            .map(|c| PathBuf::from(&c.path))
            .ok_or_else(|| ScannerError::SourceNotFound(source_id.to_string()))
    }

    /// Tier 2.
    pub async fn scan_items(&self, source_id: &str) -> Result<Vec<Item>, ScannerError> {
        let version = self.version();
        {
            let cache = self.items_cache.read().await;
            if let Some(entry) = cache.get(source_id) {
                if entry.is_fresh(version, self.ttls.items) {
                    return Ok(entry.value.clone());
                }
            }
        }

        let source_path = self.source_path(source_id)?;
        let mut items = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&source_path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_hidden(&name) {
                continue;
            }
            let dir_path = entry.path();
            let episode_count = count_media_files_recursive(&dir_path).await.unwrap_or(0);
            if episode_count == 0 {
                continue;
            }
            items.push(Item {
                id: Item::id_for(source_id, &dir_path.to_string_lossy()),
                name,
                path: dir_path.to_string_lossy().to_string(),
                episode_count,
            });
        }

        let mut cache = self.items_cache.write().await;
        cache.insert(
            source_id.to_string(),
            CachedEntry {
                value: items.clone(),
                version,
                fetched_at: Instant::now(),
            },
        );
        Ok(items)
    }

    /// Tier 3. `item_id` is `"<sourceID>|<absDir>"`.
    pub async fn scan_episodes_by_item(&self, item_id: &str) -> Result<Vec<Episode>, ScannerError> {
        let version = self.version();
        {
            let cache = self.episodes_cache.read().await;
            if let Some(entry) = cache.get(item_id) {
                if entry.is_fresh(version, self.ttls.episodes) {
                    return Ok(entry.value.clone());
                }
            }
        }

        let (source_id, item_dir) = item_id
            .split_once('|')
            .ok_or_else(|| ScannerError::Walk(format!("malformed item id: {item_id}")))?;
        let source_path = self.source_path(source_id)?;
        let target_language = self.target_language().await;

        let media_files = collect_media_files_recursive(Path::new(item_dir)).await?;

        let episodes: Vec<Episode> = stream::iter(media_files)
            .map(|media_path| {
                let target_language = target_language.clone();
                let source_path = source_path.clone();
                let video_probe = self.video_probe.clone();
                let store = self.store.clone();
                let item_id = item_id.to_string();
                async move {
                    classify_episode(&media_path, &source_path, &target_language, video_probe.as_ref(), store.as_deref(), &item_id)
                        .await
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, ScannerError>>()?;

        let mut cache = self.episodes_cache.write().await;
        cache.insert(
            item_id.to_string(),
            CachedEntry {
                value: episodes.clone(),
                version,
                fetched_at: Instant::now(),
            },
        );
        Ok(episodes)
    }
}

async fn count_top_level_dirs(path: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    let mut read_dir = tokio::fs::read_dir(path).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_hidden(&name) {
                count += 1;
            }
        }
    }
    Ok(count)
}

async fn count_media_files_recursive(dir: &Path) -> std::io::Result<usize> {
    Ok(collect_media_files_recursive(dir).await.unwrap_or_default().len())
}

async fn collect_media_files_recursive(dir: &Path) -> Result<Vec<PathBuf>, ScannerError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_entry(|e| e.file_name().to_str().map(|n| !is_hidden(n)).unwrap_or(true))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.file_type().is_file() {
                if let Some(name) = entry.path().to_str() {
                    if media_extensions::is_media_file(name) {
                        out.push(entry.path().to_path_buf());
                    }
                }
            }
        }
        out
    })
    .await
    .map_err(|e| ScannerError::Walk(e.to_string()))
}

/// Resolves the series directory: climbs from `media_path` toward
/// `source_root`, stopping at the first ancestor containing `tvshow.nfo`;
/// otherwise the first subdirectory under the source root.
fn resolve_series_dir(media_path: &Path, source_root: &Path) -> PathBuf {
    let mut dir = media_path.parent();
    while let Some(d) = dir {
        if d == source_root {
            break;
        }
        if d.join("tvshow.nfo").exists() {
            return d.to_path_buf();
        }
        dir = d.parent();
    }

    // First subdirectory under the source root on the path to media_path.
    if let Ok(relative) = media_path.strip_prefix(source_root) {
        if let Some(first) = relative.components().next() {
            return source_root.join(first);
        }
    }
    source_root.to_path_buf()
}

struct SiblingSubtitle {
    path: PathBuf,
    language_token: Option<String>,
}

fn find_sibling_subtitles(media_path: &Path) -> Vec<SiblingSubtitle> {
    let Some(parent) = media_path.parent() else { return Vec::new() };
    let Some(stem) = media_path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(parent) else { return out };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if !name.starts_with(stem) {
            continue;
        }
        let rest = &name[stem.len()..];
        if rest.is_empty() {
            continue;
        }
        let boundary_ok = rest
            .chars()
            .next()
            .map(|c| matches!(c, '.' | '_' | '-' | ' '))
            .unwrap_or(false);
        if !boundary_ok {
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        if !media_extensions::is_subtitle_file(&path_str) {
            continue;
        }

        // The language token is whatever sits between the stem boundary and
        // the extension, e.g. "ep01.en.srt" -> "en".
        let without_ext = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
            .to_string();
        let suffix = without_ext[stem.len()..].trim_start_matches(['.', '_', '-', ' ']).to_string();
        let language_token = if suffix.is_empty() { None } else { Some(suffix) };

        out.push(SiblingSubtitle { path, language_token });
    }
    out
}

/// Mirrors the scheduler's read-through `MediaMetaCache` check (§3: "written
/// by C2 after probing; TTL-evicted by C4 before each run") so a prior scan
/// or scheduler tick can save this episode's classification a redundant
/// ffprobe call.
#[allow(clippy::too_many_arguments)]
async fn embedded_languages_cached(
    store: Option<&dyn PersistenceStore>,
    media_path: &str,
    target_language: &str,
    has_target_external: bool,
    external_languages: &[String],
    video_probe: &dyn VideoProbe,
    now: DateTime<Utc>,
) -> Vec<String> {
    if let Some(store) = store {
        if let Ok(Some(cached)) = store.get_media_meta_cache(media_path, target_language, now).await {
            return cached.embedded_languages;
        }
    }

    let probe = video_probe
        .probe(media_path, target_language)
        .await
        .unwrap_or_else(|_| crate::infrastructure::external::ffmpeg::ProbeResult {
            embedded_languages: Vec::new(),
            extracted_srt: None,
        });

    if let Some(store) = store {
        let target = Language::parse(target_language);
        let has_target_embedded = probe.embedded_languages.iter().any(|l| target.matches(l));
        let entry = MediaMetaCache {
            media_path: media_path.to_string(),
            target_language: target_language.to_string(),
            external_languages: external_languages.to_vec(),
            embedded_languages: probe.embedded_languages.clone(),
            has_target_external,
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

async fn classify_episode(
    media_path: &Path,
    source_root: &Path,
    target_language: &str,
    video_probe: &dyn VideoProbe,
    store: Option<&dyn PersistenceStore>,
    item_id: &str,
) -> Result<Episode, ScannerError> {
    let _series_dir = resolve_series_dir(media_path, source_root);
    let target = Language::parse(target_language);

    let siblings = find_sibling_subtitles(media_path);
    let mut source_subs = Vec::new();
    let mut target_subs = Vec::new();
    let mut languages: Vec<String> = Vec::new();

    for sibling in &siblings {
        let path_str = sibling.path.to_string_lossy().to_string();
        match &sibling.language_token {
            Some(token) if target.matches(token) => {
                target_subs.push(path_str);
                languages.push(Language::parse(token).base().to_string());
            }
            Some(token) => {
                source_subs.push(path_str);
                languages.push(Language::parse(token).base().to_string());
            }
            None => {
                source_subs.push(path_str);
            }
        }
    }

    let media_path_str = media_path.to_string_lossy().to_string();
    let has_target_external = !target_subs.is_empty();
    let now = Utc::now();

    let embedded_languages =
        embedded_languages_cached(store, &media_path_str, target_language, has_target_external, &languages, video_probe, now)
            .await;

    let has_embedded = !embedded_languages.is_empty();
    let has_embedded_target = embedded_languages.iter().any(|l| target.matches(l));
    for lang in &embedded_languages {
        languages.push(Language::parse(lang).base().to_string());
    }
    languages.sort();
    languages.dedup();

    let has_source = !source_subs.is_empty() || has_embedded;
    let has_target = !target_subs.is_empty() || has_embedded_target;
    let coverage = SubtitleCoverage {
        has_source,
        has_target,
        has_embedded,
        has_embedded_target,
        source_subs,
        target_subs,
        languages,
    };

    let stem = media_path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    Ok(Episode {
        id: media_path_str.clone(),
        item_id: item_id.to_string(),
        season: parse_season_number(stem),
        name: clean_episode_name(stem),
        media_path: media_path_str,
        translatable: Episode::compute_translatable(&coverage),
        subtitles: coverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_standard_episode_names() {
        assert_eq!(clean_episode_name("Dark.Matter.S01E10.BDRIP.x264-Krissz"), "E10");
        assert!(clean_episode_name("Stargate.Atlantis.S01E01-E02.Rising.BDRip.x264.Hun.Eng-MaMMuT").contains("Rising"));
    }

    #[test]
    fn parses_season_numbers() {
        assert_eq!(parse_season_number("Dark.Matter.S02E08.PROPER.720p.HDTV.x264-KILLERS"), Some(2));
        assert_eq!(parse_season_number("Home.Alone.1990"), None);
    }
}
