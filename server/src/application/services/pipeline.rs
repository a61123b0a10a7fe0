//! Translation Pipeline (C5) — the per-job worker that drives context
//! assembly, term-map lookup/generation, checkpointed batch translation,
//! and atomic output publication. Implements `JobExecutor` so `JobQueue`
//! (C3) can run it without knowing any of this.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::RwLock;

use crate::application::services::job_queue::JobExecutor;
use crate::application::services::term_map::{TermMapGenerator, TermMapStore};
use crate::application::services::translator::Translator;
use crate::domain::entities::job::JobPayload;
use crate::domain::entities::{BatchCheckpoint, SubtitleCache, SubtitleLine, TermMap, TranslationJob};
use crate::domain::repositories::PersistenceStore;
use crate::domain::value_objects::Language;
use crate::infrastructure::external::ffmpeg::VideoProbe;
use crate::infrastructure::external::nfo::NfoParser;
use crate::infrastructure::subtitle;

const DEFAULT_BATCH_SIZE: usize = 50;

/// Same lowercase 2-3 letter (+ optional region) language-token convention
/// the scheduler (C4) uses for stripping subtitle-filename suffixes,
/// reused here to infer the source language for the term-map filename when
/// the job's subtitle was supplied externally rather than extracted.
static LANG_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)[._-]([a-z]{2,3}(?:-[a-z]{2,4})?)$").unwrap());

/// The `_ctxtrans` output marker, with an optional trailing language base,
/// matched so re-translation never compounds the marker (T11).
static CTXTRANS_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_ctxtrans(?:_embedded)?(?:\.[a-zA-Z]{2,3})?$").unwrap());

pub struct TranslationPipeline {
    store: Option<Arc<dyn PersistenceStore>>,
    video_probe: Arc<dyn VideoProbe>,
    translator: Arc<Translator>,
    term_map_store: Arc<TermMapStore>,
    term_map_generator: Arc<TermMapGenerator>,
    target_language: RwLock<String>,
    search_enabled: bool,
    batch_size: usize,
}

impl TranslationPipeline {
    pub fn new(
        store: Option<Arc<dyn PersistenceStore>>,
        video_probe: Arc<dyn VideoProbe>,
        translator: Arc<Translator>,
        term_map_store: Arc<TermMapStore>,
        term_map_generator: Arc<TermMapGenerator>,
        target_language: String,
        search_enabled: bool,
    ) -> Self {
        Self {
            store,
            video_probe,
            translator,
            term_map_store,
            term_map_generator,
            target_language: RwLock::new(target_language),
            search_enabled,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub async fn update_target_language(&self, new_language: String) {
        *self.target_language.write().await = new_language;
    }

    /// Step 1: resolve the source subtitle, reading from `payload`, the
    /// subtitle cache, or extracting the first embedded track via the
    /// video prober.
    async fn resolve_source_subtitle(
        &self,
        job_id: &str,
        payload: &JobPayload,
    ) -> Result<(Vec<SubtitleLine>, bool, Option<String>), String> {
        if let Some(subtitle_path) = &payload.subtitle_file {
            let content = tokio::fs::read_to_string(subtitle_path)
                .await
                .map_err(|e| format!("failed to read source subtitle {subtitle_path}: {e}"))?;
            let lines = subtitle::parse(&content).map_err(|e| format!("failed to parse source subtitle: {e}"))?;
            return Ok((lines, false, None));
        }

        let cache_key = SubtitleCache::cache_key_for(&payload.media_file, 0);
        if let Some(store) = &self.store {
            if let Ok(Some(cached)) = store.get_subtitle_cache(&cache_key).await {
                return Ok((cached.lines, true, cached.language));
            }
        }

        let target_language = self.target_language.read().await.clone();
        let probe = self
            .video_probe
            .probe(&payload.media_file, &target_language)
            .await
            .map_err(|e| format!("video probe failed: {e}"))?;
        let srt_bytes = probe
            .extracted_srt
            .ok_or_else(|| "no external subtitle and no embedded subtitle track available".to_string())?;
        let srt_text = String::from_utf8_lossy(&srt_bytes).to_string();
        let lines = subtitle::parse(&srt_text).map_err(|e| format!("failed to parse extracted subtitle: {e}"))?;

        let language = probe.embedded_languages.first().cloned();
        if let Some(store) = &self.store {
            let entry = SubtitleCache {
                cache_key,
                lines: lines.clone(),
                language: language.clone(),
                format: "srt".to_string(),
                path_hint: None,
                is_temp: true,
                job_id: Some(job_id.to_string()),
            };
            if let Err(err) = store.put_subtitle_cache(&entry).await {
                tracing::warn!(job_id, error = %err, "failed to persist extracted subtitle cache entry");
            }
        }

        Ok((lines, true, language))
    }

    /// Steps 2-3: resolve or generate the NFO-backed term map for this
    /// job's media directory.
    async fn resolve_term_map(
        &self,
        payload: &JobPayload,
        source_language_hint: Option<&str>,
        target_language: &str,
    ) -> Option<(TermMap, PathBuf)> {
        let nfo_path = payload.nfo_file.as_ref()?;
        let nfo = NfoParser::parse(Path::new(nfo_path)).await.ok().flatten()?;

        let media_dir = Path::new(&payload.media_file).parent()?;
        let source_base = source_language_hint
            .map(|l| Language::parse(l).base().to_string())
            .unwrap_or_else(|| infer_source_language_from_filename(payload.subtitle_file.as_deref()));
        let target_base = Language::parse(target_language).base().to_string();

        if let Some(existing_path) = TermMapStore::find_ancestor(media_dir, &source_base, &target_base) {
            if let Ok(map) = self.term_map_store.load(&existing_path).await {
                if !map.is_empty() {
                    return Some((map, existing_path));
                }
            }
        }

        if !self.search_enabled {
            return None;
        }

        let generated = self.term_map_generator.generate(&nfo, target_language).await.ok()?;
        if generated.is_empty() {
            return None;
        }

        let save_dir = nfo_ancestor_dir(nfo_path, media_dir);
        let save_path = save_dir.join(TermMap::filename(&source_base, &target_base));
        match self.term_map_store.save_merging(&save_path, generated).await {
            Ok(merged) => Some((merged, save_path)),
            Err(err) => {
                tracing::warn!(path = %save_path.display(), error = %err, "failed to persist generated term map");
                None
            }
        }
    }

    /// Step 5: fixed-size batch translation with per-batch checkpoint
    /// skip/resume (O1: checkpoints are written in `batch_start` order).
    async fn translate_with_checkpoints(
        &self,
        job_id: &str,
        source_lines: &[SubtitleLine],
        target_language: &str,
        term_map: Option<&TermMap>,
    ) -> Result<Vec<String>, String> {
        let mut existing_checkpoints = std::collections::HashMap::new();
        if let Some(store) = &self.store {
            if let Ok(checkpoints) = store.load_batch_checkpoints(job_id).await {
                for checkpoint in checkpoints {
                    existing_checkpoints.insert(checkpoint.batch_start, checkpoint);
                }
            }
        }

        let mut translated = vec![String::new(); source_lines.len()];
        let mut start = 0;
        while start < source_lines.len() {
            let end = (start + self.batch_size).min(source_lines.len());

            if let Some(checkpoint) = existing_checkpoints.get(&start) {
                if checkpoint.batch_end == end && checkpoint.texts.len() == end - start {
                    translated[start..end].clone_from_slice(&checkpoint.texts);
                    start = end;
                    continue;
                }
            }

            let batch_texts: Vec<String> = source_lines[start..end].iter().map(|l| l.text.clone()).collect();
            let batch_translated = self
                .translator
                .translate_batch(&batch_texts, target_language, term_map)
                .await
                .map_err(|e| format!("batch [{start},{end}) translation failed: {e}"))?;

            if batch_translated.len() != end - start {
                return Err(format!(
                    "translator returned {} lines for batch of {}",
                    batch_translated.len(),
                    end - start
                ));
            }

            translated[start..end].clone_from_slice(&batch_translated);

            if let Some(store) = &self.store {
                let checkpoint = BatchCheckpoint {
                    job_id: job_id.to_string(),
                    batch_start: start,
                    batch_end: end,
                    texts: batch_translated,
                    updated_at: Utc::now(),
                };
                if let Err(err) = store.save_batch_checkpoint(&checkpoint).await {
                    tracing::warn!(job_id, start, end, error = %err, "failed to persist batch checkpoint");
                }
            }

            start = end;
        }

        Ok(translated)
    }

    /// Step 6: compute the stable `_ctxtrans` output path and write it
    /// atomically (T11).
    async fn write_output(
        &self,
        payload: &JobPayload,
        source_is_synthetic: bool,
        source_lines: &[SubtitleLine],
        translated: &[String],
        target_language: &str,
    ) -> Result<PathBuf, String> {
        let _ = source_is_synthetic;
        let output_path = compute_output_path(&payload.media_file, payload.subtitle_file.as_deref(), target_language);

        let output_lines: Vec<SubtitleLine> = source_lines
            .iter()
            .zip(translated.iter())
            .map(|(source, text)| SubtitleLine {
                index: source.index,
                start: source.start.clone(),
                end: source.end.clone(),
                text: text.clone(),
            })
            .collect();
        let body = subtitle::serialize(&output_lines);

        let tmp_name = format!(
            "{}.tmp-{}",
            output_path.file_name().and_then(|n| n.to_str()).unwrap_or("output"),
            uuid::Uuid::new_v4()
        );
        let tmp_path = output_path.with_file_name(tmp_name);
        tokio::fs::write(&tmp_path, body.as_bytes())
            .await
            .map_err(|e| format!("failed to write temp output file: {e}"))?;
        tokio::fs::rename(&tmp_path, &output_path)
            .await
            .map_err(|e| format!("failed to publish output file: {e}"))?;

        Ok(output_path)
    }

    /// Step 7: mine additional term-map entries from search byproducts
    /// collected while translating this job's batches.
    async fn discover_new_terms(
        &self,
        payload: &JobPayload,
        existing: Option<&(TermMap, PathBuf)>,
        source_language_hint: Option<&str>,
        target_language: &str,
    ) {
        if !self.search_enabled || payload.nfo_file.is_none() {
            return;
        }
        let tool_calls = self.translator.collected_tool_calls().await;
        if tool_calls.is_empty() {
            return;
        }

        let (known, save_path) = match existing {
            Some((map, path)) => (map.clone(), path.clone()),
            None => {
                let Some(media_dir) = Path::new(&payload.media_file).parent() else { return };
                let source_base = source_language_hint
                    .map(|l| Language::parse(l).base().to_string())
                    .unwrap_or_else(|| infer_source_language_from_filename(payload.subtitle_file.as_deref()));
                let target_base = Language::parse(target_language).base().to_string();
                let path = media_dir.join(TermMap::filename(&source_base, &target_base));
                (TermMap::default(), path)
            }
        };

        match self.term_map_generator.extract_new_terms(&tool_calls, &known, target_language).await {
            Ok(new_terms) if !new_terms.is_empty() => {
                if let Err(err) = self.term_map_store.save_merging(&save_path, new_terms).await {
                    tracing::warn!(path = %save_path.display(), error = %err, "failed to persist discovered terms");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "post-translation term discovery failed");
            }
        }
    }
}

/// Step 6 path rule (§4.5, §6, T11): strip any pre-existing `_ctxtrans`
/// marker (and its dangling language suffix) from the stem, then produce
/// `<stem>_ctxtrans.<targetBase>.<ext>` in the media directory. The subtitle
/// extension is preserved when a source subtitle file is known; a
/// synthetic (embedded-extracted) source always publishes as `.srt`.
pub fn compute_output_path(media_file: &str, subtitle_file: Option<&str>, target_language: &str) -> PathBuf {
    let media_path = Path::new(media_file);
    let media_dir = media_path.parent().unwrap_or_else(|| Path::new("."));

    let base_stem = match subtitle_file {
        Some(sub) => Path::new(sub).file_stem().and_then(|s| s.to_str()).unwrap_or("output").to_string(),
        None => media_path.file_stem().and_then(|s| s.to_str()).unwrap_or("output").to_string(),
    };
    let cleaned_stem = CTXTRANS_MARKER_RE.replace(&base_stem, "").to_string();
    let target_base = Language::parse(target_language).base().to_string();
    let ext = subtitle_file
        .and_then(|s| Path::new(s).extension().and_then(|e| e.to_str()))
        .unwrap_or("srt")
        .to_string();

    media_dir.join(format!("{cleaned_stem}_ctxtrans.{target_base}.{ext}"))
}

fn infer_source_language_from_filename(subtitle_path: Option<&str>) -> String {
    let Some(path) = subtitle_path else { return "en".to_string() };
    let stem = Path::new(path).file_stem().and_then(|s| s.to_str()).unwrap_or("");
    match LANG_SUFFIX_RE.captures(stem) {
        Some(caps) => Language::parse(&caps[2]).base().to_string(),
        None => "en".to_string(),
    }
}

/// The directory a newly generated term map is saved in: the directory of
/// the NFO that backed generation (closest to `tvshow.nfo`), falling back
/// to the media directory.
fn nfo_ancestor_dir(nfo_path: &str, media_dir: &Path) -> PathBuf {
    Path::new(nfo_path).parent().map(Path::to_path_buf).unwrap_or_else(|| media_dir.to_path_buf())
}

#[async_trait]
impl JobExecutor for TranslationPipeline {
    async fn execute(&self, job: TranslationJob) -> Result<(), String> {
        self.translator.reset_collected_tool_calls().await;

        let target_language = self.target_language.read().await.clone();
        let payload = job.payload.clone();

        let (source_lines, source_is_synthetic, source_language) =
            self.resolve_source_subtitle(&job.id, &payload).await?;

        let term_map_entry = self
            .resolve_term_map(&payload, source_language.as_deref(), &target_language)
            .await;
        let term_map = term_map_entry.as_ref().map(|(map, _)| map);

        let translated = self
            .translate_with_checkpoints(&job.id, &source_lines, &target_language, term_map)
            .await?;

        self.write_output(&payload, source_is_synthetic, &source_lines, &translated, &target_language)
            .await?;

        self.discover_new_terms(&payload, term_map_entry.as_ref(), source_language.as_deref(), &target_language)
            .await;

        if let Some(store) = &self.store {
            if let Err(err) = store.clear_job_temp(&job.id).await {
                tracing::warn!(job_id = %job.id, error = %err, "failed to clear job temporaries");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_existing_ctxtrans_marker_from_stem() {
        assert_eq!(CTXTRANS_MARKER_RE.replace("foo_ctxtrans.zh", ""), "foo");
        assert_eq!(CTXTRANS_MARKER_RE.replace("foo_ctxtrans_embedded", ""), "foo");
        assert_eq!(CTXTRANS_MARKER_RE.replace("foo", ""), "foo");
    }

    #[test]
    fn infers_source_language_from_suffix() {
        assert_eq!(infer_source_language_from_filename(Some("/tv/ep01.eng.srt")), "en");
        assert_eq!(infer_source_language_from_filename(Some("/tv/ep01.srt")), "en");
        assert_eq!(infer_source_language_from_filename(None), "en");
    }

    #[test]
    fn output_path_never_compounds_ctxtrans_marker() {
        let first = compute_output_path("/lib/tv/Show/ep01.mkv", Some("/lib/tv/Show/ep01.srt"), "zh");
        assert_eq!(first, PathBuf::from("/lib/tv/Show/ep01_ctxtrans.zh.srt"));

        let retranslated = compute_output_path(
            "/lib/tv/Show/ep01.mkv",
            Some("/lib/tv/Show/ep01_ctxtrans.zh.srt"),
            "zh",
        );
        assert_eq!(retranslated, first);
    }

    #[test]
    fn output_path_for_embedded_extraction_defaults_to_srt() {
        let path = compute_output_path("/lib/tv/Show/ep01.mkv", None, "zh");
        assert_eq!(path, PathBuf::from("/lib/tv/Show/ep01_ctxtrans.zh.srt"));
    }
}
