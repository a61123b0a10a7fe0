//! Term-Map Subsystem (C7) — show-scoped bilingual glossaries: ancestor
//! search, file-locked load/save, agent-driven generation, and incremental
//! update from search byproducts collected during translation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::application::services::agent_loop::AgentLoop;
use crate::domain::entities::{TermMap, ToolCallRecord};
use crate::infrastructure::external::llm::ChatCompletionClient;
use crate::infrastructure::external::nfo::NfoMetadata;
use crate::infrastructure::external::search::SearchProvider;
use crate::shared::error::TermMapError;

/// Guards concurrent load-merge-save cycles on the same path. One mutex per
/// path, held across the whole save, matching §5's "per-path file lock"
/// (teacher's `in_memory_cache.rs` RwLock-guarded-HashMap idiom, generalized
/// to a lock registry rather than a value cache).
pub struct TermMapStore {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Default for TermMapStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TermMapStore {
    pub fn new() -> Self {
        Self { locks: Mutex::new(HashMap::new()) }
    }

    async fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(path.to_path_buf()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Ancestor search: walks from `media_dir` up to (and including) the
    /// filesystem root, returning the first directory containing
    /// `term_map.<src_base>-<tgt_base>.json`.
    pub fn find_ancestor(media_dir: &Path, src_base: &str, tgt_base: &str) -> Option<PathBuf> {
        let filename = TermMap::filename(src_base, tgt_base);
        let mut dir = Some(media_dir);
        while let Some(d) = dir {
            let candidate = d.join(&filename);
            if candidate.exists() {
                return Some(candidate);
            }
            dir = d.parent();
        }
        None
    }

    pub async fn load(&self, path: &Path) -> Result<TermMap, TermMapError> {
        let lock = self.lock_for(path).await;
        let _guard = lock.lock().await;
        Self::load_unlocked(path).await
    }

    async fn load_unlocked(path: &Path) -> Result<TermMap, TermMapError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| TermMapError::MalformedJson(format!("{}: {e}", path.display()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(TermMap::default()),
            Err(err) => Err(TermMapError::Io(err)),
        }
    }

    /// Merges `incoming` into whatever is currently on disk at `path`
    /// (existing keys win, per the TermMap invariant) and writes atomically.
    pub async fn save_merging(&self, path: &Path, incoming: TermMap) -> Result<TermMap, TermMapError> {
        let lock = self.lock_for(path).await;
        let _guard = lock.lock().await;

        let mut current = Self::load_unlocked(path).await?;
        current.merge_preserving_existing(incoming);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&current)
            .map_err(|e| TermMapError::MalformedJson(e.to_string()))?;
        let tmp_path = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp_path, &body).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        Ok(current)
    }
}

fn nfo_context(nfo: &NfoMetadata) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &nfo.title {
        lines.push(format!("title: {title}"));
    }
    if let Some(original) = &nfo.original_title {
        lines.push(format!("originaltitle: {original}"));
    }
    if !nfo.genres.is_empty() {
        lines.push(format!("genre: {}", nfo.genres.join(", ")));
    }
    if let Some(year) = nfo.year {
        lines.push(format!("year: {year}"));
    }
    if let Some(studio) = &nfo.studio {
        lines.push(format!("studio: {studio}"));
    }
    if !nfo.actors.is_empty() {
        lines.push(format!("actors: {}", nfo.actors.join(", ")));
    }
    lines.join("\n")
}

fn build_generation_prompt(target_language: &str) -> String {
    format!(
        "You are building a bilingual term glossary for subtitle translation into {target_language}. \
Given the media metadata below, identify important proper nouns — character names, place names, \
organization names, and the show/movie title — and their correct, official {target_language} renderings. \
Use web search if you need to confirm an official localized name. \
Respond with ONLY a JSON object mapping each source-language term to its {target_language} rendering, \
e.g. {{\"Okarun\": \"\\u5965\\u5361\\u8f6e\"}}. Do not include any other text."
    )
}

/// (c) of the Design Notes' JSON-extraction routine: a single-pass balanced
/// `{...}` scanner respecting string quoting and backslash escapes.
fn find_balanced_braces(s: &str) -> Option<&str> {
    #[derive(PartialEq)]
    enum State {
        Outside,
        InString,
        AfterEscape,
    }

    let bytes = s.as_bytes();
    let start = s.find('{')?;
    let mut depth = 0i32;
    let mut state = State::Outside;

    for (i, ch) in s.char_indices().skip_while(|(i, _)| *i < start) {
        match state {
            State::Outside => match ch {
                '"' => state = State::InString,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = i + ch.len_utf8();
                        return Some(&s[start..end]);
                    }
                }
                _ => {}
            },
            State::InString => match ch {
                '\\' => state = State::AfterEscape,
                '"' => state = State::Outside,
                _ => {}
            },
            State::AfterEscape => state = State::InString,
        }
    }
    let _ = bytes;
    None
}

/// Tolerant JSON-object extraction from model output: raw parse, then
/// markdown-fence extraction, then the balanced-brace scanner.
fn extract_json_object(content: &str) -> Option<TermMap> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(trimmed) {
        return Some(TermMap(map));
    }

    if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(fence_end) = after.find("```") {
            let inner = after[..fence_end].trim();
            if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(inner) {
                return Some(TermMap(map));
            }
            if let Some(braces) = find_balanced_braces(inner) {
                if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(braces) {
                    return Some(TermMap(map));
                }
            }
        }
    }

    if let Some(braces) = find_balanced_braces(trimmed) {
        if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(braces) {
            return Some(TermMap(map));
        }
    }

    None
}

/// Generates and incrementally extends term maps via the LLM agent loop.
/// Holds two agent-loop configurations over the same transport: one with
/// the search tool registered (generation), one without (the no-tools
/// follow-up/extraction passes, per §4.7).
pub struct TermMapGenerator {
    with_tools: AgentLoop,
    no_tools: AgentLoop,
}

const FOLLOW_UP_MAX_ITERATIONS: usize = 3;

impl TermMapGenerator {
    pub fn new(chat_client: Arc<dyn ChatCompletionClient>, search_provider: Option<Arc<dyn SearchProvider>>) -> Self {
        Self {
            with_tools: AgentLoop::new(chat_client.clone(), search_provider),
            no_tools: AgentLoop::new(chat_client, None),
        }
    }

    /// Generates a term map from NFO context. If the final content is empty
    /// but tool calls were made, falls back to a no-tools follow-up pass
    /// synthesizing JSON from the collected search results.
    pub async fn generate(&self, nfo: &NfoMetadata, target_language: &str) -> Result<TermMap, TermMapError> {
        let system_prompt = build_generation_prompt(target_language);
        let user_message = nfo_context(nfo);

        let result = self.with_tools.execute(system_prompt.clone(), user_message, None).await?;

        if let Some(map) = extract_json_object(&result.content) {
            return Ok(map);
        }

        if !result.tool_calls.is_empty() {
            return self.follow_up_from_tool_calls(&result.tool_calls, target_language).await;
        }

        Err(TermMapError::MalformedJson("agent returned no parseable term map".to_string()))
    }

    /// §4.5 step 7: post-translation term discovery from raw search results
    /// collected during the job's batches, filtered against `existing`.
    pub async fn extract_new_terms(
        &self,
        tool_calls: &[ToolCallRecord],
        existing: &TermMap,
        target_language: &str,
    ) -> Result<TermMap, TermMapError> {
        if tool_calls.is_empty() {
            return Ok(TermMap::default());
        }
        let mut extracted = self.follow_up_from_tool_calls(tool_calls, target_language).await?;
        extracted.0.retain(|k, _| !existing.0.contains_key(k));
        Ok(extracted)
    }

    async fn follow_up_from_tool_calls(
        &self,
        tool_calls: &[ToolCallRecord],
        target_language: &str,
    ) -> Result<TermMap, TermMapError> {
        let mut transcript = String::new();
        for call in tool_calls {
            if !call.is_error {
                transcript.push_str(&call.result);
                transcript.push('\n');
            }
        }

        let system_prompt = build_generation_prompt(target_language);
        let user_message = format!(
            "Raw search results collected so far:\n{transcript}\n\nProduce the JSON object now, with no other text."
        );

        let result = self
            .no_tools
            .execute(system_prompt, user_message, Some(FOLLOW_UP_MAX_ITERATIONS))
            .await?;

        extract_json_object(&result.content)
            .ok_or_else(|| TermMapError::MalformedJson("follow-up pass returned no parseable term map".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_raw_json_object() {
        let content = r#"{"Okarun": "Oka"}"#;
        let map = extract_json_object(content).unwrap();
        assert_eq!(map.0.get("Okarun"), Some(&"Oka".to_string()));
    }

    #[test]
    fn extracts_from_markdown_fence() {
        let content = "Here you go:\n```json\n{\"Goblin\": \"Mano\"}\n```\nDone.";
        let map = extract_json_object(content).unwrap();
        assert_eq!(map.0.get("Goblin"), Some(&"Mano".to_string()));
    }

    #[test]
    fn extracts_balanced_braces_amid_prose() {
        let content = r#"Sure, here's the map: {"A": "B", "nested": "has \"quotes\" inside"} — hope that helps!"#;
        let map = extract_json_object(content).unwrap();
        assert_eq!(map.0.get("A"), Some(&"B".to_string()));
        assert_eq!(map.0.get("nested"), Some(&"has \"quotes\" inside".to_string()));
    }

    #[test]
    fn returns_none_for_unparseable_content() {
        assert!(extract_json_object("no json here at all").is_none());
    }

    #[tokio::test]
    async fn ancestor_search_returns_closest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let show_dir = root.join("Show");
        let season_dir = show_dir.join("Season 1");
        tokio::fs::create_dir_all(&season_dir).await.unwrap();

        tokio::fs::write(show_dir.join("term_map.en-zh.json"), "{}").await.unwrap();

        let found = TermMapStore::find_ancestor(&season_dir, "en", "zh");
        assert_eq!(found, Some(show_dir.join("term_map.en-zh.json")));
    }

    #[tokio::test]
    async fn save_merging_preserves_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("term_map.en-zh.json");
        let store = TermMapStore::new();

        let mut first = HashMap::new();
        first.insert("Okarun".to_string(), "Okarun-zh".to_string());
        store.save_merging(&path, TermMap(first)).await.unwrap();

        let mut second = HashMap::new();
        second.insert("Okarun".to_string(), "different".to_string());
        second.insert("Momo".to_string(), "Momo-zh".to_string());
        let merged = store.save_merging(&path, TermMap(second)).await.unwrap();

        assert_eq!(merged.0.get("Okarun"), Some(&"Okarun-zh".to_string()));
        assert_eq!(merged.0.get("Momo"), Some(&"Momo-zh".to_string()));
    }
}
