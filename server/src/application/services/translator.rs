//! Translator (§4.6) — the system/user prompt contract and the output
//! validation pipeline (`fixInlineBreakers`, `validateTermMappings`) that
//! sit between the agent loop and the translation pipeline (C5).

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::application::services::agent_loop::AgentLoop;
use crate::domain::entities::{TermMap, ToolCallRecord};
use crate::shared::error::PipelineError;

pub const INLINE_BREAKER: &str = "%%inline_breaker%%";

#[derive(Debug, Clone, Serialize)]
struct LineIn {
    index: usize,
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LineOut {
    index: usize,
    text: String,
}

#[derive(Debug, Serialize)]
struct UserMessage {
    lines: Vec<LineIn>,
}

/// Builds the system prompt verbatim per the rules, enumerating the term
/// map when one is loaded and adjusting the web-search budget accordingly.
pub fn build_system_prompt(target_language: &str, term_map: Option<&TermMap>) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "You are a subtitle translator. Translate each line into {target_language}.\n\n"
    ));
    prompt.push_str("Rules:\n");
    prompt.push_str("- Do NOT merge, split, reorder, or drop lines.\n");
    prompt.push_str("- One input line produces exactly one output line at the same index.\n");
    prompt.push_str(&format!(
        "- MUST preserve the count of {INLINE_BREAKER} in every line.\n"
    ));
    prompt.push_str("- If an input line is empty, output text for that index MUST be an empty string.\n");
    prompt.push_str("- Do NOT output literal newline characters in JSON text.\n");

    match term_map {
        Some(terms) if !terms.0.is_empty() => {
            prompt.push_str("- The following term mappings are authoritative. MUST use the mapped target term exactly:\n");
            let sorted: BTreeMap<&String, &String> = terms.0.iter().collect();
            for (source, target) in sorted {
                prompt.push_str(&format!("  \"{source}\" -> \"{target}\"\n"));
            }
            prompt.push_str("- At most 1 web_search call is permitted.\n");
        }
        _ => {
            prompt.push_str(
                "- When naming people, places, or titles, rank choices as: TERM MAPPINGS > official localized names > transliteration.\n",
            );
            prompt.push_str("- At most 2 web_search calls are permitted.\n");
        }
    }

    prompt.push_str(
        "\nRespond with a JSON array of objects {\"index\": <1-based integer>, \"text\": <string>} covering every input index exactly once, and nothing else.",
    );
    prompt
}

/// Builds the user message: 1-based indices, embedded newlines replaced by
/// the inline-breaker sentinel.
pub fn build_user_message(lines: &[String]) -> String {
    let payload = UserMessage {
        lines: lines
            .iter()
            .enumerate()
            .map(|(i, text)| LineIn { index: i + 1, text: text.replace('\n', INLINE_BREAKER) })
            .collect(),
    };
    serde_json::to_string(&payload).unwrap_or_else(|_| "{\"lines\":[]}".to_string())
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim();
        }
    }
    trimmed
}

/// Parses the agent's final content as a strict indexed JSON array and
/// applies `fixInlineBreakers` + `validateTermMappings` (§4.6).
pub fn parse_and_validate(
    content: &str,
    input_lines: &[String],
    term_map: Option<&TermMap>,
) -> Result<Vec<String>, PipelineError> {
    if content.trim().is_empty() {
        return Err(PipelineError::Codec("agent returned empty content".to_string()));
    }

    let cleaned = strip_code_fences(content);
    let parsed: Vec<LineOut> =
        serde_json::from_str(cleaned).map_err(|e| PipelineError::Codec(format!("malformed translation output: {e}")))?;

    let mut seen = std::collections::HashSet::new();
    for line in &parsed {
        if !seen.insert(line.index) {
            return Err(PipelineError::Codec(format!("duplicate index {} in translation output", line.index)));
        }
    }
    if parsed.len() != input_lines.len() {
        return Err(PipelineError::Codec(format!(
            "expected {} lines, got {}",
            input_lines.len(),
            parsed.len()
        )));
    }

    let mut ordered: Vec<(usize, String)> = parsed.into_iter().map(|l| (l.index, l.text)).collect();
    ordered.sort_by_key(|(index, _)| *index);

    let mut texts: Vec<String> = Vec::with_capacity(ordered.len());
    for (expected_index, (index, text)) in (1..=input_lines.len()).zip(ordered.into_iter()) {
        if index != expected_index {
            return Err(PipelineError::Codec(format!(
                "missing index {expected_index} in translation output"
            )));
        }
        texts.push(text);
    }

    for (i, text) in texts.iter_mut().enumerate() {
        *text = fix_inline_breakers(&input_lines[i], text);
    }

    if let Some(terms) = term_map {
        validate_term_mappings(input_lines, &texts, terms)?;
    }

    Ok(texts)
}

/// Aligns the inline-breaker count in `output` to that of `input`: inserts
/// at the midpoint when short, strips trailing occurrences when over.
fn fix_inline_breakers(input: &str, output: &str) -> String {
    let expected = input.matches(INLINE_BREAKER).count();
    let actual = output.matches(INLINE_BREAKER).count();

    if actual == expected {
        return output.to_string();
    }

    if actual < expected {
        let mut result = output.to_string();
        let missing = expected - actual;
        for _ in 0..missing {
            let midpoint = floor_char_boundary(&result, result.chars().count() / 2);
            result.insert_str(midpoint, INLINE_BREAKER);
        }
        result
    } else {
        let mut result = output.to_string();
        let mut extra = actual - expected;
        while extra > 0 {
            if let Some(pos) = result.rfind(INLINE_BREAKER) {
                result.replace_range(pos..pos + INLINE_BREAKER.len(), "");
                extra -= 1;
            } else {
                break;
            }
        }
        result
    }
}

fn floor_char_boundary(s: &str, char_index: usize) -> usize {
    s.char_indices().nth(char_index).map(|(byte_index, _)| byte_index).unwrap_or(s.len())
}

/// Checks that every term-map key occurring in an input line with word
/// boundaries on both sides has its mapped target term present in the
/// corresponding output line.
fn validate_term_mappings(inputs: &[String], outputs: &[String], term_map: &TermMap) -> Result<(), PipelineError> {
    for (source_term, target_term) in &term_map.0 {
        let pattern = format!(r"\b{}\b", regex::escape(source_term));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };

        for (input_line, output_line) in inputs.iter().zip(outputs.iter()) {
            if re.is_match(input_line) && !output_line.contains(target_term.as_str()) {
                return Err(PipelineError::Codec(format!(
                    "term mapping \"{source_term}\" -> \"{target_term}\" not honored in output line"
                )));
            }
        }
    }
    Ok(())
}

/// Wraps the agent loop with per-job tool-call accumulation so the pipeline
/// can harvest search byproducts after translating every batch.
pub struct Translator {
    agent: AgentLoop,
    max_iterations: usize,
    collected: Mutex<Vec<ToolCallRecord>>,
}

impl Translator {
    pub fn new(agent: AgentLoop, max_iterations: usize) -> Self {
        Self { agent, max_iterations, collected: Mutex::new(Vec::new()) }
    }

    pub async fn translate_batch(
        &self,
        lines: &[String],
        target_language: &str,
        term_map: Option<&TermMap>,
    ) -> Result<Vec<String>, PipelineError> {
        let system_prompt = build_system_prompt(target_language, term_map);
        let user_message = build_user_message(lines);

        let result = self
            .agent
            .execute(system_prompt, user_message, Some(self.max_iterations))
            .await
            .map_err(PipelineError::from)?;

        self.collected.lock().await.extend(result.tool_calls.clone());
        parse_and_validate(&result.content, lines, term_map)
    }

    pub async fn collected_tool_calls(&self) -> Vec<ToolCallRecord> {
        self.collected.lock().await.clone()
    }

    pub async fn reset_collected_tool_calls(&self) {
        self.collected.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn fix_inline_breakers_inserts_when_missing() {
        let input = format!("a{INLINE_BREAKER}b{INLINE_BREAKER}c");
        let output = "translated";
        let fixed = fix_inline_breakers(&input, output);
        assert_eq!(fixed.matches(INLINE_BREAKER).count(), 2);
    }

    #[test]
    fn fix_inline_breakers_strips_when_extra() {
        let input = "plain line";
        let output = format!("extra{INLINE_BREAKER}breaker{INLINE_BREAKER}here");
        let fixed = fix_inline_breakers(input, &output);
        assert_eq!(fixed.matches(INLINE_BREAKER).count(), 0);
    }

    #[test]
    fn parse_and_validate_rejects_duplicate_indices() {
        let content = r#"[{"index":1,"text":"a"},{"index":1,"text":"b"}]"#;
        let inputs = vec!["x".to_string(), "y".to_string()];
        assert!(parse_and_validate(content, &inputs, None).is_err());
    }

    #[test]
    fn parse_and_validate_reorders_by_index() {
        let content = r#"[{"index":2,"text":"second"},{"index":1,"text":"first"}]"#;
        let inputs = vec!["one".to_string(), "two".to_string()];
        let out = parse_and_validate(content, &inputs, None).unwrap();
        assert_eq!(out, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn validate_term_mappings_requires_word_boundary_match() {
        let mut map = HashMap::new();
        map.insert("Goblin".to_string(), "Manó".to_string());
        let term_map = TermMap(map);
        let inputs = vec!["The Goblin king arrives".to_string()];
        let good_outputs = vec!["A Manó király megérkezik".to_string()];
        assert!(validate_term_mappings(&inputs, &good_outputs, &term_map).is_ok());

        let bad_outputs = vec!["A kiraly megerkezik".to_string()];
        assert!(validate_term_mappings(&inputs, &bad_outputs, &term_map).is_err());
    }

    #[test]
    fn strip_code_fences_unwraps_json_block() {
        let wrapped = "```json\n[{\"index\":1,\"text\":\"hi\"}]\n```";
        assert_eq!(strip_code_fences(wrapped), "[{\"index\":1,\"text\":\"hi\"}]");
    }
}
