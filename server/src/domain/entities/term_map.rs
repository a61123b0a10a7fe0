//! TermMap entity (§3, §4.7) — show-scoped bilingual glossary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mapping from source-language surface form (case-sensitive) to its
/// target-language rendering. Serializes as a bare JSON object, matching
/// the on-disk `term_map.<srcBase>-<tgtBase>.json` format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermMap(pub HashMap<String, String>);

impl TermMap {
    pub fn filename(src_base: &str, tgt_base: &str) -> String {
        format!("term_map.{src_base}-{tgt_base}.json")
    }

    /// Merges `other` into `self` without overwriting any existing key
    /// (§3 invariant: prior entries are never silently overwritten).
    pub fn merge_preserving_existing(&mut self, other: TermMap) {
        for (k, v) in other.0 {
            self.0.entry(k).or_insert(v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
