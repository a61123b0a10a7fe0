//! Library projection types (§3) — derived read models produced by the
//! scanner (C2), never persisted.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub path: String,
    pub item_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub path: String,
    pub episode_count: usize,
}

impl Item {
    pub fn id_for(source_id: &str, dir_path: &str) -> String {
        format!("{source_id}|{dir_path}")
    }
}

/// Subtitle-coverage flags attached to an `Episode` by the scanner.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubtitleCoverage {
    pub has_source: bool,
    pub has_target: bool,
    pub has_embedded: bool,
    pub has_embedded_target: bool,
    pub source_subs: Vec<String>,
    pub target_subs: Vec<String>,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Episode {
    pub id: String,
    pub item_id: String,
    pub season: Option<u32>,
    pub name: String,
    pub media_path: String,
    pub subtitles: SubtitleCoverage,
    pub translatable: bool,
}

impl Episode {
    pub fn compute_translatable(coverage: &SubtitleCoverage) -> bool {
        coverage.has_source && !coverage.has_target
    }
}
