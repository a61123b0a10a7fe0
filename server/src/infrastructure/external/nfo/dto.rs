//! NFO Data Transfer Objects
//!
//! Structures for NFO file metadata parsing, narrowed (per A3) to the
//! fields the term-map generator (title/originaltitle/genre/year/studio/
//! actors) and the scheduler's release-date filter (aired/premiered/year)
//! actually need.

use serde::Deserialize;

/// Parsed NFO metadata from Kodi/XBMC format files.
#[derive(Debug, Clone, Default)]
pub struct NfoMetadata {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub studio: Option<String>,
    pub actors: Vec<String>,
    /// Episode air date (`aired`), `YYYY-MM-DD` when present.
    pub aired: Option<String>,
    /// Movie/show release date (`premiered`), `YYYY-MM-DD` when present.
    pub premiered: Option<String>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub is_xml: bool,
    pub extraction_method: String,
}

impl NfoMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// The best available date for the release-date filter (§4.4 step 5):
    /// `aired | premiered | year`, preferring the most specific.
    pub fn best_date(&self) -> Option<String> {
        self.aired
            .clone()
            .or_else(|| self.premiered.clone())
            .or_else(|| self.year.map(|y| format!("{y}-01-01")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "movie")]
pub(crate) struct MovieNfoRoot {
    pub title: String,
    pub originaltitle: Option<String>,
    pub year: Option<i32>,
    pub premiered: Option<String>,
    pub studio: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    #[serde(default, rename = "actor")]
    pub actors: Vec<ActorRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "episodedetails")]
pub(crate) struct EpisodeNfoRoot {
    pub title: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub aired: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "tvshow")]
pub(crate) struct TvShowNfoRoot {
    pub title: String,
    pub premiered: Option<String>,
    pub studio: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    #[serde(default, rename = "actor")]
    pub actors: Vec<ActorRef>,
}
