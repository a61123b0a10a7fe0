//! NFO Parser Implementation
//!
//! Parses Kodi/XBMC .nfo files with encoding detection and multiple format
//! support. The reader itself is an out-of-scope collaborator (§1); this is
//! the teacher's concrete implementation behind it, narrowed per A3.

use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::debug;

use super::dto::{EpisodeNfoRoot, MovieNfoRoot, NfoMetadata, TvShowNfoRoot};

pub struct NfoParser;

impl NfoParser {
    /// Parses an NFO file, tolerant of UTF-8 or Latin-1 encoding.
    pub async fn parse(path: &Path) -> std::io::Result<Option<NfoMetadata>> {
        if !path.exists() {
            return Ok(None);
        }

        debug!("Parsing NFO file: {:?}", path);

        let mut file = tokio::fs::File::open(path).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;

        let content = match String::from_utf8(buffer.clone()) {
            Ok(s) => s,
            Err(_) => buffer.iter().map(|&b| b as char).collect(),
        };

        Ok(Self::parse_sync(&content))
    }

    /// Parses synchronously from already-read content (used by tests and
    /// by callers that already hold the file bytes).
    pub fn parse_sync(content: &str) -> Option<NfoMetadata> {
        Self::try_xml_parse(content)
    }

    fn try_xml_parse(content: &str) -> Option<NfoMetadata> {
        let trimmed = content.trim_start();
        if !trimmed.starts_with('<') {
            return None;
        }

        match Self::detect_root_element(content).as_deref() {
            Some("movie") => quick_xml::de::from_str::<MovieNfoRoot>(content).ok().map(|m| NfoMetadata {
                title: Some(m.title),
                original_title: m.originaltitle,
                genres: m.genre,
                year: m.year,
                studio: m.studio,
                actors: m.actors.into_iter().map(|a| a.name).collect(),
                aired: None,
                premiered: m.premiered,
                season: None,
                episode: None,
                is_xml: true,
                extraction_method: "xml_movie".to_string(),
            }),
            Some("episodedetails") => {
                quick_xml::de::from_str::<EpisodeNfoRoot>(content).ok().map(|root| {
                    let year = root
                        .aired
                        .as_ref()
                        .and_then(|d| d.split('-').next())
                        .and_then(|y| y.parse().ok());
                    NfoMetadata {
                        title: Some(root.title),
                        year,
                        aired: root.aired,
                        season: root.season,
                        episode: root.episode,
                        is_xml: true,
                        extraction_method: "xml_episode".to_string(),
                        ..Default::default()
                    }
                })
            }
            Some("tvshow") => quick_xml::de::from_str::<TvShowNfoRoot>(content).ok().map(|root| NfoMetadata {
                title: Some(root.title),
                genres: root.genre,
                studio: root.studio,
                actors: root.actors.into_iter().map(|a| a.name).collect(),
                premiered: root.premiered,
                is_xml: true,
                extraction_method: "xml_tvshow".to_string(),
                ..Default::default()
            }),
            _ => None,
        }
    }

    fn detect_root_element(content: &str) -> Option<String> {
        let content = content.trim_start();
        let content = if content.starts_with("<?xml") {
            content
                .find("?>")
                .map(|pos| content[pos + 2..].trim_start())
                .unwrap_or(content)
        } else {
            content
        };

        let start = content.find('<')?;
        let after_bracket = &content[start + 1..];
        let end = after_bracket
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(after_bracket.len());
        let tag_name = &after_bracket[..end];
        if !tag_name.is_empty() && !tag_name.starts_with('!') && !tag_name.starts_with('?') {
            Some(tag_name.to_lowercase())
        } else {
            None
        }
    }

    /// Finds NFO files for a media file: episode-level `<base>.nfo` first,
    /// then `tvshow.nfo`/`season.nfo`/`show.nfo` in the current and every
    /// ancestor directory (§4.4 step 4).
    pub fn find_nfo_candidates(media_path: &Path) -> Vec<std::path::PathBuf> {
        let mut candidates = Vec::new();

        let episode_nfo = media_path.with_extension("nfo");
        if episode_nfo.exists() {
            candidates.push(episode_nfo);
        }

        let mut dir = media_path.parent();
        while let Some(d) = dir {
            for name in ["tvshow.nfo", "season.nfo", "show.nfo", "movie.nfo"] {
                let candidate = d.join(name);
                if candidate.exists() {
                    candidates.push(candidate);
                }
            }
            dir = d.parent();
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movie_xml_with_studio_and_actors() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
    <title>Inception</title>
    <originaltitle>Inception</originaltitle>
    <year>2010</year>
    <premiered>2010-07-16</premiered>
    <studio>Warner Bros.</studio>
    <genre>Sci-Fi</genre>
    <actor><name>Leonardo DiCaprio</name></actor>
</movie>"#;

        let meta = NfoParser::parse_sync(xml).expect("should parse");
        assert_eq!(meta.title, Some("Inception".to_string()));
        assert_eq!(meta.studio, Some("Warner Bros.".to_string()));
        assert_eq!(meta.actors, vec!["Leonardo DiCaprio".to_string()]);
        assert_eq!(meta.best_date(), Some("2010-07-16".to_string()));
    }

    #[test]
    fn parses_episode_xml_aired_date() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<episodedetails>
    <title>Pilot</title>
    <season>1</season>
    <episode>1</episode>
    <aired>2008-01-20</aired>
</episodedetails>"#;

        let meta = NfoParser::parse_sync(xml).expect("should parse");
        assert_eq!(meta.season, Some(1));
        assert_eq!(meta.best_date(), Some("2008-01-20".to_string()));
    }

    #[test]
    fn non_xml_content_returns_none() {
        assert!(NfoParser::parse_sync("just some random text").is_none());
    }
}
