//! SubRip (`.srt`) parser/serializer (A2) — the concrete type behind the
//! "subtitle file parser/serializer" that §1 declares an opaque interface.
//!
//! Grammar: blocks of `index \n timestamp --> timestamp \n text... \n\n`,
//! tolerant of CRLF line endings and a leading UTF-8 BOM.

use crate::domain::entities::SubtitleLine;

#[derive(Debug, thiserror::Error)]
pub enum SrtError {
    #[error("malformed block at line {0}: {1}")]
    Malformed(usize, String),
}

/// Strips a UTF-8 BOM and normalizes CRLF to LF.
fn normalize(input: &str) -> String {
    let without_bom = input.strip_prefix('\u{feff}').unwrap_or(input);
    without_bom.replace("\r\n", "\n")
}

pub fn parse(input: &str) -> Result<Vec<SubtitleLine>, SrtError> {
    let normalized = normalize(input);
    let mut lines = Vec::new();

    for (block_no, block) in normalized.split("\n\n").enumerate() {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let mut it = block.lines();
        let index_line = it
            .next()
            .ok_or_else(|| SrtError::Malformed(block_no, "missing index line".to_string()))?;
        let index: usize = index_line
            .trim()
            .parse()
            .map_err(|_| SrtError::Malformed(block_no, format!("bad index: {index_line}")))?;

        let time_line = it
            .next()
            .ok_or_else(|| SrtError::Malformed(block_no, "missing timing line".to_string()))?;
        let (start, end) = time_line
            .split_once("-->")
            .map(|(a, b)| (a.trim().to_string(), b.trim().to_string()))
            .ok_or_else(|| SrtError::Malformed(block_no, format!("bad timing line: {time_line}")))?;

        let text = it.collect::<Vec<_>>().join("\n");

        lines.push(SubtitleLine { index, start, end, text });
    }

    Ok(lines)
}

/// Serializes with fresh 1-based sequential indices (T11's output-path
/// stability is about the filename; this is the analogous body invariant —
/// re-serialization never drifts from the line count or timing).
pub fn serialize(lines: &[SubtitleLine]) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(&(i + 1).to_string());
        out.push('\n');
        out.push_str(&line.start);
        out.push_str(" --> ");
        out.push_str(&line.end);
        out.push('\n');
        out.push_str(&line.text);
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_srt() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n";
        let lines = parse(srt).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello");
        assert_eq!(lines[1].start, "00:00:03,000");
    }

    #[test]
    fn tolerates_bom_and_crlf() {
        let srt = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n\r\n";
        let lines = parse(srt).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hi");
    }

    #[test]
    fn preserves_multiline_text() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nLine one\nLine two\n\n";
        let lines = parse(srt).unwrap();
        assert_eq!(lines[0].text, "Line one\nLine two");
    }

    #[test]
    fn round_trip_preserves_count_and_timings() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nA\n\n2\n00:00:03,000 --> 00:00:04,000\nB\n\n";
        let lines = parse(srt).unwrap();
        let rendered = serialize(&lines);
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(lines.len(), reparsed.len());
        for (a, b) in lines.iter().zip(reparsed.iter()) {
            assert_eq!(a.start, b.start);
            assert_eq!(a.end, b.end);
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn rejects_malformed_index() {
        let srt = "not-a-number\n00:00:01,000 --> 00:00:02,000\nHi\n\n";
        assert!(parse(srt).is_err());
    }
}
