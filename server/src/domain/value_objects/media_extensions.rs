//! Recognized file extensions (§6 "Filesystem conventions").

const MEDIA_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "m4v", "mov", "avi", "wmv", "flv", "webm", "ogv", "3gp", "3g2", "f4v", "asf", "rm",
    "rmvb", "ts", "m2ts", "mts", "vob", "mpg", "mpeg", "m2v", "divx", "xvid",
];

/// Extensions the subtitle-presence classifier treats as source/target
/// candidates for translation.
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sub", "idx", "sup", "txt"];

/// Extensions recognized only for classification/counting, never as a
/// translation source or target.
const SUBTITLE_CLASSIFICATION_ONLY_EXTENSIONS: &[&str] =
    &["usf", "ttml", "dfxp", "sbv", "lrc", "rt", "smi", "stl"];

fn ext_of(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

pub fn is_media_file(path: &str) -> bool {
    ext_of(path).is_some_and(|e| MEDIA_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_subtitle_file(path: &str) -> bool {
    ext_of(path).is_some_and(|e| {
        SUBTITLE_EXTENSIONS.contains(&e.as_str()) || SUBTITLE_CLASSIFICATION_ONLY_EXTENSIONS.contains(&e.as_str())
    })
}

/// A subtitle file recognized as a translation source or target candidate
/// (i.e. excluding the classification-only formats).
pub fn is_translatable_subtitle_file(path: &str) -> bool {
    ext_of(path).is_some_and(|e| SUBTITLE_EXTENSIONS.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_media_extensions() {
        assert!(is_media_file("/lib/ep01.mkv"));
        assert!(is_media_file("/lib/ep01.MP4"));
        assert!(!is_media_file("/lib/ep01.srt"));
    }

    #[test]
    fn classification_only_subs_count_but_do_not_translate() {
        assert!(is_subtitle_file("/lib/ep01.ttml"));
        assert!(!is_translatable_subtitle_file("/lib/ep01.ttml"));
        assert!(is_translatable_subtitle_file("/lib/ep01.srt"));
    }
}
