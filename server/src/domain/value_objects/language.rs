//! IETF BCP-47 base language tag extraction and ISO 639-2/B alias mapping.
//!
//! Generalizes the alias table the teacher used for external-subtitle
//! filename suffixes (`movie.hun.srt` etc.) into a reusable language value
//! object shared by the scanner, the scheduler's base-name grouping, and
//! the term-map filename convention.

/// (aliases, ISO 639-1 base code, display name)
const PATTERNS: &[(&[&str], &str, &str)] = &[
    (&["hu", "hun", "hungarian"], "hu", "Magyar"),
    (&["en", "eng", "english"], "en", "English"),
    (&["de", "deu", "ger", "german"], "de", "Deutsch"),
    (&["es", "spa", "spanish"], "es", "Espanol"),
    (&["fr", "fra", "fre", "french"], "fr", "Francais"),
    (&["it", "ita", "italian"], "it", "Italiano"),
    (&["pt", "por", "portuguese"], "pt", "Portugues"),
    (&["ru", "rus", "russian"], "ru", "Russian"),
    (&["pl", "pol", "polish"], "pl", "Polski"),
    (&["nl", "dut", "nld", "dutch"], "nl", "Nederlands"),
    (&["ja", "jpn", "japanese"], "ja", "Japanese"),
    (&["ko", "kor", "korean"], "ko", "Korean"),
    (&["zh", "chi", "zho", "chinese"], "zh", "Chinese"),
    (&["ar", "ara", "arabic"], "ar", "Arabic"),
    (&["cs", "cze", "ces", "czech"], "cs", "Cesky"),
    (&["sv", "swe", "swedish"], "sv", "Svenska"),
    (&["da", "dan", "danish"], "da", "Dansk"),
    (&["fi", "fin", "finnish"], "fi", "Suomi"),
    (&["no", "nor", "norwegian"], "no", "Norsk"),
    (&["el", "gre", "ell", "greek"], "el", "Greek"),
    (&["he", "heb", "hebrew"], "he", "Hebrew"),
    (&["tr", "tur", "turkish"], "tr", "Turkce"),
    (&["th", "tha", "thai"], "th", "Thai"),
    (&["vi", "vie", "vietnamese"], "vi", "Vietnamese"),
    (&["ro", "rum", "ron", "romanian"], "ro", "Romana"),
    (&["uk", "ukr", "ukrainian"], "uk", "Ukrainian"),
    (&["bg", "bul", "bulgarian"], "bg", "Bulgarian"),
    (&["hr", "hrv", "croatian"], "hr", "Hrvatski"),
    (&["sk", "slo", "slk", "slovak"], "sk", "Slovensky"),
    (&["sl", "slv", "slovenian"], "sl", "Slovenscina"),
];

/// A language tag, normalized to its IETF BCP-47 base subtag (e.g. "fr").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    base: String,
    display_name: Option<String>,
}

impl Language {
    /// Resolves any recognized alias (ISO 639-1, ISO 639-2/B, or English name)
    /// to its base subtag. Unknown tokens pass through lowercased, unmapped.
    pub fn parse(token: &str) -> Self {
        let lower = token.trim().to_lowercase();
        for (aliases, base, name) in PATTERNS {
            if aliases.contains(&lower.as_str()) {
                return Language {
                    base: base.to_string(),
                    display_name: Some(name.to_string()),
                };
            }
        }
        Language {
            base: lower,
            display_name: None,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// True when `other`'s base subtag matches this one, after alias normalization.
    pub fn matches(&self, other: &str) -> bool {
        self.base == Language::parse(other).base
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize_to_base() {
        assert_eq!(Language::parse("fre").base(), "fr");
        assert_eq!(Language::parse("chi").base(), "zh");
        assert_eq!(Language::parse("eng").base(), "en");
        assert_eq!(Language::parse("FRENCH").base(), "fr");
    }

    #[test]
    fn unknown_token_passes_through() {
        let lang = Language::parse("xyz");
        assert_eq!(lang.base(), "xyz");
        assert_eq!(lang.display_name(), None);
    }

    #[test]
    fn matches_is_alias_aware() {
        let target = Language::parse("fr");
        assert!(target.matches("fre"));
        assert!(target.matches("french"));
        assert!(!target.matches("en"));
    }
}
