//! Language tag normalization.
//!
//! The telephony and speech providers exchange BCP-47 tags (`hi-IN`,
//! `en-US`); the engine works with two-letter codes internally. This module
//! maps between the two for the closed set of languages the pipeline
//! supports.

use serde::{Deserialize, Serialize};

/// A language the engine can listen and speak in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Bengali,
    Tamil,
    Telugu,
    Marathi,
    Gujarati,
    Kannada,
    Malayalam,
    Punjabi,
}

impl Language {
    /// All supported languages, in table order.
    pub const ALL: [Language; 10] = [
        Language::English,
        Language::Hindi,
        Language::Bengali,
        Language::Tamil,
        Language::Telugu,
        Language::Marathi,
        Language::Gujarati,
        Language::Kannada,
        Language::Malayalam,
        Language::Punjabi,
    ];

    /// Normalizes a BCP-47 tag (or bare code) to a supported language.
    ///
    /// Only the primary subtag is considered, case-insensitively: `hi-IN`,
    /// `HI`, and `hi` all map to [`Language::Hindi`]. Returns `None` for
    /// tags outside the supported set.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split('-').next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "en" => Some(Self::English),
            "hi" => Some(Self::Hindi),
            "bn" => Some(Self::Bengali),
            "ta" => Some(Self::Tamil),
            "te" => Some(Self::Telugu),
            "mr" => Some(Self::Marathi),
            "gu" => Some(Self::Gujarati),
            "kn" => Some(Self::Kannada),
            "ml" => Some(Self::Malayalam),
            "pa" => Some(Self::Punjabi),
            _ => None,
        }
    }

    /// The internal two-letter code.
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Bengali => "bn",
            Self::Tamil => "ta",
            Self::Telugu => "te",
            Self::Marathi => "mr",
            Self::Gujarati => "gu",
            Self::Kannada => "kn",
            Self::Malayalam => "ml",
            Self::Punjabi => "pa",
        }
    }

    /// The canonical BCP-47 tag sent to the speech backends.
    pub fn tag(self) -> &'static str {
        match self {
            Self::English => "en-IN",
            Self::Hindi => "hi-IN",
            Self::Bengali => "bn-IN",
            Self::Tamil => "ta-IN",
            Self::Telugu => "te-IN",
            Self::Marathi => "mr-IN",
            Self::Gujarati => "gu-IN",
            Self::Kannada => "kn-IN",
            Self::Malayalam => "ml-IN",
            Self::Punjabi => "pa-IN",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tag_strips_region_subtag() {
        assert_eq!(Language::from_tag("hi-IN"), Some(Language::Hindi));
        assert_eq!(Language::from_tag("en-US"), Some(Language::English));
        assert_eq!(Language::from_tag("ta"), Some(Language::Tamil));
    }

    #[test]
    fn from_tag_is_case_insensitive() {
        assert_eq!(Language::from_tag("HI-IN"), Some(Language::Hindi));
        assert_eq!(Language::from_tag("Bn"), Some(Language::Bengali));
    }

    #[test]
    fn from_tag_rejects_unknown() {
        assert_eq!(Language::from_tag("fr-FR"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    #[test]
    fn code_and_tag_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_tag(lang.code()), Some(lang));
            assert_eq!(Language::from_tag(lang.tag()), Some(lang));
        }
    }
}
