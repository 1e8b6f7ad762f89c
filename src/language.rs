//! Coarse keyword-overlap language detection for search queries.
//!
//! The detector only decides between English and Indonesian. Arabic queries
//! (and anything else) fall through to [`Language::Auto`]; the multilingual
//! embedding model is expected to handle them without a hint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language tags understood by the search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// Arabic source text.
    #[serde(rename = "ar")]
    Arabic,
    /// English.
    #[serde(rename = "en")]
    English,
    /// Bahasa Indonesia.
    #[serde(rename = "id")]
    Indonesian,
    /// Unknown or undetermined.
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl Language {
    /// Short tag used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Self::Arabic => "ar",
            Self::English => "en",
            Self::Indonesian => "id",
            Self::Auto => "auto",
        }
    }

    /// Human readable name, used in translation prompts.
    pub fn name(self) -> &'static str {
        match self {
            Self::Arabic => "Arabic",
            Self::English => "English",
            Self::Indonesian => "Indonesian",
            Self::Auto => "the detected language",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ar" => Ok(Self::Arabic),
            "en" => Ok(Self::English),
            "id" => Ok(Self::Indonesian),
            "auto" | "" => Ok(Self::Auto),
            other => Err(format!("unsupported language tag {other:?}")),
        }
    }
}

const ENGLISH_KEYWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "in", "on", "to", "is", "are", "was", "about", "what",
    "how", "why", "who", "which", "with", "for", "from", "this", "that", "hadith", "prophet",
    "prayer", "intention", "faith", "fasting", "charity", "knowledge", "mercy", "night",
    "book", "chapter", "narrated", "messenger", "companions", "good", "deeds",
];

const INDONESIAN_KEYWORDS: &[&str] = &[
    "yang", "dan", "di", "ke", "dari", "tentang", "untuk", "dengan", "ini", "itu", "apa",
    "bagaimana", "mengapa", "siapa", "adalah", "atau", "dalam", "pada", "hadis", "hadits",
    "nabi", "rasul", "niat", "sholat", "shalat", "iman", "puasa", "sedekah", "ilmu", "rahmat",
    "malam", "kitab", "bab", "diriwayatkan", "sahabat", "amal", "baik", "doa",
];

/// Fixed mapping from a detectable language to its keyword set.
const KEYWORD_SETS: &[(Language, &[&str])] = &[
    (Language::English, ENGLISH_KEYWORDS),
    (Language::Indonesian, INDONESIAN_KEYWORDS),
];

/// Classifies a free-text query by keyword overlap.
///
/// Returns the language whose keyword set has strictly more token hits than
/// every other set, otherwise [`Language::Auto`].
pub fn detect(query: &str) -> Language {
    let lowered = query.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    if tokens.is_empty() {
        return Language::Auto;
    }

    let mut best = Language::Auto;
    let mut best_hits = 0usize;
    let mut tied = true;
    for (language, keywords) in KEYWORD_SETS {
        let hits = tokens.iter().filter(|tok| keywords.contains(tok)).count();
        if hits > best_hits {
            best = *language;
            best_hits = hits;
            tied = false;
        } else if hits == best_hits {
            tied = true;
        }
    }
    if tied || best_hits == 0 {
        Language::Auto
    } else {
        best
    }
}

/// Picks the caller's explicit hint when given, otherwise detects from the query.
pub fn resolve(hint: Option<Language>, query: &str) -> Language {
    match hint {
        Some(language) if language != Language::Auto => language,
        _ => detect(query),
    }
}
