use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One entry of the user's annotated library. `asin` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: Option<String>,
    pub asin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_annotated: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

impl Book {
    pub fn new(asin: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
            asin: asin.into(),
            cover_image_url: None,
            last_annotated: None,
            highlight_count: None,
            product_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    Yellow,
    Blue,
    Pink,
    Orange,
    #[default]
    Unknown,
}

impl HighlightColor {
    /// Maps a marker token such as `highlight-pink` (or a bare `pink`).
    pub fn from_marker(token: &str) -> Self {
        let name = token
            .rsplit_once("highlight-")
            .map(|(_, name)| name)
            .unwrap_or(token);
        match name.trim().to_ascii_lowercase().as_str() {
            "yellow" => Self::Yellow,
            "blue" => Self::Blue,
            "pink" => Self::Pink,
            "orange" => Self::Orange,
            _ => Self::Unknown,
        }
    }

    /// Picks the first class token carrying `marker` and maps what follows it.
    pub fn from_class_list(classes: &str, marker: &str) -> Self {
        classes
            .split_whitespace()
            .filter_map(|token| token.rsplit_once(marker).map(|(_, name)| name))
            .map(Self::from_marker)
            .find(|color| *color != Self::Unknown)
            .unwrap_or(Self::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Pink => "pink",
            Self::Orange => "orange",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub text: String,
    pub location: Option<String>,
    pub page: Option<String>,
    pub note: Option<String>,
    pub color: HighlightColor,
    pub book_asin: String,
    pub order: usize,
}

/// Aggregated, immutable result for one book. Built by
/// [`super::RecordAggregator`] or parsed back from an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSet {
    book: Book,
    highlights: Vec<Highlight>,
    incomplete: bool,
    #[serde(skip)]
    duplicates_removed: usize,
}

impl HighlightSet {
    pub(crate) fn new(
        book: Book,
        highlights: Vec<Highlight>,
        incomplete: bool,
        duplicates_removed: usize,
    ) -> Self {
        Self {
            book,
            highlights,
            incomplete,
            duplicates_removed,
        }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn duplicates_removed(&self) -> usize {
        self.duplicates_removed
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }
}
