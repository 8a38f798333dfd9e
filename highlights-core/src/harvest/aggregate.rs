use std::collections::HashSet;

use tracing::{debug, warn};

use super::error::{HarvestError, HarvestResult};
use super::highlights::HarvestOutcome;
use super::models::{Book, Highlight, HighlightSet};

/// Turns a raw highlight sequence into a [`HighlightSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordAggregator;

impl RecordAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Dedups by `(text, location)`, keeps first occurrences in sequence
    /// order and renumbers them `0..n`. The book's reported count decides
    /// whether an empty result is an error.
    pub fn aggregate(&self, book: Book, raw: Vec<Highlight>) -> HarvestResult<HighlightSet> {
        let expected = book.highlight_count;
        self.build(book, raw, false, expected)
    }

    pub fn aggregate_outcome(&self, outcome: HarvestOutcome) -> HarvestResult<HighlightSet> {
        let HarvestOutcome {
            book,
            highlights,
            incomplete,
            expected_count,
            ..
        } = outcome;
        self.build(book, highlights, incomplete, expected_count)
    }

    fn build(
        &self,
        mut book: Book,
        raw: Vec<Highlight>,
        incomplete: bool,
        expected: Option<u32>,
    ) -> HarvestResult<HighlightSet> {
        let mut seen = HashSet::new();
        let mut highlights = Vec::with_capacity(raw.len());
        let mut duplicates = 0;
        for mut highlight in raw {
            if !seen.insert((highlight.text.clone(), highlight.location.clone())) {
                duplicates += 1;
                continue;
            }
            highlight.order = highlights.len();
            highlight.book_asin = book.asin.clone();
            highlights.push(highlight);
        }

        if highlights.is_empty() {
            if let Some(expected) = expected.filter(|count| *count > 0) {
                warn!(asin = %book.asin, expected, "no highlights extracted");
                return Err(HarvestError::EmptyResult {
                    asin: book.asin,
                    expected,
                });
            }
        }
        if duplicates > 0 {
            debug!(asin = %book.asin, duplicates, "duplicate highlights collapsed");
        }
        if book.highlight_count.is_none() {
            book.highlight_count = expected;
        }
        Ok(HighlightSet::new(book, highlights, incomplete, duplicates))
    }
}
