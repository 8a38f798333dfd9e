use chrono::NaiveDate;
use serde::Serialize;

use highlights_core::CatalogListing;

use crate::DisplayFallback;

#[derive(Debug, Serialize)]
pub struct BookList {
    pub books: Vec<BookRow>,
    pub dropped_missing_asin: usize,
    pub duplicate_asins: usize,
}

#[derive(Debug, Serialize)]
pub struct BookRow {
    pub asin: String,
    pub title: String,
    pub author: Option<String>,
    pub last_annotated: Option<NaiveDate>,
    pub highlight_count: Option<u32>,
}

impl BookList {
    pub fn from_listing(listing: &CatalogListing) -> Self {
        Self {
            books: listing
                .books
                .iter()
                .map(|book| BookRow {
                    asin: book.asin.clone(),
                    title: book.title.clone(),
                    author: book.author.clone(),
                    last_annotated: book.last_annotated,
                    highlight_count: book.highlight_count,
                })
                .collect(),
            dropped_missing_asin: listing.dropped_missing_asin,
            duplicate_asins: listing.duplicate_asins,
        }
    }
}

impl DisplayFallback for BookList {
    fn display(&self) -> String {
        if self.books.is_empty() {
            return "no annotated books found".to_string();
        }
        let mut lines: Vec<String> = self
            .books
            .iter()
            .map(|book| {
                let date = book
                    .last_annotated
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "{} | {} | {} | {}",
                    book.asin,
                    book.title,
                    book.author.as_deref().unwrap_or("-"),
                    date
                )
            })
            .collect();
        if self.dropped_missing_asin > 0 {
            lines.push(format!(
                "{} entries skipped without an ASIN",
                self.dropped_missing_asin
            ));
        }
        lines.join("\n")
    }
}
