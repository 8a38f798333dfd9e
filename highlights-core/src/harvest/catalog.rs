use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::browser::PageAutomation;
use crate::config::HarvestConfig;

use super::error::{HarvestError, HarvestResult};
use super::fallback::parse_count;
use super::models::Book;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogListing {
    pub books: Vec<Book>,
    pub entries_seen: usize,
    pub dropped_missing_asin: usize,
    pub duplicate_asins: usize,
}

impl CatalogListing {
    /// Reportable, non-fatal findings of the listing.
    pub fn diagnostics(&self) -> Vec<HarvestError> {
        let mut found = Vec::new();
        if self.books.is_empty() {
            found.push(HarvestError::CatalogEmpty);
        }
        if self.dropped_missing_asin > 0 {
            found.push(HarvestError::BookMissingAsin {
                count: self.dropped_missing_asin,
            });
        }
        found
    }
}

#[derive(Debug, Clone)]
pub struct CatalogDiscoverer {
    config: Arc<HarvestConfig>,
}

impl CatalogDiscoverer {
    pub fn new(config: Arc<HarvestConfig>) -> Self {
        Self { config }
    }

    /// Lists the library on the currently loaded notebook page, in document
    /// order. Field misses become `None`; entries without an asin are dropped.
    pub async fn list_books(&self, page: &mut dyn PageAutomation) -> HarvestResult<CatalogListing> {
        let selectors = &self.config.selectors.catalog;
        let ready = page
            .wait_for(&selectors.container, self.config.timeouts.catalog_ready())
            .await?;
        if !ready {
            warn!(selector = %selectors.container, "library container never appeared");
        }

        let entries = page.query_all(&selectors.entry).await?;
        let mut listing = CatalogListing {
            entries_seen: entries.len(),
            ..CatalogListing::default()
        };
        let mut seen = HashSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let Some(asin) = selectors.asin.resolve(page, Some(entry)).await else {
                warn!(entry = index, "catalog entry without asin dropped");
                listing.dropped_missing_asin += 1;
                continue;
            };
            if !seen.insert(asin.clone()) {
                debug!(asin = %asin, "duplicate catalog entry collapsed");
                listing.duplicate_asins += 1;
                continue;
            }

            let title = selectors.title.resolve(page, Some(entry)).await.unwrap_or_default();
            let author = selectors
                .author
                .resolve(page, Some(entry))
                .await
                .map(|raw| strip_label(&raw, &selectors.author_labels))
                .filter(|author| !author.is_empty());
            let cover_image_url = selectors.cover_image.resolve(page, Some(entry)).await;
            let last_annotated = selectors
                .annotated_date
                .resolve(page, Some(entry))
                .await
                .and_then(|raw| parse_annotated_date(&raw));
            let highlight_count = selectors
                .highlight_count
                .resolve(page, Some(entry))
                .await
                .and_then(|raw| parse_count(&raw));

            if title.is_empty() {
                debug!(asin = %asin, "catalog entry without title");
            }
            listing.books.push(Book {
                product_url: Some(self.config.product_url(&asin)),
                title,
                author,
                asin,
                cover_image_url,
                last_annotated,
                highlight_count,
            });
        }

        info!(
            books = listing.books.len(),
            dropped = listing.dropped_missing_asin,
            duplicates = listing.duplicate_asins,
            "catalog listed"
        );
        Ok(listing)
    }
}

fn strip_label(raw: &str, labels: &[String]) -> String {
    let trimmed = raw.trim();
    for label in labels {
        if let Some(rest) = trimmed.strip_prefix(label.as_str()) {
            return rest.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Accepts `"Sunday October 24, 2021"`, `"October 24, 2021"` or an ISO date.
pub fn parse_annotated_date(raw: &str) -> Option<NaiveDate> {
    static LONG_DATE: OnceLock<Regex> = OnceLock::new();
    let long_date = LONG_DATE
        .get_or_init(|| Regex::new(r"([A-Za-z]+)\s+(\d{1,2}),\s*(\d{4})").expect("valid regex"));
    let raw = raw.trim();
    if let Some(caps) = long_date.captures(raw) {
        let normalized = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%B %d %Y") {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
