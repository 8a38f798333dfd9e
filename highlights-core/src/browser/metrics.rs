use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestMetrics {
    pub pages_loaded: u64,
    pub stale_reloads: u64,
    pub highlights_extracted: u64,
    pub entries_skipped: u64,
    pub idle_interactions: u64,
    pub snapshots_captured: u64,
    pub books_harvested: u64,
    pub books_incomplete: u64,
    pub books_failed: u64,
}

impl HarvestMetrics {
    pub fn record_page_load(&mut self) {
        self.pages_loaded = self.pages_loaded.saturating_add(1);
    }

    pub fn record_stale_reload(&mut self) {
        self.stale_reloads = self.stale_reloads.saturating_add(1);
    }

    pub fn record_highlight(&mut self) {
        self.highlights_extracted = self.highlights_extracted.saturating_add(1);
    }

    pub fn record_skipped_entry(&mut self) {
        self.entries_skipped = self.entries_skipped.saturating_add(1);
    }

    pub fn record_idle(&mut self) {
        self.idle_interactions = self.idle_interactions.saturating_add(1);
    }

    pub fn record_snapshot(&mut self) {
        self.snapshots_captured = self.snapshots_captured.saturating_add(1);
    }

    pub fn record_book(&mut self, incomplete: bool) {
        self.books_harvested = self.books_harvested.saturating_add(1);
        if incomplete {
            self.books_incomplete = self.books_incomplete.saturating_add(1);
        }
    }

    pub fn record_book_failure(&mut self) {
        self.books_failed = self.books_failed.saturating_add(1);
    }

    pub fn skip_rate(&self) -> f64 {
        let seen = self.highlights_extracted + self.entries_skipped;
        if seen == 0 {
            0.0
        } else {
            (self.entries_skipped as f64 / seen as f64) * 100.0
        }
    }
}
