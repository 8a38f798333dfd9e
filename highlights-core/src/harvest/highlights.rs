use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{ElementHandle, HarvestMetrics, HumanPacer, PageAutomation, RetryPolicy};
use crate::clock::Clock;
use crate::config::HarvestConfig;

use super::cancel::CancelFlag;
use super::capture::{DebugCapture, PageSnapshot};
use super::error::HarvestResult;
use super::events::{emit, EventSink, HarvestEvent};
use super::fallback::{parse_count, trailing_number};
use super::models::{Book, Highlight, HighlightColor};

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStop {
    LastPage,
    PageLimit,
    Stale,
    NotReady,
}

/// Raw harvest of one book, before aggregation.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub book: Book,
    pub highlights: Vec<Highlight>,
    pub pages: usize,
    pub incomplete: bool,
    pub stop: PageStop,
    pub expected_count: Option<u32>,
    pub skipped_entries: usize,
    pub stale_reloads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Advance {
    Navigate(String),
    Click(String),
}

struct PageHarvest {
    highlights: Vec<Highlight>,
    skipped: usize,
    signature: String,
}

#[derive(Debug)]
pub struct HighlightHarvester {
    config: Arc<HarvestConfig>,
    clock: Arc<dyn Clock>,
    pacer: HumanPacer,
    retry: RetryPolicy,
    capture: Option<Arc<dyn DebugCapture>>,
    events: Option<EventSink>,
    metrics: HarvestMetrics,
}

impl HighlightHarvester {
    pub fn new(config: Arc<HarvestConfig>, clock: Arc<dyn Clock>) -> Self {
        let pacer = HumanPacer::new(config.pacing.clone(), Arc::clone(&clock));
        let retry = RetryPolicy::new(&config.pagination);
        Self {
            config,
            clock,
            pacer,
            retry,
            capture: None,
            events: None,
            metrics: HarvestMetrics::default(),
        }
    }

    pub fn with_pacer(mut self, pacer: HumanPacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn DebugCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics(&self) -> &HarvestMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut HarvestMetrics {
        &mut self.metrics
    }

    /// Walks every highlight page of `book`. Returns what was gathered even
    /// when pagination had to stop early; only cancellation and capability
    /// errors surface as `Err`.
    pub async fn extract_highlights(
        &mut self,
        page: &mut dyn PageAutomation,
        book: &Book,
        cancel: &CancelFlag,
    ) -> HarvestResult<HarvestOutcome> {
        let asin = book.asin.as_str();
        let notebook = self.config.notebook_url().to_string();
        let max_pages = self.config.pagination.max_pages;
        info!(asin = %asin, title = %book.title, "harvesting highlights");

        let mut outcome = HarvestOutcome {
            book: book.clone(),
            highlights: Vec::new(),
            pages: 0,
            incomplete: false,
            stop: PageStop::LastPage,
            expected_count: book.highlight_count,
            skipped_entries: 0,
            stale_reloads: 0,
        };
        let mut advance = Advance::Navigate(highlights_url(&notebook, asin, None, None));
        let mut previous_signature: Option<String> = None;

        'pages: loop {
            if outcome.pages >= max_pages {
                warn!(asin = %asin, max_pages, "page guard reached; harvest is incomplete");
                outcome.stop = PageStop::PageLimit;
                outcome.incomplete = true;
                break;
            }
            cancel.check()?;
            self.pacer.delay_before_action().await;
            self.perform(page, &advance).await?;
            self.metrics.record_page_load();
            let page_number = outcome.pages + 1;

            if !self.page_ready(page).await? {
                warn!(asin = %asin, page = page_number, "highlight page never became ready");
                if page_number == 1 {
                    self.snapshot(page, asin).await;
                }
                outcome.stop = PageStop::NotReady;
                outcome.incomplete = true;
                break;
            }

            if page_number == 1 {
                outcome.expected_count = self
                    .config
                    .selectors
                    .highlights
                    .expected_count
                    .resolve(page, None)
                    .await
                    .and_then(|raw| parse_count(&raw))
                    .or(book.highlight_count);
            }

            let mut harvest = self.harvest_page(page, asin, cancel).await?;
            if page_number == 1 && harvest.highlights.is_empty() && harvest.skipped == 0 {
                self.snapshot(page, asin).await;
            }

            let mut retries = 0;
            while previous_signature.as_deref() == Some(harvest.signature.as_str()) {
                if retries >= self.retry.max_retries() {
                    warn!(asin = %asin, page = page_number, retries, "page content is stale");
                    emit(
                        self.events.as_ref(),
                        HarvestEvent::StalePage {
                            asin: asin.to_string(),
                            page: page_number,
                        },
                    );
                    outcome.stop = PageStop::Stale;
                    outcome.incomplete = true;
                    break 'pages;
                }
                retries += 1;
                let delay = self.retry.jittered_delay(retries);
                debug!(asin = %asin, page = page_number, retry = retries, ?delay, "reloading stale page");
                self.clock.sleep(delay).await;
                cancel.check()?;

                let reload = match &advance {
                    Advance::Navigate(url) => url.clone(),
                    Advance::Click(_) => page.current_url().await?,
                };
                page.navigate(&reload).await?;
                self.metrics.record_stale_reload();
                outcome.stale_reloads += 1;
                if self.page_ready(page).await? {
                    harvest = self.harvest_page(page, asin, cancel).await?;
                }
            }

            let accepted = harvest.highlights.len();
            for mut highlight in harvest.highlights {
                highlight.order = outcome.highlights.len();
                outcome.highlights.push(highlight);
                self.metrics.record_highlight();
            }
            outcome.skipped_entries += harvest.skipped;
            outcome.pages = page_number;
            previous_signature = Some(harvest.signature);
            debug!(asin = %asin, page = page_number, highlights = accepted, "page harvested");
            emit(
                self.events.as_ref(),
                HarvestEvent::PageHarvested {
                    asin: asin.to_string(),
                    page: page_number,
                    highlights: accepted,
                },
            );

            if self.pacer.maybe_idle(page).await {
                self.metrics.record_idle();
            }

            match self.next_page(page, &notebook, asin).await? {
                Some(next) => advance = next,
                None => {
                    outcome.stop = PageStop::LastPage;
                    break;
                }
            }
        }

        info!(
            asin = %asin,
            pages = outcome.pages,
            highlights = outcome.highlights.len(),
            skipped = outcome.skipped_entries,
            incomplete = outcome.incomplete,
            "book harvested"
        );
        Ok(outcome)
    }

    async fn perform(&self, page: &mut dyn PageAutomation, advance: &Advance) -> HarvestResult<()> {
        match advance {
            Advance::Navigate(url) => page.navigate(url).await?,
            Advance::Click(selector) => {
                if let Some(control) = page.query_all(selector).await?.into_iter().next() {
                    page.click(control).await?;
                }
            }
        }
        Ok(())
    }

    async fn page_ready(&self, page: &mut dyn PageAutomation) -> HarvestResult<bool> {
        Ok(page
            .wait_for(
                &self.config.selectors.highlights.container,
                self.config.timeouts.page_ready(),
            )
            .await?)
    }

    async fn harvest_page(
        &mut self,
        page: &mut dyn PageAutomation,
        asin: &str,
        cancel: &CancelFlag,
    ) -> HarvestResult<PageHarvest> {
        let entries = page
            .query_all(&self.config.selectors.highlights.entry)
            .await?;
        let mut highlights = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for entry in entries {
            cancel.check()?;
            match self.extract_entry(page, entry, asin).await {
                Some(highlight) => highlights.push(highlight),
                None => {
                    skipped += 1;
                    self.metrics.record_skipped_entry();
                }
            }
        }
        let signature = content_signature(highlights.len() + skipped, &highlights);
        Ok(PageHarvest {
            highlights,
            skipped,
            signature,
        })
    }

    async fn extract_entry(
        &self,
        page: &mut dyn PageAutomation,
        entry: ElementHandle,
        asin: &str,
    ) -> Option<Highlight> {
        let selectors = &self.config.selectors.highlights;
        let Some(text) = selectors.text.resolve(page, Some(entry)).await else {
            debug!(asin = %asin, "entry without highlight text skipped");
            return None;
        };
        let location = selectors.location.resolve(page, Some(entry)).await;
        let page_label = selectors
            .page
            .resolve(page, Some(entry))
            .await
            .and_then(|header| trailing_number(&header));
        let note = selectors.note.resolve(page, Some(entry)).await;
        let color = selectors
            .color
            .resolve(page, Some(entry))
            .await
            .map(|classes| HighlightColor::from_class_list(&classes, &selectors.color_marker))
            .unwrap_or_default();
        Some(Highlight {
            text,
            location,
            page: page_label,
            note,
            color,
            book_asin: asin.to_string(),
            order: 0,
        })
    }

    async fn next_page(
        &self,
        page: &mut dyn PageAutomation,
        notebook: &str,
        asin: &str,
    ) -> HarvestResult<Option<Advance>> {
        let pagination = &self.config.selectors.pagination;
        if let Some(token) = pagination.token.resolve(page, None).await {
            let state = pagination.content_limit_state.resolve(page, None).await;
            return Ok(Some(Advance::Navigate(highlights_url(
                notebook,
                asin,
                Some(&token),
                state.as_deref(),
            ))));
        }
        if let Some(selector) = &pagination.next_control {
            if !page.query_all(selector).await?.is_empty() {
                return Ok(Some(Advance::Click(selector.clone())));
            }
        }
        Ok(None)
    }

    async fn snapshot(&mut self, page: &mut dyn PageAutomation, asin: &str) {
        let Some(capture) = self.capture.clone() else {
            return;
        };
        let html = match page.page_source().await {
            Ok(html) => html,
            Err(err) => {
                warn!(asin = %asin, error = %err, "could not read page source for snapshot");
                return;
            }
        };
        let url = page.current_url().await.unwrap_or_default();
        let snapshot = PageSnapshot {
            asin: asin.to_string(),
            captured_at: Utc::now(),
            url,
            html,
        };
        match capture.capture(&snapshot).await {
            Ok(()) => self.metrics.record_snapshot(),
            Err(err) => warn!(asin = %asin, error = %err, "debug snapshot failed"),
        }
    }
}

/// Highlight page URL: `<notebook>?asin=..&contentLimitState=..[&token=..]`.
pub fn highlights_url(
    notebook: &str,
    asin: &str,
    token: Option<&str>,
    content_limit_state: Option<&str>,
) -> String {
    match Url::parse(notebook) {
        Ok(mut url) => {
            {
                let mut query = url.query_pairs_mut();
                query.clear();
                query.append_pair("asin", asin);
                query.append_pair("contentLimitState", content_limit_state.unwrap_or(""));
                if let Some(token) = token {
                    query.append_pair("token", token);
                }
            }
            url.to_string()
        }
        Err(err) => {
            debug!(notebook, error = %err, "notebook url is not absolute");
            let mut url = format!(
                "{notebook}?asin={asin}&contentLimitState={}",
                content_limit_state.unwrap_or("")
            );
            if let Some(token) = token {
                url.push_str("&token=");
                url.push_str(token);
            }
            url
        }
    }
}

/// Hash of the entry count and the accepted texts of one page.
fn content_signature(entries: usize, highlights: &[Highlight]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((entries as u64).to_le_bytes());
    for highlight in highlights {
        hasher.update(highlight.text.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}
