use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::browser::{
    BrowserAutomation, BrowserContext, BrowserLauncher, HarvestMetrics, LaunchOverrides,
    PageAutomation,
};
use crate::clock::{Clock, TokioClock};
use crate::config::HarvestConfig;

use super::aggregate::RecordAggregator;
use super::cancel::CancelFlag;
use super::capture::{DebugCapture, FileCapture};
use super::catalog::{CatalogDiscoverer, CatalogListing};
use super::error::{HarvestError, HarvestResult};
use super::events::{emit, EventSink, HarvestEvent};
use super::highlights::{HarvestOutcome, HighlightHarvester, PageStop};
use super::models::{Book, HighlightSet};
use super::session::{HarvestSession, SessionGate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BookSelection {
    #[default]
    All,
    Asins(Vec<String>),
}

impl BookSelection {
    fn includes(&self, book: &Book) -> bool {
        match self {
            BookSelection::All => true,
            BookSelection::Asins(asins) => asins.iter().any(|asin| *asin == book.asin),
        }
    }
}

#[derive(Debug)]
pub struct BookFailure {
    pub book: Book,
    pub error: HarvestError,
}

/// Everything one run produced. Sets of books finished before a
/// cancellation are kept; the interrupted book is not.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub session: HarvestSession,
    pub catalog: CatalogListing,
    pub sets: Vec<HighlightSet>,
    pub failures: Vec<BookFailure>,
    pub diagnostics: Vec<HarvestError>,
    pub cancelled: bool,
    pub metrics: HarvestMetrics,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            session: HarvestSession::default(),
            catalog: CatalogListing::default(),
            sets: Vec::new(),
            failures: Vec::new(),
            diagnostics: Vec::new(),
            cancelled: false,
            metrics: HarvestMetrics::default(),
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

/// Drives gate, catalog, harvester and aggregator over one page session.
#[derive(Debug, Clone)]
pub struct HarvestRun {
    config: Arc<HarvestConfig>,
    clock: Arc<dyn Clock>,
    capture: Option<Arc<dyn DebugCapture>>,
    events: Option<EventSink>,
    cancel: CancelFlag,
}

impl HarvestRun {
    pub fn new(config: Arc<HarvestConfig>) -> Self {
        let capture: Option<Arc<dyn DebugCapture>> = if config.capture.enabled {
            Some(Arc::new(FileCapture::new(config.capture.directory.clone())))
        } else {
            None
        };
        Self {
            config,
            clock: Arc::new(TokioClock),
            capture,
            events: None,
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
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

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Launches Chromium, runs, and shuts the browser down on every path.
    pub async fn execute(
        &self,
        launcher: &BrowserLauncher,
        overrides: LaunchOverrides,
        selection: BookSelection,
    ) -> HarvestResult<RunReport> {
        let (automation, mut context) = open(launcher, overrides).await?;
        let result = self.execute_on(&mut context, selection).await;
        close(automation).await;
        result
    }

    /// Login and catalog only, inside its own browser session.
    pub async fn list_books(
        &self,
        launcher: &BrowserLauncher,
        overrides: LaunchOverrides,
    ) -> HarvestResult<CatalogListing> {
        let (automation, mut context) = open(launcher, overrides).await?;
        let result = self.list_catalog(&mut context).await;
        close(automation).await;
        result.map(|(_, listing)| listing)
    }

    pub async fn list_catalog(
        &self,
        page: &mut dyn PageAutomation,
    ) -> HarvestResult<(HarvestSession, CatalogListing)> {
        let mut gate = self.gate();
        gate.await_login_default(page).await?;
        let listing = CatalogDiscoverer::new(Arc::clone(&self.config))
            .list_books(page)
            .await?;
        Ok((gate.session().clone(), listing))
    }

    pub async fn execute_on(
        &self,
        page: &mut dyn PageAutomation,
        selection: BookSelection,
    ) -> HarvestResult<RunReport> {
        let mut report = RunReport::new();
        info!(run_id = %report.run_id, "harvest run started");

        let mut gate = self.gate();
        let login = gate.await_login_default(page).await.map(|_| ());
        report.session = gate.session().clone();
        match login {
            Ok(()) => {}
            Err(HarvestError::Cancelled) => {
                report.cancelled = true;
                return Ok(report.finish());
            }
            Err(err) => return Err(err),
        }

        match CatalogDiscoverer::new(Arc::clone(&self.config))
            .list_books(page)
            .await
        {
            Ok(listing) => {
                report.diagnostics.extend(listing.diagnostics());
                report.catalog = listing;
            }
            Err(err) if err.is_run_fatal() => return Err(err),
            Err(err) => {
                warn!(error = %err, "catalog discovery failed");
                report.diagnostics.push(err);
                report.diagnostics.push(HarvestError::CatalogEmpty);
            }
        }
        emit(
            self.events.as_ref(),
            HarvestEvent::CatalogListed {
                books: report.catalog.books.len(),
                dropped: report.catalog.dropped_missing_asin,
            },
        );

        let selected: Vec<Book> = report
            .catalog
            .books
            .iter()
            .filter(|book| selection.includes(book))
            .cloned()
            .collect();
        if let BookSelection::Asins(asins) = &selection {
            for asin in asins {
                if !selected.iter().any(|book| &book.asin == asin) {
                    warn!(asin = %asin, "requested asin not in catalog");
                }
            }
        }

        let mut harvester = self.harvester();
        let aggregator = RecordAggregator::new();
        for book in selected {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            emit(
                self.events.as_ref(),
                HarvestEvent::BookStarted {
                    asin: book.asin.clone(),
                    title: book.title.clone(),
                },
            );
            let result = harvester
                .extract_highlights(page, &book, &self.cancel)
                .await
                .and_then(|outcome| {
                    let diagnostic = stop_diagnostic(&outcome);
                    aggregator
                        .aggregate_outcome(outcome)
                        .map(|set| (set, diagnostic))
                });
            match result {
                Ok((set, diagnostic)) => {
                    report.diagnostics.extend(diagnostic);
                    harvester.metrics_mut().record_book(set.incomplete());
                    emit(
                        self.events.as_ref(),
                        HarvestEvent::BookFinished {
                            asin: book.asin.clone(),
                            highlights: set.len(),
                            incomplete: set.incomplete(),
                        },
                    );
                    report.sets.push(set);
                }
                Err(HarvestError::Cancelled) => {
                    info!(asin = %book.asin, "run cancelled; discarding partial book");
                    report.cancelled = true;
                    break;
                }
                Err(err) if err.is_run_fatal() => return Err(err),
                Err(err) => {
                    warn!(asin = %book.asin, error = %err, "book failed");
                    harvester.metrics_mut().record_book_failure();
                    emit(
                        self.events.as_ref(),
                        HarvestEvent::BookFailed {
                            asin: book.asin.clone(),
                            reason: err.to_string(),
                        },
                    );
                    report.failures.push(BookFailure { book, error: err });
                }
            }
        }

        report.metrics = harvester.metrics().clone();
        info!(
            run_id = %report.run_id,
            sets = report.sets.len(),
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "harvest run finished"
        );
        Ok(report.finish())
    }

    fn gate(&self) -> SessionGate {
        let mut gate = SessionGate::new(Arc::clone(&self.config), Arc::clone(&self.clock))
            .with_cancel(self.cancel.clone());
        if let Some(events) = &self.events {
            gate = gate.with_events(events.clone());
        }
        gate
    }

    fn harvester(&self) -> HighlightHarvester {
        let mut harvester =
            HighlightHarvester::new(Arc::clone(&self.config), Arc::clone(&self.clock));
        if let Some(capture) = &self.capture {
            harvester = harvester.with_capture(Arc::clone(capture));
        }
        if let Some(events) = &self.events {
            harvester = harvester.with_events(events.clone());
        }
        harvester
    }
}

/// Reportable reason a book stopped short of its last page.
fn stop_diagnostic(outcome: &HarvestOutcome) -> Option<HarvestError> {
    let asin = outcome.book.asin.clone();
    let page = outcome.pages + 1;
    match outcome.stop {
        PageStop::Stale => Some(HarvestError::StalePage { asin, page }),
        PageStop::NotReady => Some(HarvestError::PageNotReady { asin, page }),
        PageStop::LastPage | PageStop::PageLimit => None,
    }
}

async fn open(
    launcher: &BrowserLauncher,
    overrides: LaunchOverrides,
) -> HarvestResult<(BrowserAutomation, BrowserContext)> {
    let automation = launcher
        .launch_with_overrides(overrides)
        .await
        .map_err(|err| HarvestError::AutomationUnavailable(err.to_string()))?;
    match automation.new_context().await {
        Ok(context) => Ok((automation, context)),
        Err(err) => {
            close(automation).await;
            Err(HarvestError::AutomationUnavailable(err.to_string()))
        }
    }
}

async fn close(automation: BrowserAutomation) {
    if let Err(err) = automation.shutdown().await {
        warn!(error = %err, "browser shutdown failed");
    }
}
