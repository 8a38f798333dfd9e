mod common;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use highlights_core::browser::{BrowserResult, ElementHandle};
use highlights_core::export::{from_json, to_json};
use highlights_core::test_framework::{FixtureDocument, FixtureNode, FixturePage};
use highlights_core::{
    BookSelection, CancelFlag, HarvestError, HarvestEvent, HarvestRun, PageAutomation,
    SessionState,
};

use common::{
    book_entry, clock, highlights_page, library, notebook_page, page_url, shared, test_config,
    Entry,
};

fn two_book_page() -> FixturePage {
    notebook_page(
        library(vec![
            book_entry(Some("A1"), "First Book", "Author: Ada"),
            book_entry(None, "Broken", "Nobody"),
            book_entry(Some("B2"), "Second Book", "By: Grace"),
        ]),
        vec![
            (
                page_url("A1", None),
                vec![highlights_page(
                    &[Entry::new("a-one", "1"), Entry::new("a-two", "2")],
                    Some("next"),
                    Some(3),
                )],
            ),
            (
                page_url("A1", Some("next")),
                vec![highlights_page(
                    &[Entry::new("a-three", "3"), Entry::new("a-one", "1")],
                    None,
                    None,
                )],
            ),
            (
                page_url("B2", None),
                vec![highlights_page(&[Entry::new("b-one", "9").color("blue")], None, Some(1))],
            ),
        ],
    )
}

fn run() -> HarvestRun {
    HarvestRun::new(shared(test_config())).with_clock(clock())
}

#[tokio::test]
async fn full_run_aggregates_every_selected_book() {
    let mut page = two_book_page();
    let report = run()
        .execute_on(&mut page, BookSelection::All)
        .await
        .unwrap();

    assert_eq!(report.session.state, SessionState::LoggedIn);
    assert_eq!(report.catalog.books.len(), 2);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| matches!(d, HarvestError::BookMissingAsin { count: 1 })));
    assert!(report.failures.is_empty());
    assert!(!report.cancelled);
    assert!(report.finished_at.is_some());

    let first = &report.sets[0];
    assert_eq!(first.book().asin, "A1");
    assert_eq!(first.book().author.as_deref(), Some("Ada"));
    let texts: Vec<_> = first.highlights().iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["a-one", "a-two", "a-three"]);
    assert_eq!(first.duplicates_removed(), 1);
    for set in &report.sets {
        let orders: Vec<_> = set.highlights().iter().map(|h| h.order).collect();
        assert_eq!(orders, (0..set.len()).collect::<Vec<_>>());
    }
    assert_eq!(report.sets[1].book().asin, "B2");
    assert_eq!(report.metrics.books_harvested, 2);
    assert_eq!(report.metrics.pages_loaded, 3);
}

#[tokio::test]
async fn identical_fixtures_produce_identical_output() {
    let first = run()
        .execute_on(&mut two_book_page(), BookSelection::All)
        .await
        .unwrap();
    let second = run()
        .execute_on(&mut two_book_page(), BookSelection::All)
        .await
        .unwrap();
    assert_eq!(first.sets, second.sets);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn selection_limits_harvest_to_requested_asins() {
    let mut page = two_book_page();
    let report = run()
        .execute_on(
            &mut page,
            BookSelection::Asins(vec!["B2".into(), "ZZZ".into()]),
        )
        .await
        .unwrap();
    assert_eq!(report.sets.len(), 1);
    assert_eq!(report.sets[0].book().asin, "B2");
    assert!(!page.navigations().iter().any(|url| url.contains("asin=A1")));
}

#[tokio::test]
async fn exported_sets_parse_back_to_the_same_records() {
    let report = run()
        .execute_on(&mut two_book_page(), BookSelection::All)
        .await
        .unwrap();
    for set in &report.sets {
        let parsed = from_json(&to_json(set).unwrap()).unwrap();
        assert_eq!(parsed.book(), set.book());
        assert_eq!(parsed.highlights(), set.highlights());
        assert_eq!(parsed.incomplete(), set.incomplete());
    }
}

#[tokio::test]
async fn login_wait_times_out_on_the_injected_clock() {
    let mut config = test_config();
    config.session.poll_interval_ms = 2_000;
    config.session.max_wait_ms = 10_000;
    let clock = clock();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let signin = "https://www.amazon.com/ap/signin";
    let mut page = FixturePage::new().with_url_script(vec![signin; 32]);

    let err = HarvestRun::new(shared(config))
        .with_clock(clock.clone())
        .with_events(tx)
        .execute_on(&mut page, BookSelection::All)
        .await
        .unwrap_err();

    assert!(err.is_run_fatal());
    match err {
        HarvestError::LoginTimeout { waited, attempts } => {
            assert_eq!(waited, Duration::from_secs(10));
            assert_eq!(attempts, 6);
        }
        other => panic!("expected login timeout, got {other:?}"),
    }
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 5]);
    assert_eq!(page.url_checks(), 6);

    let mut instructions = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, HarvestEvent::LoginRequired { .. }) {
            instructions += 1;
        }
    }
    assert_eq!(instructions, 1);
}

#[tokio::test]
async fn offline_browser_is_automation_unavailable() {
    let mut page = FixturePage::new().offline();
    let err = run()
        .execute_on(&mut page, BookSelection::All)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::AutomationUnavailable(_)));
    assert!(err.is_run_fatal());
}

#[tokio::test]
async fn empty_result_is_recorded_and_the_run_continues() {
    let mut page = notebook_page(
        library(vec![
            book_entry(Some("E1"), "Lost", "X"),
            book_entry(Some("Q2"), "Quiet", "Y"),
            book_entry(Some("F3"), "Fine", "Z"),
        ]),
        vec![
            (page_url("E1", None), vec![highlights_page(&[], None, Some(4))]),
            (page_url("Q2", None), vec![highlights_page(&[], None, Some(0))]),
            (
                page_url("F3", None),
                vec![highlights_page(&[Entry::new("kept", "1")], None, None)],
            ),
        ],
    );
    let report = run()
        .execute_on(&mut page, BookSelection::All)
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].book.asin, "E1");
    assert!(matches!(
        report.failures[0].error,
        HarvestError::EmptyResult { expected: 4, .. }
    ));
    let asins: Vec<_> = report.sets.iter().map(|s| s.book().asin.as_str()).collect();
    assert_eq!(asins, vec!["Q2", "F3"]);
    assert!(report.sets[0].is_empty());
    assert_eq!(report.metrics.books_failed, 1);
}

#[tokio::test]
async fn stale_book_is_kept_incomplete_with_a_diagnostic() {
    let same = || highlights_page(&[Entry::new("loop", "1")], Some("again"), None);
    let mut page = notebook_page(
        library(vec![book_entry(Some("S1"), "Stuck", "X")]),
        vec![
            (page_url("S1", None), vec![same()]),
            (page_url("S1", Some("again")), vec![same()]),
        ],
    );
    let report = run()
        .execute_on(&mut page, BookSelection::All)
        .await
        .unwrap();

    assert!(report.sets[0].incomplete());
    assert_eq!(report.sets[0].len(), 1);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| matches!(d, HarvestError::StalePage { page: 2, .. })));
    assert_eq!(report.metrics.books_incomplete, 1);
}

#[tokio::test]
async fn unready_book_is_incomplete_with_a_diagnostic() {
    let mut page = notebook_page(
        library(vec![
            book_entry(Some("D1"), "Blocked", "X"),
            book_entry(Some("F2"), "Fine", "Y"),
        ]),
        vec![
            (
                page_url("D1", None),
                vec![FixtureDocument::new(vec![
                    FixtureNode::new("#captcha").text("type the characters")
                ])],
            ),
            (
                page_url("F2", None),
                vec![highlights_page(&[Entry::new("kept", "1")], None, None)],
            ),
        ],
    );
    let report = run()
        .execute_on(&mut page, BookSelection::All)
        .await
        .unwrap();

    assert!(report.failures.is_empty());
    let blocked = &report.sets[0];
    assert_eq!(blocked.book().asin, "D1");
    assert!(blocked.is_empty());
    assert!(blocked.incomplete());
    assert!(!report.sets[1].incomplete());
    assert!(report.diagnostics.iter().any(|d| matches!(
        d,
        HarvestError::PageNotReady { asin, page: 1 } if asin == "D1"
    )));
    assert_eq!(report.metrics.books_incomplete, 1);
}

/// Trips the cancel flag as soon as a URL containing `trigger` is loaded.
struct CancellingPage {
    inner: FixturePage,
    trigger: String,
    cancel: CancelFlag,
}

#[async_trait(?Send)]
impl PageAutomation for CancellingPage {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        if url.contains(&self.trigger) {
            self.cancel.cancel();
        }
        self.inner.navigate(url).await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<bool> {
        self.inner.wait_for(selector, timeout).await
    }

    async fn query_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>> {
        self.inner.query_all(selector).await
    }

    async fn query_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> BrowserResult<Vec<ElementHandle>> {
        self.inner.query_within(scope, selector).await
    }

    async fn text(&mut self, handle: ElementHandle) -> BrowserResult<String> {
        self.inner.text(handle).await
    }

    async fn attribute(
        &mut self,
        handle: ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        self.inner.attribute(handle, name).await
    }

    async fn inner_html(&mut self, handle: ElementHandle) -> BrowserResult<Option<String>> {
        self.inner.inner_html(handle).await
    }

    async fn click(&mut self, handle: ElementHandle) -> BrowserResult<()> {
        self.inner.click(handle).await
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        self.inner.current_url().await
    }

    async fn page_source(&mut self) -> BrowserResult<String> {
        self.inner.page_source().await
    }

    async fn scroll_by(&mut self, delta_y: f64) -> BrowserResult<()> {
        self.inner.scroll_by(delta_y).await
    }
}

#[tokio::test]
async fn cancellation_keeps_finished_books_and_drops_the_current_one() {
    let cancel = CancelFlag::new();
    let mut page = CancellingPage {
        inner: two_book_page(),
        trigger: "asin=B2".into(),
        cancel: cancel.clone(),
    };
    let report = run()
        .with_cancel(cancel)
        .execute_on(&mut page, BookSelection::All)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.sets.len(), 1);
    assert_eq!(report.sets[0].book().asin, "A1");
    assert!(report.failures.is_empty());
}
