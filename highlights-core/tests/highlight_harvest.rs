mod common;

use std::sync::Arc;
use std::time::Duration;

use highlights_core::harvest::PageStop;
use highlights_core::test_framework::{FixtureDocument, FixtureNode, FixturePage, MemoryCapture};
use highlights_core::{
    Book, CancelFlag, HarvestConfig, HarvestError, HighlightColor, HighlightHarvester,
    ManualClock, RecordAggregator,
};

use common::{clock, highlights_page, page_url, shared, test_config, Entry, NOTEBOOK};

fn harvester(config: HarvestConfig, clock: Arc<ManualClock>) -> HighlightHarvester {
    HighlightHarvester::new(shared(config), clock)
}

fn book(asin: &str) -> Book {
    Book::new(asin, "Fixture Book")
}

#[tokio::test]
async fn blank_entry_is_skipped_without_consuming_an_order_index() {
    let mut page = FixturePage::single(
        page_url("A1", None),
        highlights_page(
            &[
                Entry::new("first", "10"),
                Entry::new("   ", "20"),
                Entry::new("third", "30"),
            ],
            None,
            None,
        ),
    );
    let mut harvester = harvester(test_config(), clock());
    let outcome = harvester
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(outcome.skipped_entries, 1);
    assert_eq!(outcome.stop, PageStop::LastPage);
    assert!(!outcome.incomplete);
    let set = RecordAggregator::new().aggregate_outcome(outcome).unwrap();
    let got: Vec<_> = set
        .highlights()
        .iter()
        .map(|h| (h.text.as_str(), h.order))
        .collect();
    assert_eq!(got, vec![("first", 0), ("third", 1)]);
    assert_eq!(harvester.metrics().entries_skipped, 1);
}

#[tokio::test]
async fn token_pagination_walks_every_page_in_order() {
    let mut page = FixturePage::new()
        .route(
            page_url("A1", None),
            vec![highlights_page(
                &[Entry::new("one", "1"), Entry::new("two", "2")],
                Some("p2"),
                Some(5),
            )],
        )
        .route(
            page_url("A1", Some("p2")),
            vec![highlights_page(
                &[Entry::new("three", "3"), Entry::new("four", "4")],
                Some("p3"),
                None,
            )],
        )
        .route(
            page_url("A1", Some("p3")),
            vec![highlights_page(&[Entry::new("five", "5")], None, None)],
        );
    let mut harvester = harvester(test_config(), clock());
    let outcome = harvester
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.expected_count, Some(5));
    assert_eq!(page.navigations().len(), 3);
    assert!(page.navigations()[2].ends_with("token=p3"));
    let orders: Vec<_> = outcome.highlights.iter().map(|h| h.order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3, 4]);
    assert!(outcome.highlights.iter().all(|h| h.book_asin == "A1"));
}

#[tokio::test]
async fn stalled_pagination_returns_first_page_marked_incomplete() {
    let same = || {
        highlights_page(
            &[Entry::new("alpha", "1"), Entry::new("beta", "2")],
            Some("p2"),
            None,
        )
    };
    let mut page = FixturePage::new()
        .route(page_url("A1", None), vec![same()])
        .route(page_url("A1", Some("p2")), vec![same()]);
    let clock = clock();
    let mut harvester = harvester(test_config(), clock.clone());
    let outcome = harvester
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.incomplete);
    assert_eq!(outcome.stop, PageStop::Stale);
    assert_eq!(outcome.stale_reloads, 2);
    let texts: Vec<_> = outcome.highlights.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha", "beta"]);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
    );
    // first page, the stale second page and two reloads
    assert_eq!(page.navigations().len(), 4);
}

#[tokio::test]
async fn reload_that_recovers_continues_pagination() {
    let first = highlights_page(&[Entry::new("alpha", "1")], Some("p2"), None);
    let stale = highlights_page(&[Entry::new("alpha", "1")], Some("p2"), None);
    let fresh = highlights_page(&[Entry::new("gamma", "3")], None, None);
    let mut page = FixturePage::new()
        .route(page_url("A1", None), vec![first])
        .route(page_url("A1", Some("p2")), vec![stale, fresh]);
    let mut harvester = harvester(test_config(), clock());
    let outcome = harvester
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert!(!outcome.incomplete);
    assert_eq!(outcome.stale_reloads, 1);
    let texts: Vec<_> = outcome.highlights.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha", "gamma"]);
}

#[tokio::test]
async fn color_markers_map_to_enum_with_unknown_fallback() {
    let mut page = FixturePage::single(
        page_url("A1", None),
        highlights_page(
            &[
                Entry::new("rosy", "1").color("pink"),
                Entry::new("odd", "2").color("chartreuse"),
            ],
            None,
            None,
        ),
    );
    let outcome = harvester(test_config(), clock())
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();
    let colors: Vec<_> = outcome.highlights.iter().map(|h| h.color).collect();
    assert_eq!(colors, vec![HighlightColor::Pink, HighlightColor::Unknown]);
}

#[tokio::test]
async fn optional_fields_are_parsed_or_left_empty() {
    let mut page = FixturePage::single(
        page_url("A1", None),
        highlights_page(
            &[
                Entry::new("annotated", "120")
                    .header("Yellow highlight | Page: 42")
                    .note("look this up<br/>later &amp; cite"),
                Entry {
                    location: None,
                    ..Entry::new("plain", "0")
                },
            ],
            None,
            None,
        ),
    );
    let outcome = harvester(test_config(), clock())
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    let annotated = &outcome.highlights[0];
    assert_eq!(annotated.location.as_deref(), Some("120"));
    assert_eq!(annotated.page.as_deref(), Some("42"));
    assert_eq!(annotated.note.as_deref(), Some("look this up\nlater & cite"));
    let plain = &outcome.highlights[1];
    assert_eq!(plain.location, None);
    assert_eq!(plain.page, None);
    assert_eq!(plain.note, None);
}

#[tokio::test]
async fn page_guard_marks_result_incomplete() {
    let mut config = test_config();
    config.pagination.max_pages = 2;
    let mut page = FixturePage::new()
        .route(
            page_url("A1", None),
            vec![highlights_page(&[Entry::new("one", "1")], Some("p2"), None)],
        )
        .route(
            page_url("A1", Some("p2")),
            vec![highlights_page(&[Entry::new("two", "2")], Some("p3"), None)],
        );
    let outcome = harvester(config, clock())
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, PageStop::PageLimit);
    assert!(outcome.incomplete);
    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.highlights.len(), 2);
}

#[tokio::test]
async fn unready_first_page_is_snapshotted_and_incomplete() {
    let capture = Arc::new(MemoryCapture::new());
    let mut page = FixturePage::single(
        page_url("A1", None),
        FixtureDocument::new(vec![FixtureNode::new("#something-else").text("captcha")]),
    );
    let mut harvester = harvester(test_config(), clock()).with_capture(capture.clone());
    let outcome = harvester
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, PageStop::NotReady);
    assert!(outcome.incomplete);
    assert!(outcome.highlights.is_empty());
    let snapshots = capture.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].asin, "A1");
    assert!(snapshots[0].html.contains("captcha"));
    assert_eq!(harvester.metrics().snapshots_captured, 1);
}

#[tokio::test]
async fn failing_capture_does_not_affect_harvest() {
    let mut page = FixturePage::single(
        page_url("A1", None),
        highlights_page(&[], None, Some(3)),
    );
    let mut harvester =
        harvester(test_config(), clock()).with_capture(Arc::new(MemoryCapture::failing()));
    let outcome = harvester
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.highlights.is_empty());
    assert_eq!(harvester.metrics().snapshots_captured, 0);
    assert!(matches!(
        RecordAggregator::new().aggregate_outcome(outcome),
        Err(HarvestError::EmptyResult { expected: 3, .. })
    ));
}

#[tokio::test]
async fn cancelled_flag_stops_before_loading() {
    let mut page = FixturePage::single(
        page_url("A1", None),
        highlights_page(&[Entry::new("one", "1")], None, None),
    );
    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = harvester(test_config(), clock())
        .extract_highlights(&mut page, &book("A1"), &cancel)
        .await;
    assert!(matches!(result, Err(HarvestError::Cancelled)));
    assert!(page.navigations().is_empty());
}

#[tokio::test]
async fn click_control_is_used_when_no_token_resolves() {
    let mut config = test_config();
    config.selectors.pagination.next_control = Some("#next".into());
    let second_url = format!("{NOTEBOOK}/fixture-second-page");
    let first = FixtureDocument::new(vec![
        FixtureNode::new("#kp-notebook-annotations")
            .child(Entry::new("one", "1").node()),
        FixtureNode::new("#next").on_click(second_url.clone()),
    ]);
    let second = highlights_page(&[Entry::new("two", "2")], None, None);
    let mut page = FixturePage::new()
        .route(page_url("A1", None), vec![first])
        .route(second_url, vec![second]);
    let outcome = harvester(config, clock())
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(page.clicks().to_vec(), vec!["#next".to_string()]);
    let texts: Vec<_> = outcome.highlights.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two"]);
}

#[tokio::test]
async fn enabled_pacer_sleeps_on_the_injected_clock() {
    let mut config = test_config();
    config.pacing.enabled = true;
    config.pacing.action_delay_ms = [100, 200];
    config.pacing.idle_probability = 1.0;
    config.pacing.idle_pause_ms = [5, 5];
    config.pacing.seed = Some(11);
    let mut page = FixturePage::single(
        page_url("A1", None),
        highlights_page(&[Entry::new("one", "1")], None, None),
    );
    let clock = clock();
    let mut harvester = harvester(config, clock.clone());
    harvester
        .extract_highlights(&mut page, &book("A1"), &CancelFlag::new())
        .await
        .unwrap();

    let sleeps = clock.sleeps();
    assert_eq!(sleeps.len(), 2);
    assert!(sleeps[0] >= Duration::from_millis(100) && sleeps[0] <= Duration::from_millis(200));
    assert_eq!(sleeps[1], Duration::from_millis(5));
    assert_eq!(page.scrolls().len(), 1);
    assert_eq!(harvester.metrics().idle_interactions, 1);
}
