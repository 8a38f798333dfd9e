#![allow(dead_code)]

use std::sync::Arc;

use highlights_core::config::PacingSection;
use highlights_core::harvest::highlights_url;
use highlights_core::test_framework::{FixtureDocument, FixtureNode, FixturePage};
use highlights_core::{HarvestConfig, ManualClock};

pub const NOTEBOOK: &str = "https://read.amazon.com/notebook";

pub fn test_config() -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.pacing = PacingSection::disabled();
    config.pagination.stall_jitter_ms = 0;
    config.pagination.stall_backoff_ms = vec![1_000, 2_000, 4_000];
    config.pagination.stall_retries = 2;
    config
}

pub fn shared(config: HarvestConfig) -> Arc<HarvestConfig> {
    Arc::new(config)
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

pub fn book_entry(asin: Option<&str>, title: &str, author: &str) -> FixtureNode {
    let mut node = FixtureNode::new(".kp-notebook-library-each-book");
    if let Some(asin) = asin {
        node = node.attr("id", asin);
    }
    node.child(FixtureNode::new("h2.kp-notebook-searchable").text(title))
        .child(FixtureNode::new("p.kp-notebook-searchable").text(author))
        .child(
            FixtureNode::new("[id^='kp-notebook-annotated-date']")
                .attr("value", "Sunday October 24, 2021"),
        )
}

pub fn library(entries: Vec<FixtureNode>) -> FixtureDocument {
    let mut container = FixtureNode::new("#kp-notebook-library");
    for entry in entries {
        container = container.child(entry);
    }
    FixtureDocument::new(vec![container])
}

pub struct Entry<'a> {
    pub text: &'a str,
    pub location: Option<&'a str>,
    pub color: &'a str,
    pub header: Option<&'a str>,
    pub note: Option<&'a str>,
}

impl<'a> Entry<'a> {
    pub fn new(text: &'a str, location: &'a str) -> Self {
        Self {
            text,
            location: Some(location),
            color: "yellow",
            header: None,
            note: None,
        }
    }

    pub fn color(mut self, color: &'a str) -> Self {
        self.color = color;
        self
    }

    pub fn header(mut self, header: &'a str) -> Self {
        self.header = Some(header);
        self
    }

    pub fn note(mut self, note: &'a str) -> Self {
        self.note = Some(note);
        self
    }

    pub fn node(&self) -> FixtureNode {
        let mut row = FixtureNode::new("#kp-notebook-annotations .a-row.a-spacing-base").child(
            FixtureNode::new(".kp-notebook-highlight")
                .attr(
                    "class",
                    format!("kp-notebook-highlight kp-notebook-highlight-{}", self.color),
                )
                .child(FixtureNode::new("#highlight").text(self.text)),
        );
        if let Some(location) = self.location {
            row = row.child(FixtureNode::new("#kp-annotation-location").attr("value", location));
        }
        if let Some(header) = self.header {
            row = row.child(FixtureNode::new("#annotationHighlightHeader").text(header));
        }
        if let Some(note) = self.note {
            row = row.child(FixtureNode::new("#note").html(note));
        }
        row
    }
}

/// One page of a book's annotations. `next` is the pagination token.
pub fn highlights_page(entries: &[Entry<'_>], next: Option<&str>, count: Option<u32>) -> FixtureDocument {
    let mut container = FixtureNode::new("#kp-notebook-annotations");
    for entry in entries {
        container = container.child(entry.node());
    }
    let mut roots = vec![container];
    if let Some(count) = count {
        roots.push(FixtureNode::new("#kp-notebook-highlights-count").text(count.to_string()));
    }
    roots.push(
        FixtureNode::new(".kp-notebook-annotations-next-page-start")
            .attr("value", next.unwrap_or("")),
    );
    roots.push(FixtureNode::new(".kp-notebook-content-limit-state").attr("value", ""));
    FixtureDocument::new(roots)
}

pub fn page_url(asin: &str, token: Option<&str>) -> String {
    highlights_url(NOTEBOOK, asin, token, token.map(|_| ""))
}

/// Page that serves the library on the notebook URL plus the given
/// highlight routes.
pub fn notebook_page(
    catalog: FixtureDocument,
    routes: Vec<(String, Vec<FixtureDocument>)>,
) -> FixturePage {
    let mut page = FixturePage::new().route(NOTEBOOK, vec![catalog]);
    for (pattern, documents) in routes {
        page = page.route(pattern, documents);
    }
    page
}
