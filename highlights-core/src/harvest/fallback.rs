//! Ordered field extraction with graceful degradation.
//!
//! A [`FallbackChain`] is a list of `(selector, accessor)` rules evaluated in
//! order against a scope element until one yields a non-empty value. Automation
//! errors are logged and treated as a miss, so a field never fails louder than
//! `None`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::browser::{BrowserResult, ElementHandle, PageAutomation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessor {
    #[default]
    Text,
    /// Inner markup flattened to text, `<br>` kept as line breaks.
    Html,
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldRule {
    /// `None` reads the scope element itself.
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub accessor: Accessor,
}

impl FieldRule {
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            accessor: Accessor::Text,
        }
    }

    pub fn html(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            accessor: Accessor::Html,
        }
    }

    pub fn attribute(selector: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            accessor: Accessor::Attribute(name.into()),
        }
    }

    pub fn own(accessor: Accessor) -> Self {
        Self {
            selector: None,
            accessor,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FallbackChain {
    rules: Vec<FieldRule>,
}

impl FallbackChain {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolves the field against `scope`, or the whole document when `scope`
    /// is `None`. Returns the first trimmed, non-empty value.
    pub async fn resolve(
        &self,
        page: &mut dyn PageAutomation,
        scope: Option<ElementHandle>,
    ) -> Option<String> {
        for (index, rule) in self.rules.iter().enumerate() {
            match apply_rule(page, scope, rule).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        rule = index,
                        selector = rule.selector.as_deref().unwrap_or("<self>"),
                        error = %err,
                        "fallback rule failed"
                    );
                }
            }
        }
        None
    }
}

async fn apply_rule(
    page: &mut dyn PageAutomation,
    scope: Option<ElementHandle>,
    rule: &FieldRule,
) -> BrowserResult<Option<String>> {
    let target = match (&rule.selector, scope) {
        (None, Some(scope)) => Some(scope),
        (None, None) => None,
        (Some(selector), Some(scope)) => page
            .query_within(scope, selector)
            .await?
            .into_iter()
            .next(),
        (Some(selector), None) => page.query_all(selector).await?.into_iter().next(),
    };
    let Some(target) = target else {
        return Ok(None);
    };
    let raw = match &rule.accessor {
        Accessor::Text => Some(page.text(target).await?),
        Accessor::Html => page.inner_html(target).await?.map(|html| markup_to_text(&html)),
        Accessor::Attribute(name) => page.attribute(target, name).await?,
    };
    Ok(raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

/// Flattens an HTML fragment: `<br>` becomes a newline, other tags are dropped
/// and the common entities are decoded.
pub fn markup_to_text(html: &str) -> String {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    let breaks = BREAK.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
    let tags = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    let with_breaks = breaks.replace_all(html, "\n");
    let stripped = tags.replace_all(&with_breaks, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// First integer in `raw`, thousands separators allowed (`"1,204 Highlights"`).
pub fn parse_count(raw: &str) -> Option<u32> {
    static COUNT: OnceLock<Regex> = OnceLock::new();
    let count = COUNT.get_or_init(|| Regex::new(r"\d[\d,.]*").expect("valid regex"));
    let digits: String = count
        .find(raw)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Trailing number of a header such as `"Yellow highlight | Page: 42"`.
pub fn trailing_number(raw: &str) -> Option<String> {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    let trailing = TRAILING.get_or_init(|| Regex::new(r"(\d+)\s*$").expect("valid regex"));
    trailing
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
