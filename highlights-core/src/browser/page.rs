use std::time::Duration;

use async_trait::async_trait;

use super::error::{BrowserError, BrowserResult};

/// Opaque reference to an element of the current document. Handles are
/// invalidated by the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(usize);

impl ElementHandle {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Backing store for [`ElementHandle`]s. Cleared whenever the document may
/// have been replaced, after which old handles resolve to `StaleHandle`.
#[derive(Debug)]
pub(crate) struct HandleArena<T> {
    items: Vec<T>,
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> HandleArena<T> {
    pub(crate) fn register(&mut self, found: Vec<T>) -> Vec<ElementHandle> {
        let start = self.items.len();
        self.items.extend(found);
        (start..self.items.len())
            .map(ElementHandle::from_index)
            .collect()
    }

    pub(crate) fn get(&self, handle: ElementHandle) -> BrowserResult<&T> {
        self.items
            .get(handle.index())
            .ok_or(BrowserError::StaleHandle(handle))
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

/// The page capability every harvesting component is written against.
///
/// Implemented by the Chromium binding ([`super::BrowserContext`]) and by the
/// in-memory fixture used in tests. Calls are sequential; no method may block
/// past its own timeout.
#[async_trait(?Send)]
pub trait PageAutomation {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Returns `false` once `timeout` elapses without a match.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<bool>;

    async fn query_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>>;

    async fn query_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> BrowserResult<Vec<ElementHandle>>;

    async fn text(&mut self, handle: ElementHandle) -> BrowserResult<String>;

    async fn attribute(&mut self, handle: ElementHandle, name: &str)
        -> BrowserResult<Option<String>>;

    async fn inner_html(&mut self, handle: ElementHandle) -> BrowserResult<Option<String>>;

    async fn click(&mut self, handle: ElementHandle) -> BrowserResult<()>;

    async fn current_url(&mut self) -> BrowserResult<String>;

    async fn page_source(&mut self) -> BrowserResult<String>;

    async fn scroll_by(&mut self, delta_y: f64) -> BrowserResult<()>;
}
