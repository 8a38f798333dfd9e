use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{BrowserError, BrowserResult, ElementHandle, HandleArena, PageAutomation};

/// A node in a fixture document. Nodes answer only to the exact selector
/// strings they were declared with; there is no CSS engine behind them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureNode {
    selectors: Vec<String>,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    html: Option<String>,
    on_click: Option<String>,
    children: Vec<FixtureNode>,
}

impl FixtureNode {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selectors: vec![selector.into()],
            ..Self::default()
        }
    }

    pub fn alias(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Clicking the node navigates to `url`.
    pub fn on_click(mut self, url: impl Into<String>) -> Self {
        self.on_click = Some(url.into());
        self
    }

    pub fn child(mut self, node: FixtureNode) -> Self {
        self.children.push(node);
        self
    }

    fn matches(&self, selector: &str) -> bool {
        self.selectors.iter().any(|own| own == selector)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("<div data-fixture=\"{}\">", self.selectors.join(" | ")));
        if let Some(html) = &self.html {
            out.push_str(html);
        } else if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.render(out);
        }
        out.push_str("</div>");
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureDocument {
    roots: Vec<FixtureNode>,
}

impl FixtureDocument {
    pub fn new(roots: Vec<FixtureNode>) -> Self {
        Self { roots }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn node(&self, path: &[usize]) -> Option<&FixtureNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    /// Depth-first, document-order paths of nodes matching `selector`.
    fn find(&self, selector: &str, within: Option<&[usize]>) -> Vec<Vec<usize>> {
        let mut found = Vec::new();
        match within {
            Some(scope) => {
                if let Some(node) = self.node(scope) {
                    collect(&node.children, selector, scope.to_vec(), &mut found);
                }
            }
            None => collect(&self.roots, selector, Vec::new(), &mut found),
        }
        found
    }

    fn render(&self) -> String {
        let mut out = String::from("<html><body>");
        for node in &self.roots {
            node.render(&mut out);
        }
        out.push_str("</body></html>");
        out
    }
}

fn collect(nodes: &[FixtureNode], selector: &str, prefix: Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (index, node) in nodes.iter().enumerate() {
        let mut path = prefix.clone();
        path.push(index);
        if node.matches(selector) {
            out.push(path.clone());
        }
        collect(&node.children, selector, path, out);
    }
}

#[derive(Debug, Clone)]
struct FixtureRoute {
    pattern: String,
    documents: Vec<FixtureDocument>,
    served: usize,
}

impl FixtureRoute {
    fn next_document(&mut self) -> FixtureDocument {
        let index = self.served.min(self.documents.len().saturating_sub(1));
        self.served += 1;
        self.documents.get(index).cloned().unwrap_or_default()
    }
}

/// In-memory [`PageAutomation`] driven by URL routes.
///
/// A navigation serves the next document of the route whose pattern is the
/// longest substring of the URL; once a route's documents run out its last
/// document repeats. Unrouted URLs load an empty document.
#[derive(Debug, Default)]
pub struct FixturePage {
    routes: Vec<FixtureRoute>,
    document: FixtureDocument,
    url: String,
    url_script: VecDeque<String>,
    arena: HandleArena<Vec<usize>>,
    offline: bool,
    navigations: Vec<String>,
    clicks: Vec<String>,
    scrolls: Vec<f64>,
    url_checks: usize,
}

impl FixturePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(pattern: impl Into<String>, document: FixtureDocument) -> Self {
        Self::new().route(pattern, vec![document])
    }

    pub fn route(mut self, pattern: impl Into<String>, documents: Vec<FixtureDocument>) -> Self {
        self.routes.push(FixtureRoute {
            pattern: pattern.into(),
            documents,
            served: 0,
        });
        self
    }

    /// Values returned by successive `current_url` calls, ahead of the real one.
    pub fn with_url_script<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_script = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Every navigation fails, as if the browser were gone.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }

    pub fn scrolls(&self) -> &[f64] {
        &self.scrolls
    }

    pub fn url_checks(&self) -> usize {
        self.url_checks
    }

    fn path(&self, handle: ElementHandle) -> BrowserResult<&[usize]> {
        self.arena.get(handle).map(Vec::as_slice)
    }

    fn node(&self, handle: ElementHandle) -> BrowserResult<&FixtureNode> {
        let path = self.path(handle)?;
        self.document
            .node(path)
            .ok_or(BrowserError::StaleHandle(handle))
    }

    fn register(&mut self, paths: Vec<Vec<usize>>) -> Vec<ElementHandle> {
        self.arena.register(paths)
    }

    fn load(&mut self, url: &str) {
        self.arena.clear();
        self.url = url.to_string();
        let route = self
            .routes
            .iter_mut()
            .filter(|route| url.contains(route.pattern.as_str()))
            .max_by_key(|route| route.pattern.len());
        self.document = match route {
            Some(route) => route.next_document(),
            None => FixtureDocument::empty(),
        };
    }
}

#[async_trait(?Send)]
impl PageAutomation for FixturePage {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        if self.offline {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "fixture is offline".into(),
            });
        }
        self.navigations.push(url.to_string());
        self.load(url);
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> BrowserResult<bool> {
        Ok(!self.document.find(selector, None).is_empty())
    }

    async fn query_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>> {
        let found = self.document.find(selector, None);
        Ok(self.register(found))
    }

    async fn query_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> BrowserResult<Vec<ElementHandle>> {
        let scope = self.path(scope)?.to_vec();
        let found = self.document.find(selector, Some(&scope));
        Ok(self.register(found))
    }

    async fn text(&mut self, handle: ElementHandle) -> BrowserResult<String> {
        Ok(self.node(handle)?.text.clone().unwrap_or_default())
    }

    async fn attribute(
        &mut self,
        handle: ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        Ok(self.node(handle)?.attribute(name))
    }

    async fn inner_html(&mut self, handle: ElementHandle) -> BrowserResult<Option<String>> {
        let node = self.node(handle)?;
        Ok(node.html.clone().or_else(|| node.text.clone()))
    }

    async fn click(&mut self, handle: ElementHandle) -> BrowserResult<()> {
        let node = self.node(handle)?;
        let label = node.selectors.first().cloned().unwrap_or_default();
        let target = node.on_click.clone();
        self.clicks.push(label);
        self.arena.clear();
        if let Some(url) = target {
            self.navigate(&url).await?;
        }
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        self.url_checks += 1;
        if let Some(next) = self.url_script.pop_front() {
            return Ok(next);
        }
        Ok(self.url.clone())
    }

    async fn page_source(&mut self) -> BrowserResult<String> {
        Ok(self.document.render())
    }

    async fn scroll_by(&mut self, delta_y: f64) -> BrowserResult<()> {
        self.scrolls.push(delta_y);
        Ok(())
    }
}
