use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::HarvestConfig;

use super::error::{BrowserError, BrowserResult};
use super::fingerprint::StealthMasker;
use super::page::{ElementHandle, HandleArena, PageAutomation};

#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<HarvestConfig>,
    stealth: Arc<StealthMasker>,
}

impl BrowserLauncher {
    pub fn new(config: Arc<HarvestConfig>) -> Self {
        let stealth = Arc::new(StealthMasker::new(config.stealth.clone()));
        Self { config, stealth }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub async fn launch(&self) -> BrowserResult<BrowserAutomation> {
        self.launch_with_overrides(LaunchOverrides::default()).await
    }

    pub async fn launch_with_overrides(
        &self,
        overrides: LaunchOverrides,
    ) -> BrowserResult<BrowserAutomation> {
        let headless = overrides.headless.unwrap_or(self.config.chromium.headless);
        let chromium_config = self.build_chromium_config(headless)?;
        let [width, height] = self.config.chromium.window_size;
        info!(width, height, headless, "Launching Chromium instance");

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        Ok(BrowserAutomation {
            browser,
            handler_task: Some(handler_task),
            config: Arc::clone(&self.config),
            stealth: Arc::clone(&self.stealth),
        })
    }

    fn build_chromium_config(&self, headless: bool) -> BrowserResult<ChromiumConfig> {
        let chromium = &self.config.chromium;
        let [width, height] = chromium.window_size;
        let mut builder = ChromiumConfig::builder().viewport(ChromiumViewport {
            width,
            height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: width >= height,
            has_touch: false,
        });

        if let Some(path) = &chromium.executable_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(dir) = &chromium.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !chromium.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(seconds) = chromium.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(seconds));
        }

        let mut args = vec![
            format!("--window-size={width},{height}"),
            "--no-first-run".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--password-store=basic".to_string(),
        ];
        if let Some(agent) = &chromium.user_agent {
            args.push(format!("--user-agent={agent}"));
        }
        if let Some(lang) = &chromium.lang {
            args.push(format!("--lang={lang}"));
        }
        if chromium.disable_gpu {
            args.push("--disable-gpu".into());
        }
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Configuration)
    }
}

/// A running Chromium process. Call [`BrowserAutomation::shutdown`] on every
/// exit path; dropping it without shutdown leaves the process to the OS.
#[derive(Debug)]
pub struct BrowserAutomation {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    config: Arc<HarvestConfig>,
    stealth: Arc<StealthMasker>,
}

impl BrowserAutomation {
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub async fn new_context(&self) -> BrowserResult<BrowserContext> {
        let params = CreateTargetParams::new("about:blank");
        let page = self.browser.new_page(params).await?;
        self.stealth.apply(&page).await?;
        Ok(BrowserContext {
            page,
            elements: HandleArena::default(),
            navigation_timeout: self.config.timeouts.navigation(),
            element_poll: self.config.timeouts.element_poll(),
        })
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("Shutting down Chromium instance");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("BrowserAutomation dropped without explicit shutdown");
            }
        }
    }
}

/// One tab. Element handles index into `elements`, which is reset on every
/// navigation and click so stale handles fail instead of touching a detached
/// node.
#[derive(Debug)]
pub struct BrowserContext {
    page: Page,
    elements: HandleArena<Element>,
    navigation_timeout: Duration,
    element_poll: Duration,
}

impl BrowserContext {
    pub fn page(&self) -> &Page {
        &self.page
    }

    fn element(&self, handle: ElementHandle) -> BrowserResult<&Element> {
        self.elements.get(handle)
    }
}

#[async_trait(?Send)]
impl PageAutomation for BrowserContext {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.elements.clear();
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        let page = &self.page;
        let navigation = async {
            page.goto(params).await?;
            page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        match timeout(self.navigation_timeout, navigation).await {
            Ok(result) => result.map_err(|err| BrowserError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout(format!("navigation to {url}"))),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(found) = self.page.find_elements(selector).await {
                if !found.is_empty() {
                    return Ok(true);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(self.element_poll.min(deadline - now)).await;
        }
    }

    async fn query_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>> {
        let found = self.page.find_elements(selector).await?;
        Ok(self.elements.register(found))
    }

    async fn query_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> BrowserResult<Vec<ElementHandle>> {
        let found = self.element(scope)?.find_elements(selector).await?;
        Ok(self.elements.register(found))
    }

    async fn text(&mut self, handle: ElementHandle) -> BrowserResult<String> {
        Ok(self
            .element(handle)?
            .inner_text()
            .await?
            .unwrap_or_default())
    }

    async fn attribute(
        &mut self,
        handle: ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        Ok(self.element(handle)?.attribute(name).await?)
    }

    async fn inner_html(&mut self, handle: ElementHandle) -> BrowserResult<Option<String>> {
        Ok(self.element(handle)?.inner_html().await?)
    }

    async fn click(&mut self, handle: ElementHandle) -> BrowserResult<()> {
        self.element(handle)?.click().await?;
        self.elements.clear();
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn page_source(&mut self) -> BrowserResult<String> {
        Ok(self.page.content().await?)
    }

    async fn scroll_by(&mut self, delta_y: f64) -> BrowserResult<()> {
        let script = format!("window.scrollBy({{ top: {delta_y}, behavior: 'smooth' }});");
        self.page.evaluate(script.as_str()).await.map_err(|err| {
            BrowserError::Unexpected(format!("failed to execute scroll script: {err}"))
        })?;
        Ok(())
    }
}
