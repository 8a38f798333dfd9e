use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::harvest::fallback::{Accessor, FallbackChain, FieldRule};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct HarvestConfig {
    pub chromium: ChromiumSection,
    pub stealth: StealthSection,
    pub region: RegionSection,
    pub session: SessionSection,
    pub timeouts: TimeoutSection,
    pub selectors: SelectorSection,
    pub pagination: PaginationSection,
    pub pacing: PacingSection,
    pub capture: CaptureSection,
}

impl HarvestConfig {
    pub fn notebook_url(&self) -> &str {
        self.region
            .notebook_url
            .as_deref()
            .unwrap_or_else(|| self.region.region.notebook_url())
    }

    pub fn product_url(&self, asin: &str) -> String {
        format!("https://{}/dp/{asin}", self.region.region.store_host())
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "session.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.session.max_wait_ms < self.session.poll_interval_ms {
            return Err(ConfigError::Invalid(
                "session.max_wait_ms must be at least one poll interval".into(),
            ));
        }
        for (name, value) in [
            ("timeouts.navigation_ms", self.timeouts.navigation_ms),
            ("timeouts.catalog_ready_ms", self.timeouts.catalog_ready_ms),
            ("timeouts.page_ready_ms", self.timeouts.page_ready_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.pagination.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "pagination.max_pages must be greater than zero".into(),
            ));
        }
        if let Some(step) = self
            .pagination
            .stall_backoff_ms
            .windows(2)
            .position(|pair| pair[1] < pair[0])
        {
            return Err(ConfigError::Invalid(format!(
                "pagination.stall_backoff_ms must not decrease (step {} is shorter than step {})",
                step + 1,
                step
            )));
        }
        check_range("pacing.action_delay_ms", self.pacing.action_delay_ms)?;
        check_range("pacing.idle_pause_ms", self.pacing.idle_pause_ms)?;
        check_range(
            "pacing.scroll_burst_px",
            [
                u64::from(self.pacing.scroll_burst_px[0]),
                u64::from(self.pacing.scroll_burst_px[1]),
            ],
        )?;
        if !(0.0..=1.0).contains(&self.pacing.idle_probability) {
            return Err(ConfigError::Invalid(
                "pacing.idle_probability must be within [0, 1]".into(),
            ));
        }
        let catalog = &self.selectors.catalog;
        let highlights = &self.selectors.highlights;
        for (name, chain) in [
            ("selectors.catalog.asin", &catalog.asin),
            ("selectors.highlights.text", &highlights.text),
        ] {
            if chain.is_empty() {
                return Err(ConfigError::Invalid(format!("{name} needs at least one rule")));
            }
        }
        if catalog.entry.trim().is_empty() || highlights.entry.trim().is_empty() {
            return Err(ConfigError::Invalid("entry selectors must not be empty".into()));
        }
        Ok(())
    }
}

fn check_range(name: &str, range: [u64; 2]) -> Result<()> {
    if range[0] > range[1] {
        Err(ConfigError::Invalid(format!(
            "{name} lower bound {} exceeds upper bound {}",
            range[0], range[1]
        )))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub user_data_dir: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub window_size: [u32; 2],
    pub request_timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
    pub lang: Option<String>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            user_data_dir: None,
            // Login is manual, so the window has to be visible by default.
            headless: false,
            sandbox: true,
            disable_gpu: false,
            window_size: [1366, 900],
            request_timeout_seconds: Some(60),
            user_agent: None,
            lang: Some("en-US".into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StealthSection {
    pub hide_webdriver: bool,
    pub languages: Vec<String>,
    pub chrome_runtime_stub: bool,
}

impl Default for StealthSection {
    fn default() -> Self {
        Self {
            hide_webdriver: true,
            languages: vec!["en-US".into(), "en".into()],
            chrome_runtime_stub: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    #[default]
    Global,
    India,
    Japan,
    Spain,
    Germany,
    Italy,
    Uk,
    France,
}

impl Region {
    pub fn notebook_url(self) -> &'static str {
        match self {
            Region::Global => "https://read.amazon.com/notebook",
            Region::India => "https://read.amazon.in/notebook",
            Region::Japan => "https://read.amazon.co.jp/notebook",
            Region::Spain => "https://read.amazon.es/notebook",
            Region::Germany => "https://read.amazon.de/notebook",
            Region::Italy => "https://read.amazon.it/notebook",
            Region::Uk => "https://read.amazon.co.uk/notebook",
            Region::France => "https://read.amazon.fr/notebook",
        }
    }

    pub fn store_host(self) -> &'static str {
        match self {
            Region::Global => "www.amazon.com",
            Region::India => "www.amazon.in",
            Region::Japan => "www.amazon.co.jp",
            Region::Spain => "www.amazon.es",
            Region::Germany => "www.amazon.de",
            Region::Italy => "www.amazon.it",
            Region::Uk => "www.amazon.co.uk",
            Region::France => "www.amazon.fr",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegionSection {
    pub region: Region,
    /// Overrides the region preset, e.g. for a staging mirror.
    pub notebook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub poll_interval_ms: u64,
    pub max_wait_ms: u64,
    pub notebook_url_marker: String,
    pub signin_url_markers: Vec<String>,
    pub logged_in_selectors: Vec<String>,
}

impl SessionSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_wait_ms: 120_000,
            notebook_url_marker: "/notebook".into(),
            signin_url_markers: vec!["/ap/signin".into(), "/ap/mfa".into()],
            logged_in_selectors: vec!["#kp-notebook-library".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    pub navigation_ms: u64,
    pub catalog_ready_ms: u64,
    pub page_ready_ms: u64,
    pub element_poll_ms: u64,
}

impl TimeoutSection {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn catalog_ready(&self) -> Duration {
        Duration::from_millis(self.catalog_ready_ms)
    }

    pub fn page_ready(&self) -> Duration {
        Duration::from_millis(self.page_ready_ms)
    }

    pub fn element_poll(&self) -> Duration {
        Duration::from_millis(self.element_poll_ms.max(1))
    }
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            catalog_ready_ms: 15_000,
            page_ready_ms: 15_000,
            element_poll_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorSection {
    pub catalog: CatalogSelectors,
    pub highlights: HighlightSelectors,
    pub pagination: PaginationSelectors,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSelectors {
    pub container: String,
    pub entry: String,
    pub title: FallbackChain,
    pub author: FallbackChain,
    pub asin: FallbackChain,
    pub cover_image: FallbackChain,
    pub annotated_date: FallbackChain,
    pub highlight_count: FallbackChain,
    pub author_labels: Vec<String>,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            container: "#kp-notebook-library".into(),
            entry: ".kp-notebook-library-each-book".into(),
            title: FallbackChain::new(vec![
                FieldRule::text("h2.kp-notebook-searchable"),
                FieldRule::text("h2"),
            ]),
            author: FallbackChain::new(vec![
                FieldRule::text("p.kp-notebook-searchable"),
                FieldRule::text("p"),
            ]),
            asin: FallbackChain::new(vec![
                FieldRule::own(Accessor::Attribute("id".into())),
                FieldRule::own(Accessor::Attribute("data-asin".into())),
            ]),
            cover_image: FallbackChain::new(vec![
                FieldRule::attribute(".kp-notebook-cover-image", "src"),
                FieldRule::attribute("img", "src"),
            ]),
            annotated_date: FallbackChain::new(vec![
                FieldRule::attribute("[id^='kp-notebook-annotated-date']", "value"),
                FieldRule::text("[id^='kp-notebook-annotated-date']"),
            ]),
            highlight_count: FallbackChain::default(),
            author_labels: vec!["Author:".into(), "By:".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HighlightSelectors {
    pub container: String,
    pub entry: String,
    pub text: FallbackChain,
    pub location: FallbackChain,
    pub page: FallbackChain,
    pub note: FallbackChain,
    pub color: FallbackChain,
    /// Token fragment that precedes the color name in a marker class.
    pub color_marker: String,
    pub expected_count: FallbackChain,
}

impl Default for HighlightSelectors {
    fn default() -> Self {
        Self {
            container: "#kp-notebook-annotations".into(),
            entry: "#kp-notebook-annotations .a-row.a-spacing-base".into(),
            text: FallbackChain::new(vec![
                FieldRule::text("#highlight"),
                FieldRule::text(".kp-notebook-highlight"),
            ]),
            location: FallbackChain::new(vec![
                FieldRule::attribute("#kp-annotation-location", "value"),
                FieldRule::text("#kp-annotation-location"),
            ]),
            page: FallbackChain::new(vec![
                FieldRule::text("#annotationNoteHeader"),
                FieldRule::text("#annotationHighlightHeader"),
            ]),
            note: FallbackChain::new(vec![
                FieldRule::html("#note"),
                FieldRule::text(".kp-notebook-note"),
            ]),
            color: FallbackChain::new(vec![FieldRule::attribute(
                ".kp-notebook-highlight",
                "class",
            )]),
            color_marker: "highlight-".into(),
            expected_count: FallbackChain::new(vec![
                FieldRule::text("#kp-notebook-highlights-count"),
                FieldRule::attribute("#kp-notebook-highlights-count", "value"),
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSelectors {
    pub token: FallbackChain,
    pub content_limit_state: FallbackChain,
    pub next_control: Option<String>,
}

impl Default for PaginationSelectors {
    fn default() -> Self {
        Self {
            token: FallbackChain::new(vec![FieldRule::attribute(
                ".kp-notebook-annotations-next-page-start",
                "value",
            )]),
            content_limit_state: FallbackChain::new(vec![FieldRule::attribute(
                ".kp-notebook-content-limit-state",
                "value",
            )]),
            next_control: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSection {
    pub max_pages: usize,
    pub stall_retries: usize,
    pub stall_backoff_ms: Vec<u64>,
    pub stall_jitter_ms: u64,
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            max_pages: 200,
            stall_retries: 2,
            stall_backoff_ms: vec![1_000, 2_000, 4_000],
            stall_jitter_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingSection {
    pub enabled: bool,
    pub action_delay_ms: [u64; 2],
    pub idle_probability: f64,
    pub idle_pause_ms: [u64; 2],
    pub scroll_burst_px: [u32; 2],
    pub seed: Option<u64>,
}

impl PacingSection {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            action_delay_ms: [800, 2_400],
            idle_probability: 0.2,
            idle_pause_ms: [400, 1_500],
            scroll_burst_px: [120, 640],
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub enabled: bool,
    pub directory: String,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: "debug".into(),
        }
    }
}

pub fn load_harvest_config<P: AsRef<Path>>(path: P) -> Result<HarvestConfig> {
    let config: HarvestConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
