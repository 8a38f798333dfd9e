pub mod browser;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod harvest;
pub mod test_framework;

pub use browser::{BrowserError, BrowserLauncher, BrowserResult, LaunchOverrides, PageAutomation};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{load_harvest_config, HarvestConfig, Region};
pub use error::{ConfigError, Result};
pub use export::{ExportError, ExportResult};
pub use harvest::{
    Book, BookFailure, BookSelection, CancelFlag, CatalogDiscoverer, CatalogListing, EventSink,
    HarvestError, HarvestEvent, HarvestResult, HarvestRun, HarvestSession, Highlight,
    HighlightColor, HighlightHarvester, HighlightSet, RecordAggregator, RunReport, SessionGate,
    SessionState,
};
