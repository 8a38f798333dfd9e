mod automation;
mod error;
mod fingerprint;
mod human;
mod metrics;
mod page;
mod retry;

pub use automation::{BrowserAutomation, BrowserContext, BrowserLauncher, LaunchOverrides};
pub use error::{BrowserError, BrowserResult};
pub use fingerprint::StealthMasker;
pub use human::{HumanPacer, IdleAction};
pub use metrics::HarvestMetrics;
pub use page::{ElementHandle, PageAutomation};
pub(crate) use page::HandleArena;
pub use retry::RetryPolicy;
