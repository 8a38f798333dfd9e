mod aggregate;
mod cancel;
mod capture;
mod catalog;
mod error;
mod events;
pub mod fallback;
mod highlights;
mod models;
mod run;
mod session;

pub use aggregate::RecordAggregator;
pub use cancel::CancelFlag;
pub use capture::{safe_file_stem, DebugCapture, FileCapture, PageSnapshot};
pub use catalog::{parse_annotated_date, CatalogDiscoverer, CatalogListing};
pub use error::{HarvestError, HarvestResult};
pub use events::{EventSink, HarvestEvent};
pub use fallback::{Accessor, FallbackChain, FieldRule};
pub use highlights::{highlights_url, HarvestOutcome, HighlightHarvester, PageStop};
pub use models::{Book, Highlight, HighlightColor, HighlightSet};
pub use run::{BookFailure, BookSelection, HarvestRun, RunReport};
pub use session::{HarvestSession, SessionGate, SessionState};
