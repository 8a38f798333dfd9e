use std::time::Duration;

use thiserror::Error;

use crate::browser::BrowserError;

pub type HarvestResult<T> = Result<T, HarvestError>;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("login not confirmed after {waited:?} ({attempts} checks)")]
    LoginTimeout { waited: Duration, attempts: u32 },
    #[error("page automation unavailable: {0}")]
    AutomationUnavailable(String),
    #[error("catalog listed no books")]
    CatalogEmpty,
    #[error("{count} catalog entries had no resolvable asin")]
    BookMissingAsin { count: usize },
    #[error("page {page} of {asin} stopped changing; harvest is incomplete")]
    StalePage { asin: String, page: usize },
    #[error("page {page} of {asin} never became ready; harvest is incomplete")]
    PageNotReady { asin: String, page: usize },
    #[error("{asin} reports {expected} highlights but none were extracted")]
    EmptyResult { asin: String, expected: u32 },
    #[error("harvest cancelled")]
    Cancelled,
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl HarvestError {
    /// Errors that end the whole run rather than a single book.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::LoginTimeout { .. } | HarvestError::AutomationUnavailable(_)
        )
    }
}
