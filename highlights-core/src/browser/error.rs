use thiserror::Error;

use super::page::ElementHandle;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("element handle {0:?} is no longer attached to the page")]
    StaleHandle(ElementHandle),
    #[error("debug capture failed: {0}")]
    Capture(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}
