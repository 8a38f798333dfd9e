use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::browser::{BrowserError, BrowserResult};

/// Raw markup of a page that could not be harvested, keyed by asin and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub asin: String,
    pub captured_at: DateTime<Utc>,
    pub url: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.html",
            safe_file_stem(&self.asin),
            self.captured_at.format("%Y%m%dT%H%M%SZ")
        )
    }
}

/// Receives debug snapshots. Callers ignore failures beyond logging them.
#[async_trait]
pub trait DebugCapture: Send + Sync + Debug {
    async fn capture(&self, snapshot: &PageSnapshot) -> BrowserResult<()>;
}

#[derive(Debug, Clone)]
pub struct FileCapture {
    directory: PathBuf,
}

impl FileCapture {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl DebugCapture for FileCapture {
    async fn capture(&self, snapshot: &PageSnapshot) -> BrowserResult<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| BrowserError::Capture(format!("{}: {err}", self.directory.display())))?;
        let path = self.directory.join(snapshot.file_name());
        tokio::fs::write(&path, snapshot.html.as_bytes())
            .await
            .map_err(|err| BrowserError::Capture(format!("{}: {err}", path.display())))?;
        debug!(path = %path.display(), "debug snapshot written");
        Ok(())
    }
}

/// Keeps `[A-Za-z0-9_-]`, replacing everything else with `_`.
pub fn safe_file_stem(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
