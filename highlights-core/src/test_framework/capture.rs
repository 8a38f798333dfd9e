use std::sync::Mutex;

use async_trait::async_trait;

use crate::browser::{BrowserError, BrowserResult};
use crate::harvest::{DebugCapture, PageSnapshot};

/// Keeps snapshots in memory; can be told to fail every capture.
#[derive(Debug, Default)]
pub struct MemoryCapture {
    snapshots: Mutex<Vec<PageSnapshot>>,
    failing: bool,
}

impl MemoryCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            snapshots: Mutex::default(),
            failing: true,
        }
    }

    pub fn snapshots(&self) -> Vec<PageSnapshot> {
        match self.snapshots.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl DebugCapture for MemoryCapture {
    async fn capture(&self, snapshot: &PageSnapshot) -> BrowserResult<()> {
        if self.failing {
            return Err(BrowserError::Capture("capture disabled by fixture".into()));
        }
        match self.snapshots.lock() {
            Ok(mut guard) => guard.push(snapshot.clone()),
            Err(poisoned) => poisoned.into_inner().push(snapshot.clone()),
        }
        Ok(())
    }
}
