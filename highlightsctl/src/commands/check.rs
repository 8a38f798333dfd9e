use std::path::{Path, PathBuf};

use serde::Serialize;

use highlights_core::{load_harvest_config, Region};

use crate::{DisplayFallback, Result};

#[derive(Debug, Serialize)]
pub struct ConfigCheck {
    pub path: PathBuf,
    pub region: Region,
    pub notebook_url: String,
    pub headless: bool,
    pub max_pages: usize,
    pub stall_retries: usize,
    pub pacing_enabled: bool,
    pub capture_directory: Option<String>,
}

impl ConfigCheck {
    pub fn load(path: &Path) -> Result<Self> {
        let config = load_harvest_config(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            region: config.region.region,
            notebook_url: config.notebook_url().to_string(),
            headless: config.chromium.headless,
            max_pages: config.pagination.max_pages,
            stall_retries: config.pagination.stall_retries,
            pacing_enabled: config.pacing.enabled,
            capture_directory: config
                .capture
                .enabled
                .then(|| config.capture.directory.clone()),
        })
    }
}

impl DisplayFallback for ConfigCheck {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("config: {} (ok)", self.path.display()),
            format!("notebook: {} ({:?})", self.notebook_url, self.region),
            format!("headless: {}", self.headless),
            format!(
                "pagination: max {} pages, {} stall retries",
                self.max_pages, self.stall_retries
            ),
            format!("pacing: {}", if self.pacing_enabled { "on" } else { "off" }),
        ];
        match &self.capture_directory {
            Some(dir) => lines.push(format!("snapshots: {dir}")),
            None => lines.push("snapshots: off".to_string()),
        }
        lines.join("\n")
    }
}
