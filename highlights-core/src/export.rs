//! JSON hand-off of aggregated sets to whatever writes them out.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::harvest::{safe_file_stem, HighlightSet};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

pub fn to_json(set: &HighlightSet) -> ExportResult<String> {
    Ok(serde_json::to_string_pretty(set)?)
}

pub fn from_json(raw: &str) -> ExportResult<HighlightSet> {
    Ok(serde_json::from_str(raw)?)
}

pub fn file_name(set: &HighlightSet) -> String {
    format!("{}.json", safe_file_stem(&set.book().asin))
}

/// Writes `<asin>.json` into `directory`, creating it if needed.
pub async fn write_set(directory: &Path, set: &HighlightSet) -> ExportResult<PathBuf> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|source| ExportError::Io {
            source,
            path: directory.to_path_buf(),
        })?;
    let path = directory.join(file_name(set));
    let body = to_json(set)?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|source| ExportError::Io {
            source,
            path: path.clone(),
        })?;
    info!(path = %path.display(), highlights = set.len(), "highlight set exported");
    Ok(path)
}
