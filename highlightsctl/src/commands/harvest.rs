use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use highlights_core::browser::HarvestMetrics;
use highlights_core::export::write_set;
use highlights_core::RunReport;

use crate::{BrowserArgs, DisplayFallback, Result};

#[derive(Args, Debug, Clone)]
pub struct HarvestArgs {
    /// Only harvest these ASINs (repeatable); defaults to the whole library
    #[arg(long = "asin", value_name = "ASIN")]
    pub asin: Vec<String>,
    /// Directory that receives one `<asin>.json` per book
    #[arg(long, default_value = "highlights")]
    pub output: PathBuf,
    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Serialize)]
pub struct HarvestSummary {
    pub run_id: String,
    pub cancelled: bool,
    pub books: Vec<BookResult>,
    pub failures: Vec<BookFailureRow>,
    pub diagnostics: Vec<String>,
    pub metrics: HarvestMetrics,
}

#[derive(Debug, Serialize)]
pub struct BookResult {
    pub asin: String,
    pub title: String,
    pub highlights: usize,
    pub duplicates_removed: usize,
    pub incomplete: bool,
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct BookFailureRow {
    pub asin: String,
    pub title: String,
    pub reason: String,
}

/// Writes every finished set under `output` and summarizes the run.
pub async fn write_report(report: RunReport, output: &Path) -> Result<HarvestSummary> {
    let mut books = Vec::with_capacity(report.sets.len());
    for set in &report.sets {
        let file = write_set(output, set).await?;
        books.push(BookResult {
            asin: set.book().asin.clone(),
            title: set.book().title.clone(),
            highlights: set.len(),
            duplicates_removed: set.duplicates_removed(),
            incomplete: set.incomplete(),
            file,
        });
    }
    let failures = report
        .failures
        .iter()
        .map(|failure| BookFailureRow {
            asin: failure.book.asin.clone(),
            title: failure.book.title.clone(),
            reason: failure.error.to_string(),
        })
        .collect();
    Ok(HarvestSummary {
        run_id: report.run_id.to_string(),
        cancelled: report.cancelled,
        books,
        failures,
        diagnostics: report.diagnostics.iter().map(ToString::to_string).collect(),
        metrics: report.metrics,
    })
}

impl DisplayFallback for HarvestSummary {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        for book in &self.books {
            let mut line = format!(
                "{} | {} | {} highlights -> {}",
                book.asin,
                book.title,
                book.highlights,
                book.file.display()
            );
            if book.incomplete {
                line.push_str(" (incomplete)");
            }
            lines.push(line);
        }
        for failure in &self.failures {
            lines.push(format!(
                "{} | {} | failed: {}",
                failure.asin, failure.title, failure.reason
            ));
        }
        for diagnostic in &self.diagnostics {
            lines.push(format!("note: {diagnostic}"));
        }
        lines.push(format!(
            "run {}: {} written, {} failed{}",
            self.run_id,
            self.books.len(),
            self.failures.len(),
            if self.cancelled { ", cancelled" } else { "" }
        ));
        lines.join("\n")
    }
}
