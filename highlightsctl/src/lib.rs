use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use highlights_core::export::ExportError;
use highlights_core::{
    load_harvest_config, BookSelection, BrowserLauncher, CancelFlag, ConfigError, EventSink,
    HarvestConfig, HarvestError, HarvestEvent, HarvestRun, LaunchOverrides,
};

pub mod commands;

use commands::books::BookList;
use commands::check::ConfigCheck;
use commands::harvest::{write_report, HarvestArgs};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("harvest failed: {0}")]
    Harvest(#[from] HarvestError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Kindle notebook highlight harvester", long_about = None)]
pub struct Cli {
    /// Path to harvest.toml
    #[arg(long, default_value = "configs/harvest.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and list the annotated library
    Books(BrowserArgs),
    /// Harvest highlights and write one JSON file per book
    Harvest(HarvestArgs),
    /// Load and validate the configuration
    Check,
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    /// Run Chromium without a window (login must already be cached in the profile)
    #[arg(long)]
    pub headless: bool,
}

impl BrowserArgs {
    fn overrides(&self) -> LaunchOverrides {
        LaunchOverrides {
            headless: self.headless.then_some(true),
        }
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Keeps an already installed subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Check => {
            let check = ConfigCheck::load(&cli.config)?;
            render(&check, cli.format)?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "highlightsctl", &mut std::io::stdout());
        }
        Commands::Books(args) => {
            let context = AppContext::new(&cli)?;
            let runtime = runtime()?;
            let books = runtime.block_on(context.books(args))?;
            render(&books, cli.format)?;
        }
        Commands::Harvest(args) => {
            let context = AppContext::new(&cli)?;
            let runtime = runtime()?;
            let summary = runtime.block_on(context.harvest(args))?;
            render(&summary, cli.format)?;
        }
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

pub(crate) fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

pub(crate) trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: Arc<HarvestConfig>,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config = load_harvest_config(&cli.config)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    fn launcher(&self) -> BrowserLauncher {
        BrowserLauncher::new(Arc::clone(&self.config))
    }

    async fn books(&self, args: &BrowserArgs) -> Result<BookList> {
        let (events, printer) = event_printer();
        let run = HarvestRun::new(Arc::clone(&self.config)).with_events(events);
        let listing = run.list_books(&self.launcher(), args.overrides()).await;
        drop(run);
        let _ = printer.await;
        Ok(BookList::from_listing(&listing?))
    }

    async fn harvest(&self, args: &HarvestArgs) -> Result<commands::harvest::HarvestSummary> {
        let cancel = CancelFlag::new();
        let ctrl_c = tokio::spawn(watch_ctrl_c(cancel.clone()));
        let (events, printer) = event_printer();
        let selection = if args.asin.is_empty() {
            BookSelection::All
        } else {
            BookSelection::Asins(args.asin.clone())
        };

        let run = HarvestRun::new(Arc::clone(&self.config))
            .with_events(events)
            .with_cancel(cancel);
        let report = run
            .execute(&self.launcher(), args.browser.overrides(), selection)
            .await;
        drop(run);
        ctrl_c.abort();
        let _ = printer.await;

        let report = report?;
        if report.cancelled {
            warn!("run cancelled; writing the books that finished");
        }
        write_report(report, &args.output).await
    }
}

async fn watch_ctrl_c(cancel: CancelFlag) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("interrupt received; finishing the current page");
        cancel.cancel();
    }
}

fn event_printer() -> (EventSink, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                HarvestEvent::LoginRequired { url, instructions } => {
                    eprintln!("{instructions}\n  -> {url}");
                }
                HarvestEvent::LoggedIn { attempts } => info!(attempts, "logged in"),
                HarvestEvent::CatalogListed { books, dropped } => {
                    info!(books, dropped, "library listed")
                }
                HarvestEvent::BookStarted { asin, title } => info!(%asin, %title, "book started"),
                HarvestEvent::PageHarvested {
                    asin,
                    page,
                    highlights,
                } => info!(%asin, page, highlights, "page harvested"),
                HarvestEvent::StalePage { asin, page } => warn!(%asin, page, "page went stale"),
                HarvestEvent::BookFinished {
                    asin,
                    highlights,
                    incomplete,
                } => info!(%asin, highlights, incomplete, "book finished"),
                HarvestEvent::BookFailed { asin, reason } => warn!(%asin, %reason, "book failed"),
            }
        }
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_harvest_arguments() {
        let cli = Cli::try_parse_from([
            "highlightsctl",
            "--format",
            "json",
            "harvest",
            "--asin",
            "A1",
            "--asin",
            "B2",
            "--output",
            "out",
            "--headless",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Harvest(args) => {
                assert_eq!(args.asin, vec!["A1", "B2"]);
                assert_eq!(args.output, PathBuf::from("out"));
                assert_eq!(args.browser.overrides().headless, Some(true));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn books_defaults_to_configured_headless_mode() {
        let cli = Cli::try_parse_from(["highlightsctl", "books"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("configs/harvest.toml"));
        match cli.command {
            Commands::Books(args) => assert_eq!(args.overrides().headless, None),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn missing_config_is_a_config_error() {
        let cli = Cli::try_parse_from(["highlightsctl", "--config", "/nonexistent.toml", "check"])
            .unwrap();
        assert!(matches!(run(cli), Err(AppError::Config(ConfigError::Io { .. }))));
    }
}
