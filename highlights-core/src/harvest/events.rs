use tokio::sync::mpsc::UnboundedSender;

/// Progress notifications for whoever drives the run (the CLI prints them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    LoginRequired { url: String, instructions: String },
    LoggedIn { attempts: u32 },
    CatalogListed { books: usize, dropped: usize },
    BookStarted { asin: String, title: String },
    PageHarvested { asin: String, page: usize, highlights: usize },
    StalePage { asin: String, page: usize },
    BookFinished { asin: String, highlights: usize, incomplete: bool },
    BookFailed { asin: String, reason: String },
}

pub type EventSink = UnboundedSender<HarvestEvent>;

pub(crate) fn emit(sink: Option<&EventSink>, event: HarvestEvent) {
    if let Some(sink) = sink {
        // A dropped receiver only means nobody is listening.
        let _ = sink.send(event);
    }
}
