use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::{BrowserResult, PageAutomation};
use crate::clock::Clock;
use crate::config::HarvestConfig;

use super::cancel::CancelFlag;
use super::error::{HarvestError, HarvestResult};
use super::events::{emit, EventSink, HarvestEvent};

const LOGIN_INSTRUCTIONS: &str =
    "Sign in to your Amazon account in the browser window; harvesting continues once the notebook loads.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotStarted,
    AwaitingLogin,
    LoggedIn,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSession {
    pub state: SessionState,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
}

/// Blocks the run until the user has logged in by hand.
#[derive(Debug)]
pub struct SessionGate {
    config: Arc<HarvestConfig>,
    clock: Arc<dyn Clock>,
    events: Option<EventSink>,
    cancel: CancelFlag,
    session: HarvestSession,
    instructed: bool,
}

impl SessionGate {
    pub fn new(config: Arc<HarvestConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            events: None,
            cancel: CancelFlag::default(),
            session: HarvestSession::default(),
            instructed: false,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn session(&self) -> &HarvestSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Opens the notebook page and moves to `AwaitingLogin`.
    pub async fn enter(&mut self, page: &mut dyn PageAutomation) -> HarvestResult<()> {
        let url = self.config.notebook_url().to_string();
        if let Err(err) = page.navigate(&url).await {
            self.session.state = SessionState::Failed;
            return Err(HarvestError::AutomationUnavailable(err.to_string()));
        }
        self.session.state = SessionState::AwaitingLogin;
        self.session.started_at.get_or_insert_with(Utc::now);
        if !self.instructed {
            self.instructed = true;
            info!(url = %url, instructions = LOGIN_INSTRUCTIONS, "waiting for manual login");
            emit(
                self.events.as_ref(),
                HarvestEvent::LoginRequired {
                    url,
                    instructions: LOGIN_INSTRUCTIONS.to_string(),
                },
            );
        }
        Ok(())
    }

    /// Polls every `poll_interval` until login is confirmed or `max_wait`
    /// has elapsed on the injected clock.
    pub async fn await_login(
        &mut self,
        page: &mut dyn PageAutomation,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> HarvestResult<&HarvestSession> {
        match self.session.state {
            SessionState::LoggedIn => return Ok(&self.session),
            SessionState::NotStarted | SessionState::Failed => self.enter(page).await?,
            SessionState::AwaitingLogin => {}
        }

        let poll_interval = poll_interval.max(Duration::from_millis(1));
        let start = self.clock.now();
        loop {
            self.cancel.check()?;
            self.session.attempts += 1;
            match self.login_confirmed(page).await {
                Ok(true) => {
                    self.session.state = SessionState::LoggedIn;
                    info!(attempts = self.session.attempts, "login confirmed");
                    emit(
                        self.events.as_ref(),
                        HarvestEvent::LoggedIn {
                            attempts: self.session.attempts,
                        },
                    );
                    return Ok(&self.session);
                }
                Ok(false) => {}
                Err(err) => {
                    debug!(error = %err, attempt = self.session.attempts, "login check failed");
                }
            }

            let waited = self.clock.now().saturating_duration_since(start);
            if waited >= max_wait {
                self.session.state = SessionState::Failed;
                warn!(?waited, attempts = self.session.attempts, "login wait exhausted");
                return Err(HarvestError::LoginTimeout {
                    waited,
                    attempts: self.session.attempts,
                });
            }
            self.clock.sleep(poll_interval.min(max_wait - waited)).await;
        }
    }

    /// Uses the configured poll cadence and budget.
    pub async fn await_login_default(
        &mut self,
        page: &mut dyn PageAutomation,
    ) -> HarvestResult<&HarvestSession> {
        let poll = self.config.session.poll_interval();
        let max_wait = self.config.session.max_wait();
        self.await_login(page, poll, max_wait).await
    }

    async fn login_confirmed(&self, page: &mut dyn PageAutomation) -> BrowserResult<bool> {
        let session = &self.config.session;
        let url = page.current_url().await?;
        let on_notebook = url.contains(session.notebook_url_marker.as_str());
        let signing_in = session
            .signin_url_markers
            .iter()
            .any(|marker| url.contains(marker.as_str()));
        if on_notebook && !signing_in {
            return Ok(true);
        }
        for selector in &session.logged_in_selectors {
            if !page.query_all(selector).await?.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
