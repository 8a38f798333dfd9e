use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::clock::{Clock, TokioClock};
use crate::config::PacingSection;

use super::page::PageAutomation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdleAction {
    Scroll { delta_y: f64, pause: Duration },
}

/// Jittered pacing between structural page actions, plus the occasional
/// idle scroll. With `enabled = false` every call returns immediately.
#[derive(Debug)]
pub struct HumanPacer {
    config: PacingSection,
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
}

impl HumanPacer {
    pub fn new(config: PacingSection, clock: Arc<dyn Clock>) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { config, clock, rng }
    }

    pub fn disabled() -> Self {
        Self::new(PacingSection::disabled(), Arc::new(TokioClock))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn next_delay(&mut self) -> Duration {
        if !self.config.enabled {
            return Duration::ZERO;
        }
        self.random_duration(self.config.action_delay_ms)
    }

    /// Sleeps a random duration within `action_delay_ms` and returns it.
    pub async fn delay_before_action(&mut self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            self.clock.sleep(delay).await;
        }
        delay
    }

    pub fn plan_idle(&mut self) -> Option<IdleAction> {
        if !self.config.enabled || self.config.idle_probability <= 0.0 {
            return None;
        }
        if !self.rng.gen_bool(self.config.idle_probability.min(1.0)) {
            return None;
        }
        let [low, high] = self.config.scroll_burst_px;
        let magnitude = self.rng.gen_range(low..=high) as f64;
        let delta_y = if self.rng.gen_bool(0.7) {
            magnitude
        } else {
            -magnitude
        };
        let pause = self.random_duration(self.config.idle_pause_ms);
        Some(IdleAction::Scroll { delta_y, pause })
    }

    /// Maybe performs a no-op interaction. Failures are logged, never
    /// propagated: pacing must not change what gets extracted.
    pub async fn maybe_idle(&mut self, page: &mut dyn PageAutomation) -> bool {
        let Some(action) = self.plan_idle() else {
            return false;
        };
        match action {
            IdleAction::Scroll { delta_y, pause } => {
                if let Err(err) = page.scroll_by(delta_y).await {
                    debug!(error = %err, "idle scroll failed");
                    return false;
                }
                self.clock.sleep(pause).await;
            }
        }
        true
    }

    fn random_duration(&mut self, bounds: [u64; 2]) -> Duration {
        let low = bounds[0].min(bounds[1]);
        let high = bounds[0].max(bounds[1]);
        Duration::from_millis(self.rng.gen_range(low..=high))
    }
}
