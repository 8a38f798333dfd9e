use std::time::Duration;

use rand::Rng;

use crate::config::PaginationSection;

/// Backoff schedule for reloading a page whose content did not change.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    schedule: Vec<Duration>,
    jitter_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &PaginationSection) -> Self {
        let mut schedule = config
            .stall_backoff_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect::<Vec<_>>();
        if schedule.is_empty() {
            schedule.push(Duration::from_millis(500));
            schedule.push(Duration::from_millis(1_000));
            schedule.push(Duration::from_millis(2_000));
        }
        Self {
            max_retries: config.stall_retries,
            schedule,
            jitter_ms: config.stall_jitter_ms,
        }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Delay before retry number `retry` (1-based). Past the end of the
    /// schedule the last step keeps doubling, so delays never shrink.
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let last_index = self.schedule.len() - 1;
        if retry - 1 <= last_index {
            self.schedule[retry - 1]
        } else {
            let extra = (retry - 1 - last_index).min(16) as u32;
            self.schedule[last_index].saturating_mul(2u32.saturating_pow(extra))
        }
    }

    pub fn jittered_delay(&self, retry: usize) -> Duration {
        let mut delay = self.delay_for_retry(retry);
        if self.jitter_ms > 0 && !delay.is_zero() {
            let jitter = rand::thread_rng().gen_range(0..=self.jitter_ms);
            delay += Duration::from_millis(jitter);
        }
        delay
    }
}
