use crate::config::DisplayConfig;
use std::time::{Duration, Instant};
use tracing::trace;

/// Presentation loop pacing statistics
#[derive(Debug, Clone, Default)]
pub struct PacingStats {
    pub cycles: u64,
    /// Cycles whose work alone exceeded the target interval
    pub overruns: u64,
    pub total_cycle_time: Duration,
    pub max_cycle_time: Duration,
}

impl PacingStats {
    pub fn record_cycle(&mut self, elapsed: Duration, overrun: bool) {
        self.cycles += 1;
        self.total_cycle_time += elapsed;
        self.max_cycle_time = self.max_cycle_time.max(elapsed);
        if overrun {
            self.overruns += 1;
        }
    }

    pub fn average_cycle_time(&self) -> Duration {
        if self.cycles == 0 {
            Duration::ZERO
        } else {
            self.total_cycle_time.div_f64(self.cycles as f64)
        }
    }
}

/// Open-loop frame pacing.
///
/// Each cycle waits `max(min_delay, target_interval - elapsed)`. Drift across
/// cycles is not compensated.
#[derive(Debug, Clone)]
pub struct Governor {
    target_interval: Duration,
    min_delay: Duration,
    stats: PacingStats,
}

impl Governor {
    pub fn new(target_interval: Duration, min_delay: Duration) -> Self {
        Self {
            target_interval,
            min_delay,
            stats: PacingStats::default(),
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(config.target_frame_interval(), config.min_delay())
    }

    pub fn target_interval(&self) -> Duration {
        self.target_interval
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Delay owed after a cycle that took `elapsed`
    pub fn delay_for(&self, elapsed: Duration) -> Duration {
        self.target_interval
            .saturating_sub(elapsed)
            .max(self.min_delay)
    }

    /// Record a cycle started at `started` and return the delay before the next
    pub fn finish_cycle(&mut self, started: Instant) -> Duration {
        let elapsed = started.elapsed();
        let delay = self.delay_for(elapsed);
        self.stats
            .record_cycle(elapsed, elapsed > self.target_interval);

        trace!("Cycle took {:?}, sleeping {:?}", elapsed, delay);
        delay
    }

    pub fn stats(&self) -> &PacingStats {
        &self.stats
    }
}
