use std::time::{Duration, Instant};

use rand::Rng;

/// Exponential backoff parameters.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_interval: Duration,
    /// Growth factor applied after every failure. Values below 1 are treated as 1.
    pub multiplier: f64,
    /// Each delay is randomized within `± jitter_factor × interval`.
    pub jitter_factor: f64,
    pub max_interval: Duration,
    /// Give up once this much time has passed since the last reset.
    /// `None` retries forever.
    pub max_elapsed: Option<Duration>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 1.5,
            jitter_factor: 0.3,
            max_interval: Duration::from_secs(5 * 60),
            max_elapsed: None,
        }
    }
}

/// Reconnect delay state, owned by a single reconnect loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current_interval: Duration,
    started: Instant,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_interval: config.initial_interval,
            config,
            started: Instant::now(),
        }
    }

    /// Back to the initial interval; restarts the elapsed-time budget.
    pub fn reset(&mut self) {
        self.current_interval = self.config.initial_interval;
        self.started = Instant::now();
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Delay before the next attempt, then grow the interval.
    ///
    /// Returns `None` once waiting again would exceed `max_elapsed`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = jittered(self.current_interval, self.config.jitter_factor);

        if let Some(max_elapsed) = self.config.max_elapsed {
            if self.elapsed() + delay > max_elapsed {
                return None;
            }
        }

        let grown = self
            .current_interval
            .mul_f64(self.config.multiplier.max(1.0));
        self.current_interval = grown.min(self.config.max_interval);

        Some(delay)
    }
}

fn jittered(interval: Duration, jitter_factor: f64) -> Duration {
    let jitter_factor = jitter_factor.clamp(0.0, 1.0);
    if jitter_factor == 0.0 || interval.is_zero() {
        return interval;
    }
    let secs = interval.as_secs_f64();
    let delta = secs * jitter_factor;
    Duration::from_secs_f64(rand::thread_rng().gen_range((secs - delta)..=(secs + delta)))
}
