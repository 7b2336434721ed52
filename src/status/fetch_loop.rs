use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cistatus_common::Color;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::hub::Hub;
use super::state::SummaryStore;
use crate::fetcher::Fetcher;

/// Upper bound on a single fetch. A stuck upstream counts as a failed tick.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// What a single poll of the CI server did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Fetch succeeded, color unchanged; nothing was broadcast.
    Unchanged(Color),
    /// Fetch succeeded and the color changed; the new summary was broadcast.
    Transition { from: Color, to: Color },
    /// Fetch failed; the stored summary was left untouched.
    Failed,
}

/// Polls the fetcher on a fixed interval and publishes color transitions.
///
/// The interval is also the retry cadence: a failed fetch is logged and the
/// loop simply waits for the next tick.
pub struct FetchLoop {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<SummaryStore>,
    hub: Arc<Hub>,
    interval: Duration,
    fetch_timeout: Duration,
}

impl FetchLoop {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<SummaryStore>,
        hub: Arc<Hub>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            hub,
            interval,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Run one fetch-and-reduce cycle.
    pub async fn tick(&self) -> TickOutcome {
        tracing::debug!("fetching CI server status");

        let fetched = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_status()).await;
        let projects = match fetched {
            Ok(Ok(projects)) => projects,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "error fetching status");
                return TickOutcome::Failed;
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.fetch_timeout, "fetching status timed out");
                return TickOutcome::Failed;
            }
        };

        let count = projects.len();
        let previous = self.store.color();
        let outcome = match self.store.update(projects, Utc::now()) {
            Some(summary) => {
                let report = self.hub.broadcast(&summary);
                tracing::info!(
                    from = %previous,
                    to = %summary.color,
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "status color changed"
                );
                TickOutcome::Transition {
                    from: previous,
                    to: summary.color,
                }
            }
            None => TickOutcome::Unchanged(previous),
        };

        tracing::debug!(projects = count, "fetched projects");
        outcome
    }

    /// Poll forever. The first fetch happens immediately.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
