// liveframe-core/src/tasks/status_poller.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::Error;
use crate::models::LiveStatus;
use crate::tasks::handoff::StatusSender;
use crate::tasks::shutdown_signalled;
use crate::traits::LiveStatusSource;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Always shorter than `interval`.
    pub call_timeout: Duration,
    pub error_cooldown: Duration,
}

impl PollerSettings {
    /// A zero interval falls back to the default. A call timeout that is zero
    /// or not shorter than the interval is clamped to half of it.
    pub fn new(interval: Duration, call_timeout: Duration, error_cooldown: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("Poll interval must be non-zero; using {:?}", DEFAULT_INTERVAL);
            DEFAULT_INTERVAL
        } else {
            interval
        };
        let call_timeout = if call_timeout.is_zero() || call_timeout >= interval {
            let clamped = interval / 2;
            let clamped = if clamped.is_zero() { interval } else { clamped };
            warn!(
                "Call timeout {:?} must be non-zero and shorter than the poll interval {:?}; using {:?}",
                call_timeout, interval, clamped
            );
            clamped
        } else {
            call_timeout
        };
        Self {
            interval,
            call_timeout,
            error_cooldown,
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_CALL_TIMEOUT, DEFAULT_ERROR_COOLDOWN)
    }
}

/// What one cycle produced.
#[derive(Debug)]
pub enum PollOutcome {
    Fresh(LiveStatus),
    /// The query failed; `status` repeats the last known value.
    Fallback { status: LiveStatus, error: Error },
}

impl PollOutcome {
    pub fn status(&self) -> &LiveStatus {
        match self {
            PollOutcome::Fresh(s) => s,
            PollOutcome::Fallback { status, .. } => status,
        }
    }

    pub fn into_status(self) -> LiveStatus {
        match self {
            PollOutcome::Fresh(s) => s,
            PollOutcome::Fallback { status, .. } => status,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PollOutcome::Fallback { .. })
    }
}

/// Asks the remote source "is live?" on a fixed cadence. Failures are never
/// surfaced downstream: the last known answer is re-sent instead.
pub struct StatusPoller {
    source: Arc<dyn LiveStatusSource>,
    settings: PollerSettings,
    last_known: bool,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn LiveStatusSource>, settings: PollerSettings) -> Self {
        Self {
            source,
            settings,
            last_known: false,
        }
    }

    pub fn last_known(&self) -> bool {
        self.last_known
    }

    /// One query, bounded by the call timeout.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let result = match timeout(self.settings.call_timeout, self.source.active_broadcasts()).await {
            Ok(inner) => inner,
            Err(elapsed) => Err(Error::Timeout(elapsed)),
        };

        match result {
            Ok(broadcasts) => {
                let is_live = !broadcasts.is_empty();
                self.last_known = is_live;
                let title = broadcasts.into_iter().next().map(|b| b.title);
                match &title {
                    Some(t) if is_live => info!("Stream is live: {}", t),
                    _ => debug!("No active stream found"),
                }
                PollOutcome::Fresh(LiveStatus::fresh(is_live, title))
            }
            Err(error) => {
                warn!(
                    "Error checking live broadcasts: {}; re-sending last known status ({})",
                    error, self.last_known
                );
                PollOutcome::Fallback {
                    status: LiveStatus::last_known(self.last_known),
                    error,
                }
            }
        }
    }

    /// Polls immediately, then every `interval`, until `shutdown` flips or the
    /// receiver goes away. The sender is dropped on exit, which is the single
    /// end-of-stream signal for the consumer.
    pub fn spawn(mut self, tx: StatusSender, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Status poller started (interval={:?}, call_timeout={:?})",
                self.settings.interval, self.settings.call_timeout
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_signalled(&mut shutdown) => break,
                    _ = ticker.tick() => {}
                }

                let outcome = tokio::select! {
                    biased;
                    _ = shutdown_signalled(&mut shutdown) => break,
                    outcome = self.poll_once() => outcome,
                };

                let failed = outcome.is_failure();
                if !tx.send(outcome.into_status()) {
                    info!("Status consumer is gone; stopping poller");
                    break;
                }

                if failed {
                    tokio::select! {
                        biased;
                        _ = shutdown_signalled(&mut shutdown) => break,
                        _ = sleep(self.settings.error_cooldown) => {}
                    }
                }
            }

            drop(tx);
            info!("Status poller stopped");
        })
    }
}
