use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::models::{LiveStatus, Visibility};
use crate::overlay::OverlayHandle;
use crate::tasks::handoff::StatusReceiver;
use crate::tasks::shutdown_signalled;

/// Two-state machine (Hidden/Visible) driving the overlay from poller output.
///
/// Its state is only touched by the task that runs it, so no locking here;
/// the overlay actor serialises the actual window calls.
pub struct VisibilitySynchronizer {
    overlay: OverlayHandle,
    state: Visibility,
}

impl VisibilitySynchronizer {
    pub fn new(overlay: OverlayHandle) -> Self {
        Self {
            overlay,
            state: Visibility::Hidden,
        }
    }

    pub fn state(&self) -> Visibility {
        self.state
    }

    /// Moves to `Visible` iff `status.is_live`. Returns the new state when it
    /// changed; a repeated value is a no-op and touches nothing.
    pub fn apply(&mut self, status: &LiveStatus) -> Result<Option<Visibility>, Error> {
        let target = Visibility::from_live(status.is_live);
        if target == self.state {
            debug!("Visibility unchanged ({:?}, fresh={})", target, status.fresh);
            return Ok(None);
        }

        self.overlay.set_visible(target.is_visible())?;
        info!("Overlay {:?} -> {:?}", self.state, target);
        self.state = target;
        Ok(Some(target))
    }

    /// Receives until end-of-stream or shutdown, then always issues a final
    /// hide so the overlay is never left on screen. Returns the final state.
    pub async fn run(mut self, mut rx: StatusReceiver, mut shutdown: watch::Receiver<bool>) -> Visibility {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => {
                    info!("Visibility synchronizer received shutdown");
                    break;
                }
                next = rx.recv() => match next {
                    Some(status) => {
                        if let Err(e) = self.apply(&status) {
                            error!("Failed to update overlay visibility: {}", e);
                        }
                    }
                    None => {
                        info!("Status stream ended");
                        break;
                    }
                },
            }
        }

        self.force_hidden();
        self.state
    }

    pub fn spawn(self, rx: StatusReceiver, shutdown: watch::Receiver<bool>) -> JoinHandle<Visibility> {
        tokio::spawn(self.run(rx, shutdown))
    }

    fn force_hidden(&mut self) {
        if let Err(e) = self.overlay.set_visible(false) {
            warn!("Final hide could not be delivered: {}", e);
        }
        self.state = Visibility::Hidden;
    }
}
