pub mod handoff;
pub mod status_poller;
pub mod visibility_sync;

pub use handoff::{status_channel, StatusReceiver, StatusSender};
pub use status_poller::{PollOutcome, PollerSettings, StatusPoller};
pub use visibility_sync::VisibilitySynchronizer;

use tokio::sync::watch;

/// Resolves once the shutdown flag flips to `true`. If every sender is gone
/// without signalling, it never resolves.
pub async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
