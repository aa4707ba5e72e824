//! Single-slot, overwrite-on-full handoff between the poller and the synchronizer.
//!
//! Built on `tokio::sync::watch`: the sender never waits, an unread value is
//! replaced by the next one, and dropping the sender is the end-of-stream
//! signal. A reader can miss an intermediate status but never sees a stale one.

use tokio::sync::watch;

use crate::models::LiveStatus;

pub fn status_channel() -> (StatusSender, StatusReceiver) {
    let (tx, rx) = watch::channel(None);
    (StatusSender { tx }, StatusReceiver { rx })
}

pub struct StatusSender {
    tx: watch::Sender<Option<LiveStatus>>,
}

impl StatusSender {
    /// Stores `status` as the latest value. Returns false once the receiver is gone.
    pub fn send(&self, status: LiveStatus) -> bool {
        self.tx.send_replace(Some(status));
        !self.tx.is_closed()
    }
}

pub struct StatusReceiver {
    rx: watch::Receiver<Option<LiveStatus>>,
}

impl StatusReceiver {
    /// Next unseen status, or `None` at end-of-stream. A value sent right
    /// before the sender was dropped is still delivered.
    pub async fn recv(&mut self) -> Option<LiveStatus> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            if let Some(status) = self.rx.borrow_and_update().clone() {
                return Some(status);
            }
        }
    }
}
