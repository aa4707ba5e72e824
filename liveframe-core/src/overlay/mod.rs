//! Actor wrapper around the native overlay surface.
//!
//! One OS thread owns the [`OverlaySurface`] and applies commands in arrival
//! order, so the surface never sees concurrent show/hide/destroy calls no
//! matter how many [`OverlayHandle`] clones exist.

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::traits::OverlaySurface;

const COMMAND_QUEUE_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverlayCommand {
    SetVisible(bool),
    Destroy,
}

/// Cheap, cloneable, non-blocking entry point to the overlay actor.
#[derive(Clone)]
pub struct OverlayHandle {
    tx: Sender<OverlayCommand>,
}

impl OverlayHandle {
    pub fn set_visible(&self, visible: bool) -> Result<(), Error> {
        self.submit(OverlayCommand::SetVisible(visible))
    }

    fn submit(&self, cmd: OverlayCommand) -> Result<(), Error> {
        self.tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => Error::Overlay("overlay command queue is full".into()),
            TrySendError::Disconnected(_) => Error::Overlay("overlay actor has stopped".into()),
        })
    }
}

/// Owner side of the actor thread.
pub struct OverlayActor {
    handle: OverlayHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl OverlayActor {
    pub fn spawn<S: OverlaySurface>(surface: S) -> Result<Self, Error> {
        let (tx, rx) = bounded(COMMAND_QUEUE_DEPTH);
        let thread = thread::Builder::new()
            .name("liveframe-overlay".into())
            .spawn(move || run_actor(surface, rx))?;
        Ok(Self {
            handle: OverlayHandle { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> OverlayHandle {
        self.handle.clone()
    }

    /// Hides and destroys the surface, then waits for the actor thread.
    /// Commands queued before this call are applied first.
    pub fn shutdown(mut self) -> Result<(), Error> {
        // A full queue still drains; blocking here only waits for earlier commands.
        let _ = self.handle.tx.send(OverlayCommand::Destroy);
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| Error::Overlay("overlay actor thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for OverlayActor {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.handle.submit(OverlayCommand::Destroy);
        }
    }
}

fn run_actor<S: OverlaySurface>(mut surface: S, rx: Receiver<OverlayCommand>) {
    info!("Overlay actor started");
    for cmd in rx.iter() {
        match cmd {
            OverlayCommand::SetVisible(visible) => match surface.set_visible(visible) {
                Ok(()) => debug!("Overlay set_visible({})", visible),
                Err(e) => error!("Overlay set_visible({}) failed: {}", visible, e),
            },
            OverlayCommand::Destroy => break,
        }
    }

    // Reached on Destroy or once every handle is dropped.
    if let Err(e) = surface.set_visible(false) {
        warn!("Overlay final hide failed: {}", e);
    }
    surface.destroy();
    info!("Overlay actor stopped");
}
