use tracing::info;

use liveframe_common::Error;
use liveframe_common::traits::OverlaySurface;

/// Stand-in surface for hosts without a native overlay window: it only
/// reports what a real window would do.
#[derive(Default)]
pub struct LogSurface {
    visible: bool,
}

impl OverlaySurface for LogSurface {
    fn set_visible(&mut self, visible: bool) -> Result<(), Error> {
        if visible != self.visible {
            info!("Overlay {}", if visible { "shown" } else { "hidden" });
        }
        self.visible = visible;
        Ok(())
    }

    fn destroy(&mut self) {
        info!("Overlay destroyed");
    }
}
