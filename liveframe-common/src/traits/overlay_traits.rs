use crate::error::Error;

/// The native overlay window, seen from the core as a single capability.
///
/// Implementations are owned by one actor thread (see `liveframe_core::overlay`),
/// so they never see concurrent calls. Redundant `set_visible` calls must be
/// harmless.
pub trait OverlaySurface: Send + 'static {
    fn set_visible(&mut self, visible: bool) -> Result<(), Error>;

    /// Called once before the owning actor exits.
    fn destroy(&mut self) {}
}
