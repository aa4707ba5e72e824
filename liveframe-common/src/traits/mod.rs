pub mod auth_traits;
pub mod overlay_traits;
pub mod status_traits;

pub use auth_traits::{AuthenticationHandler, TokenStore};
pub use overlay_traits::OverlaySurface;
pub use status_traits::LiveStatusSource;
