//! Shared models, traits and the error type for the liveframe workspace.

pub mod error;
pub mod models;
pub mod traits;

pub use error::Error;
