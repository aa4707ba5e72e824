// File: liveframe-common/src/models/mod.rs
pub mod auth;
pub mod status;

pub use auth::{
    AuthenticationPrompt, ClientConfig, Token, TokenErrorResponse, TokenResponse,
    DEFAULT_REDIRECT_URL, YOUTUBE_READONLY_SCOPE,
};
pub use status::{Broadcast, LiveStatus, Visibility};
