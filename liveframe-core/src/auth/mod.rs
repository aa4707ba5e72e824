// =============================================================================
// liveframe-core/src/auth/mod.rs
// =============================================================================

pub mod callback_server;
pub mod client;
pub mod manager;
pub mod pkce;
pub mod token_endpoint;

pub use client::AuthorizedClient;
pub use manager::SessionManager;
pub use liveframe_common::traits::{AuthenticationHandler, TokenStore};
pub use liveframe_common::models::AuthenticationPrompt;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::Error;
use crate::models::Token;

/// Only logs the URL. Useful when no browser is available.
#[derive(Default)]
pub struct LogOnlyPrompt;

#[async_trait]
impl AuthenticationHandler for LogOnlyPrompt {
    async fn handle_prompt(&self, prompt: AuthenticationPrompt) -> Result<(), Error> {
        info!("Open this URL in your browser to authorize liveframe:\n  {}", prompt.url);
        Ok(())
    }
}

/// Writes `token` on the blocking pool. A failed save is logged, not returned:
/// the token is still good for this run.
pub(crate) async fn persist_token(store: &Arc<dyn TokenStore>, token: &Token) {
    let store = Arc::clone(store);
    let token = token.clone();
    match tokio::task::spawn_blocking(move || store.save(&token)).await {
        Ok(Ok(())) => debug!("Token saved"),
        Ok(Err(e)) => warn!("Failed to save token: {}", e),
        Err(e) => warn!("Token save task failed: {}", e),
    }
}
