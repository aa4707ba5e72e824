use async_trait::async_trait;
use tracing::{info, warn};

use liveframe_common::Error;
use liveframe_common::models::AuthenticationPrompt;
use liveframe_common::traits::AuthenticationHandler;

/// Opens the consent page in the default browser. The URL is logged either
/// way so a headless user can copy it.
#[derive(Default)]
pub struct BrowserPrompt;

#[async_trait]
impl AuthenticationHandler for BrowserPrompt {
    async fn handle_prompt(&self, prompt: AuthenticationPrompt) -> Result<(), Error> {
        info!(
            "Authorize liveframe in your browser (waiting on {}):\n  {}",
            prompt.redirect_url, prompt.url
        );
        // The opener may block on a child process.
        let url = prompt.url.clone();
        match tokio::task::spawn_blocking(move || open::that(&url)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Could not open browser automatically: {:?}", err),
            Err(err) => warn!("Browser opener task failed: {:?}", err),
        }
        Ok(())
    }
}
