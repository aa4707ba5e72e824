use async_trait::async_trait;

use crate::error::Error;
use crate::models::{AuthenticationPrompt, Token};

/// Durable home of the token pair. Pure load/save, never touches the network.
pub trait TokenStore: Send + Sync {
    /// `Error::NotFound` when nothing is cached, `Error::Decode` when the
    /// cached bytes are not a token.
    fn load(&self) -> Result<Token, Error>;

    fn save(&self, token: &Token) -> Result<(), Error>;
}

/// Presents the consent URL to the user (browser, log line, test driver...).
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    async fn handle_prompt(&self, prompt: AuthenticationPrompt) -> Result<(), Error>;
}
