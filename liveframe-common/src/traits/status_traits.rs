use async_trait::async_trait;

use crate::error::Error;
use crate::models::Broadcast;

/// The remote "list active broadcasts for the authenticated account" query.
#[async_trait]
pub trait LiveStatusSource: Send + Sync {
    async fn active_broadcasts(&self) -> Result<Vec<Broadcast>, Error>;
}
