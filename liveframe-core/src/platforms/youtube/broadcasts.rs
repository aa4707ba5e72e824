use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::Error;
use crate::auth::AuthorizedClient;
use crate::models::Broadcast;
use crate::traits::LiveStatusSource;

pub const LIVE_BROADCASTS_URL: &str = "https://www.googleapis.com/youtube/v3/liveBroadcasts";

#[derive(Debug, Deserialize)]
struct LiveBroadcastsResponse {
    #[serde(default)]
    items: Vec<LiveBroadcastItem>,
}

#[derive(Debug, Deserialize)]
struct LiveBroadcastItem {
    id: String,
    snippet: Option<LiveBroadcastSnippet>,
    status: Option<LiveBroadcastStatus>,
}

#[derive(Debug, Deserialize)]
struct LiveBroadcastSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct LiveBroadcastStatus {
    #[serde(rename = "lifeCycleStatus")]
    life_cycle_status: Option<String>,
}

impl From<LiveBroadcastItem> for Broadcast {
    fn from(item: LiveBroadcastItem) -> Self {
        Broadcast {
            id: item.id,
            title: item.snippet.map(|s| s.title).unwrap_or_default(),
            life_cycle_status: item.status.and_then(|s| s.life_cycle_status),
        }
    }
}

/// "Which broadcasts of the authenticated channel are active?"
pub struct YouTubeClient {
    client: Arc<AuthorizedClient>,
    endpoint: String,
}

impl YouTubeClient {
    pub fn new(client: Arc<AuthorizedClient>) -> Self {
        Self::with_endpoint(client, LIVE_BROADCASTS_URL)
    }

    pub fn with_endpoint(client: Arc<AuthorizedClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl LiveStatusSource for YouTubeClient {
    async fn active_broadcasts(&self) -> Result<Vec<Broadcast>, Error> {
        let query = vec![
            ("part".to_string(), "id,snippet,status".to_string()),
            ("broadcastStatus".to_string(), "active".to_string()),
        ];
        let resp: LiveBroadcastsResponse = self.client.get_json(&self.endpoint, query).await?;
        debug!("Found {} active broadcast(s)", resp.items.len());
        Ok(resp.items.into_iter().map(Broadcast::from).collect())
    }
}
