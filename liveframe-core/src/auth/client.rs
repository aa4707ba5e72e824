use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Error;
use crate::auth::persist_token;
use crate::auth::token_endpoint::exchange_refresh_token;
use crate::http::HttpClient;
use crate::models::{ClientConfig, Token};
use crate::traits::TokenStore;

/// Refresh this long before the recorded expiry so a request never races it.
const EXPIRY_LEEWAY_SECS: i64 = 10;

/// Makes bearer-authenticated calls and keeps its token fresh.
///
/// Shared as `Arc<AuthorizedClient>` for the rest of the process. The token
/// sits behind an async mutex, so concurrent callers never refresh twice.
pub struct AuthorizedClient {
    config: ClientConfig,
    token: Mutex<Token>,
    store: Arc<dyn TokenStore>,
    http: Arc<dyn HttpClient>,
}

impl AuthorizedClient {
    pub fn new(
        config: ClientConfig,
        token: Token,
        store: Arc<dyn TokenStore>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            token: Mutex::new(token),
            store,
            http,
        }
    }

    pub async fn current_token(&self) -> Token {
        self.token.lock().await.clone()
    }

    /// Returns a usable access token, refreshing (and persisting) first if the
    /// wrapped one is about to expire.
    pub async fn access_token(&self) -> Result<String, Error> {
        let mut token = self.token.lock().await;
        if !token.expires_within(Duration::seconds(EXPIRY_LEEWAY_SECS)) {
            return Ok(token.access_token.clone());
        }

        if !token.is_renewable() {
            return Err(Error::Auth("access token expired and no refresh token is available".into()));
        }

        info!("Access token expired, refreshing...");
        let refreshed = exchange_refresh_token(self.http.as_ref(), &self.config, &token.refresh_token).await?;
        persist_token(&self.store, &refreshed).await;
        debug!("Token refreshed; new expiry {}", refreshed.expiry);
        *token = refreshed;
        Ok(token.access_token.clone())
    }

    /// GET `url` with `query`, authenticated, and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, Error> {
        let access_token = self.access_token().await?;
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", access_token));

        let resp = self.http.get(url.to_string(), query, headers).await?;
        match resp.status {
            200..=299 => Ok(serde_json::from_str(&resp.body)?),
            401 | 403 => Err(Error::Auth(format!("{} rejected credentials (HTTP {})", url, resp.status))),
            status => Err(Error::Platform(format!("{} returned HTTP {}: {}", url, status, snippet(&resp.body)))),
        }
    }
}

fn snippet(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
