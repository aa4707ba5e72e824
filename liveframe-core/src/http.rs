//! HTTP capability used for both the OAuth endpoints and the streaming API.
//!
//! Everything that goes over the wire is funnelled through [`HttpClient`] so the
//! session manager and the poller can be exercised against scripted responses.
//! The default implementation wraps reqwest.

use async_trait::async_trait;
use reqwest;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;
use crate::Error;

/// No request, including reading the body, may take longer than this.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status plus body; the caller decides what a non-2xx status means.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A generic trait for making HTTP requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: String, form: Vec<(String, String)>) -> Result<HttpResponse, Error>;

    async fn get(
        &self,
        url: String,
        query: Vec<(String, String)>,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT).unwrap_or_else(|e| {
            warn!("Falling back to an HTTP client without timeout: {}", e);
            Self {
                client: reqwest::Client::new(),
            }
        })
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Default for DefaultHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn post_form(&self, url: String, form: Vec<(String, String)>) -> Result<HttpResponse, Error> {
        let response = self.client
            .post(&url)
            .form(&form)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }

    async fn get(
        &self,
        url: String,
        query: Vec<(String, String)>,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Error> {
        let mut request = self.client.get(&url).query(&query);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
