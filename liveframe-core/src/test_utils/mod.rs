// File: liveframe-core/src/test_utils/mod.rs
//
// In-memory stand-ins for the external capabilities, shared by unit and
// integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use crate::Error;
use crate::http::{HttpClient, HttpResponse};
use crate::models::{AuthenticationPrompt, Broadcast, ClientConfig, Token};
use crate::traits::{AuthenticationHandler, LiveStatusSource, OverlaySurface, TokenStore};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Token valid (or expired, for negative offsets) relative to now.
pub fn token_expiring_in(offset: chrono::Duration, refresh_token: &str) -> Token {
    Token {
        access_token: "cached-access".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: refresh_token.to_string(),
        expiry: Utc::now() + offset,
    }
}

pub fn test_client_config(redirect_port: u16) -> ClientConfig {
    ClientConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        auth_endpoint: Url::parse("https://accounts.example.test/o/oauth2/auth").expect("static url"),
        token_endpoint: Url::parse("https://oauth2.example.test/token").expect("static url"),
        redirect_url: Url::parse(&format!("http://127.0.0.1:{redirect_port}/oauth2callback"))
            .expect("static url"),
        scopes: vec!["https://www.googleapis.com/auth/youtube.readonly".to_string()],
    }
}

/// Grabs an ephemeral port the OS considers free right now.
pub fn free_local_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("bind ephemeral port")
}

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses, POSTs and GETs from separate queues, and records
/// every request. An empty queue answers with a platform error.
#[derive(Default)]
pub struct ScriptedHttpClient {
    posts: Mutex<VecDeque<Result<HttpResponse, Error>>>,
    gets: Mutex<VecDeque<Result<HttpResponse, Error>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    stalled_posts: AtomicUsize,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_post(&self, resp: Result<HttpResponse, Error>) {
        lock(&self.posts).push_back(resp);
    }

    /// The next `n` POSTs are recorded but never answered.
    pub fn stall_posts(&self, n: usize) {
        self.stalled_posts.store(n, Ordering::SeqCst);
    }

    pub fn push_get(&self, resp: Result<HttpResponse, Error>) {
        lock(&self.gets).push_back(resp);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn count(&self, method: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.method == method).count()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn post_form(&self, url: String, form: Vec<(String, String)>) -> Result<HttpResponse, Error> {
        lock(&self.requests).push(RecordedRequest {
            method: "POST",
            url,
            params: form,
            headers: HashMap::new(),
        });
        let stalled = self
            .stalled_posts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            std::future::pending::<()>().await;
        }
        lock(&self.posts)
            .pop_front()
            .unwrap_or_else(|| Err(Error::Platform("no scripted POST response".into())))
    }

    async fn get(
        &self,
        url: String,
        query: Vec<(String, String)>,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, Error> {
        lock(&self.requests).push(RecordedRequest {
            method: "GET",
            url,
            params: query,
            headers,
        });
        lock(&self.gets)
            .pop_front()
            .unwrap_or_else(|| Err(Error::Platform("no scripted GET response".into())))
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<Token>>,
    saves: AtomicUsize,
}

impl MemoryTokenStore {
    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saved(&self) -> Option<Token> {
        lock(&self.token).clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Token, Error> {
        lock(&self.token)
            .clone()
            .ok_or_else(|| Error::NotFound("memory store is empty".into()))
    }

    fn save(&self, token: &Token) -> Result<(), Error> {
        *lock(&self.token) = Some(token.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Overlay surface that remembers every `set_visible` argument.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    calls: Arc<Mutex<Vec<bool>>>,
    destroyed: Arc<AtomicBool>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<bool> {
        lock(&self.calls).clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl OverlaySurface for RecordingSurface {
    fn set_visible(&mut self, visible: bool) -> Result<(), Error> {
        lock(&self.calls).push(visible);
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Answers `active_broadcasts` from a queue; once drained it reports "not live".
#[derive(Default)]
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Result<Vec<Broadcast>, Error>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(replies: Vec<Result<Vec<Broadcast>, Error>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call sleeps `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn live_broadcast(title: &str) -> Broadcast {
    Broadcast {
        id: format!("bc-{title}"),
        title: title.to_string(),
        life_cycle_status: Some("live".to_string()),
    }
}

#[async_trait]
impl LiveStatusSource for ScriptedSource {
    async fn active_broadcasts(&self) -> Result<Vec<Broadcast>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Plays the browser: follows the consent URL's redirect back to the
/// loopback listener with `code` and the URL's own `state`.
pub struct BrowserSimulator {
    code: String,
    prompts: Mutex<Vec<AuthenticationPrompt>>,
    override_state: Option<String>,
}

impl BrowserSimulator {
    pub fn approving(code: &str) -> Self {
        Self {
            code: code.to_string(),
            prompts: Mutex::new(Vec::new()),
            override_state: None,
        }
    }

    /// Sends a forged `state` first, then the real one.
    pub fn with_forged_state_first(mut self, forged: &str) -> Self {
        self.override_state = Some(forged.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<AuthenticationPrompt> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl AuthenticationHandler for BrowserSimulator {
    async fn handle_prompt(&self, prompt: AuthenticationPrompt) -> Result<(), Error> {
        lock(&self.prompts).push(prompt.clone());

        let url = Url::parse(&prompt.url)?;
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let state = params
            .get("state")
            .cloned()
            .ok_or_else(|| Error::Auth("consent url carries no state".into()))?;
        let redirect = params
            .get("redirect_uri")
            .cloned()
            .ok_or_else(|| Error::Auth("consent url carries no redirect_uri".into()))?;

        let client = reqwest::Client::builder().no_proxy().build()?;
        if let Some(forged) = &self.override_state {
            let resp = client
                .get(&redirect)
                .query(&[("code", "forged-code"), ("state", forged.as_str())])
                .send()
                .await?;
            if resp.status().as_u16() != 400 {
                return Err(Error::Auth(format!("forged state accepted with {}", resp.status())));
            }
        }

        let resp = client
            .get(&redirect)
            .query(&[("code", self.code.as_str()), ("state", state.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Auth(format!("callback answered {}", resp.status())));
        }
        Ok(())
    }
}

/// Never touches the callback; the flow has to end by timeout or shutdown.
#[derive(Default)]
pub struct SilentPrompt {
    pub shown: AtomicUsize,
}

#[async_trait]
impl AuthenticationHandler for SilentPrompt {
    async fn handle_prompt(&self, _prompt: AuthenticationPrompt) -> Result<(), Error> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
