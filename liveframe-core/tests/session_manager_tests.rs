// File: liveframe-core/tests/session_manager_tests.rs

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use url::Url;

use liveframe_core::Error;
use liveframe_core::auth::SessionManager;
use liveframe_core::auth::pkce::challenge_for;
use liveframe_core::repositories::FileTokenStore;
use liveframe_core::test_utils::*;
use liveframe_core::traits::TokenStore;

fn manager(
    port: u16,
    store: Arc<dyn TokenStore>,
    http: Arc<ScriptedHttpClient>,
    prompt: Arc<dyn liveframe_core::traits::AuthenticationHandler>,
) -> SessionManager {
    SessionManager::new(test_client_config(port), store, http, prompt)
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(10))
}

fn token_json(access: &str, refresh: Option<&str>) -> serde_json::Value {
    match refresh {
        Some(r) => json!({"access_token": access, "refresh_token": r, "expires_in": 3599, "token_type": "Bearer"}),
        None => json!({"access_token": access, "expires_in": 3599, "token_type": "Bearer"}),
    }
}

#[tokio::test]
async fn usable_cached_token_needs_no_network() -> Result<(), Error> {
    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(chrono::Duration::hours(1), "r1")));
    let http = Arc::new(ScriptedHttpClient::new());
    let prompt = Arc::new(SilentPrompt::default());
    let (_stop, shutdown) = watch::channel(false);

    let client = manager(free_local_port(), store.clone(), http.clone(), prompt.clone())
        .authorize(shutdown)
        .await?;

    assert!(http.requests().is_empty());
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 0);
    assert_eq!(client.current_token().await.access_token, "cached-access");
    assert_eq!(store.save_count(), 0);
    Ok(())
}

#[tokio::test]
async fn expired_renewable_token_is_refreshed_once_and_persisted() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("token.json");
    let file_store = FileTokenStore::new(&path);
    file_store.save(&token_expiring_in(-chrono::Duration::hours(1), "r1"))?;

    let http = Arc::new(ScriptedHttpClient::new());
    http.push_post(Ok(json_response(200, token_json("fresh-access", None))));
    let prompt = Arc::new(SilentPrompt::default());
    let (_stop, shutdown) = watch::channel(false);

    let token = manager(free_local_port(), Arc::new(FileTokenStore::new(&path)), http.clone(), prompt.clone())
        .acquire_token(shutdown)
        .await?;

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].param("grant_type"), Some("refresh_token"));
    assert_eq!(requests[0].param("refresh_token"), Some("r1"));
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 0, "no interactive listener expected");

    assert_eq!(token.access_token, "fresh-access");
    let on_disk = FileTokenStore::new(&path).load()?;
    assert!(on_disk.expiry > Utc::now());
    assert_eq!(on_disk.refresh_token, "r1");
    Ok(())
}

#[tokio::test]
async fn failed_refresh_falls_back_to_interactive_flow() -> Result<(), Error> {
    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(-chrono::Duration::hours(1), "r1")));
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_post(Ok(json_response(400, json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."}))));
    http.push_post(Ok(json_response(200, token_json("granted-access", Some("r2")))));
    let browser = Arc::new(BrowserSimulator::approving("code-after-refresh-failure"));
    let (_stop, shutdown) = watch::channel(false);

    let token = manager(free_local_port(), store.clone(), http.clone(), browser.clone())
        .acquire_token(shutdown)
        .await?;

    let grants: Vec<_> = http
        .requests()
        .iter()
        .map(|r| r.param("grant_type").unwrap_or_default().to_string())
        .collect();
    assert_eq!(grants, vec!["refresh_token", "authorization_code"]);
    assert_eq!(browser.prompts().len(), 1);
    assert_eq!(token.refresh_token, "r2");
    assert_eq!(store.saved().map(|t| t.access_token), Some("granted-access".to_string()));
    Ok(())
}

#[tokio::test]
async fn first_run_consumes_exactly_one_code_and_writes_cache() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("token.json");
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_post(Ok(json_response(200, token_json("first-access", Some("first-refresh")))));
    let browser = Arc::new(BrowserSimulator::approving("one-time-code"));
    let (_stop, shutdown) = watch::channel(false);

    let port = free_local_port();
    let client = manager(port, Arc::new(FileTokenStore::new(&path)), http.clone(), browser.clone())
        .authorize(shutdown)
        .await?;

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    let exchange = &requests[0];
    assert_eq!(exchange.param("grant_type"), Some("authorization_code"));
    assert_eq!(exchange.param("code"), Some("one-time-code"));

    // PKCE: the verifier sent on exchange matches the challenge in the consent URL.
    let prompt = &browser.prompts()[0];
    let consent = Url::parse(&prompt.url)?;
    let challenge = consent
        .query_pairs()
        .find(|(k, _)| k == "code_challenge")
        .map(|(_, v)| v.into_owned());
    let verifier = exchange.param("code_verifier").unwrap_or_default();
    assert_eq!(challenge, Some(challenge_for(verifier)));

    let cached = FileTokenStore::new(&path).load()?;
    assert_eq!(cached.refresh_token, "first-refresh");
    assert_eq!(client.current_token().await, cached);

    // Listener is gone once the flow returns.
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
    Ok(())
}

#[tokio::test]
async fn forged_state_is_rejected_without_consuming_the_flow() -> Result<(), Error> {
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_post(Ok(json_response(200, token_json("a", Some("r")))));
    let browser = Arc::new(BrowserSimulator::approving("real-code").with_forged_state_first("not-the-state"));
    let (_stop, shutdown) = watch::channel(false);

    manager(free_local_port(), Arc::new(MemoryTokenStore::default()), http.clone(), browser)
        .acquire_token(shutdown)
        .await?;

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].param("code"), Some("real-code"));
    Ok(())
}

#[tokio::test]
async fn busy_callback_port_is_fatal() {
    let squatter = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = squatter.local_addr().unwrap().port();
    let http = Arc::new(ScriptedHttpClient::new());
    let prompt = Arc::new(SilentPrompt::default());
    let (_stop, shutdown) = watch::channel(false);

    let err = manager(port, Arc::new(MemoryTokenStore::default()), http.clone(), prompt.clone())
        .authorize(shutdown)
        .await
        .err()
        .expect("bind must fail");

    assert!(matches!(err, Error::Auth(_)));
    assert!(err.is_fatal());
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 0);
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn code_exchange_failure_is_fatal_and_releases_the_port() {
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_post(Ok(json_response(400, json!({"error": "invalid_grant"}))));
    let store = Arc::new(MemoryTokenStore::default());
    let browser = Arc::new(BrowserSimulator::approving("bad-code"));
    let (_stop, shutdown) = watch::channel(false);
    let port = free_local_port();

    let err = manager(port, store.clone(), http, browser)
        .acquire_token(shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(ref m) if m.contains("invalid_grant")));
    assert!(err.is_fatal());
    assert_eq!(store.save_count(), 0);
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn consent_wait_times_out() {
    let port = free_local_port();
    let manager = SessionManager::new(
        test_client_config(port),
        Arc::new(MemoryTokenStore::default()),
        Arc::new(ScriptedHttpClient::new()),
        Arc::new(SilentPrompt::default()),
    )
    .with_timeouts(Duration::from_millis(150), Duration::ZERO);
    let (_stop, shutdown) = watch::channel(false);

    let err = manager.acquire_token(shutdown).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn shutdown_cancels_pending_consent() {
    let manager = SessionManager::new(
        test_client_config(free_local_port()),
        Arc::new(MemoryTokenStore::default()),
        Arc::new(ScriptedHttpClient::new()),
        Arc::new(SilentPrompt::default()),
    );
    let (stop, shutdown) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = stop.send(true);
    });

    let err = manager.acquire_token(shutdown).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)));
}

#[tokio::test]
async fn corrupt_cache_triggers_interactive_flow() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("token.json");
    std::fs::write(&path, b"{ not json")?;

    let http = Arc::new(ScriptedHttpClient::new());
    http.push_post(Ok(json_response(200, token_json("a", Some("r")))));
    let browser = Arc::new(BrowserSimulator::approving("c"));
    let (_stop, shutdown) = watch::channel(false);

    manager(free_local_port(), Arc::new(FileTokenStore::new(&path)), http, browser.clone())
        .acquire_token(shutdown)
        .await?;

    assert_eq!(browser.prompts().len(), 1);
    assert_eq!(FileTokenStore::new(&path).load()?.refresh_token, "r");
    Ok(())
}

#[tokio::test]
async fn shutdown_interrupts_a_stalled_refresh() {
    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(-chrono::Duration::hours(1), "r1")));
    let http = Arc::new(ScriptedHttpClient::new());
    http.stall_posts(1);
    let prompt = Arc::new(SilentPrompt::default());
    let (stop, shutdown) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = stop.send(true);
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        manager(free_local_port(), store, http.clone(), prompt.clone()).acquire_token(shutdown),
    )
    .await
    .expect("acquire_token must observe shutdown");

    assert!(matches!(result, Err(Error::Cancelled(_))));
    assert_eq!(http.count("POST"), 1);
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn timed_out_refresh_falls_back_to_interactive_flow() -> Result<(), Error> {
    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(-chrono::Duration::hours(1), "r1")));
    let http = Arc::new(ScriptedHttpClient::new());
    http.stall_posts(1);
    http.push_post(Ok(json_response(200, token_json("after-timeout", Some("r2")))));
    let browser = Arc::new(BrowserSimulator::approving("late-code"));
    let (_stop, shutdown) = watch::channel(false);

    let token = manager(free_local_port(), store.clone(), http.clone(), browser.clone())
        .with_exchange_timeout(Duration::from_millis(50))
        .acquire_token(shutdown)
        .await?;

    let grants: Vec<_> = http
        .requests()
        .iter()
        .map(|r| r.param("grant_type").unwrap_or_default().to_string())
        .collect();
    assert_eq!(grants, vec!["refresh_token", "authorization_code"]);
    assert_eq!(browser.prompts().len(), 1);
    assert_eq!(token.access_token, "after-timeout");
    Ok(())
}

#[tokio::test]
async fn shutdown_interrupts_a_stalled_code_exchange() {
    let http = Arc::new(ScriptedHttpClient::new());
    http.stall_posts(1);
    let browser = Arc::new(BrowserSimulator::approving("code"));
    let (stop, shutdown) = watch::channel(false);
    let port = free_local_port();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = stop.send(true);
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        manager(port, Arc::new(MemoryTokenStore::default()), http.clone(), browser).acquire_token(shutdown),
    )
    .await
    .expect("acquire_token must observe shutdown");

    assert!(matches!(result, Err(Error::Cancelled(_))));
    assert_eq!(http.count("POST"), 1);
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

/// Saves take a while, like a cache on a slow or network-mounted disk.
struct SlowSaveStore {
    inner: MemoryTokenStore,
    delay: Duration,
}

impl TokenStore for SlowSaveStore {
    fn load(&self) -> Result<liveframe_core::models::Token, Error> {
        self.inner.load()
    }

    fn save(&self, token: &liveframe_core::models::Token) -> Result<(), Error> {
        std::thread::sleep(self.delay);
        self.inner.save(token)
    }
}

#[tokio::test(flavor = "current_thread")]
async fn slow_token_save_does_not_stall_the_runtime() -> Result<(), Error> {
    let store = Arc::new(SlowSaveStore {
        inner: MemoryTokenStore::with_token(token_expiring_in(-chrono::Duration::hours(1), "r1")),
        delay: Duration::from_millis(300),
    });
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_post(Ok(json_response(200, token_json("fresh-access", None))));
    let prompt = Arc::new(SilentPrompt::default());
    let (_stop, shutdown) = watch::channel(false);

    let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let ticker = tokio::spawn({
        let ticks = ticks.clone();
        async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let token = manager(free_local_port(), store.clone(), http, prompt)
        .acquire_token(shutdown)
        .await?;
    ticker.abort();

    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(store.inner.save_count(), 1);
    // A save on the runtime thread would have frozen the ticker for the whole delay.
    assert!(ticks.load(Ordering::SeqCst) >= 5, "ticker only ran {} times", ticks.load(Ordering::SeqCst));
    Ok(())
}
