use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::get,
    extract::{Query, State},
    response::Html,
    http::StatusCode,
};
use axum_server::Handle;
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use url::{Host, Url};

use crate::Error;

/// Structure to hold the final result from the OAuth callback.
#[derive(Debug, Clone)]
pub struct CallbackResult {
    pub code: String,
    pub state: Option<String>,
}

/// Query string we expect from the consent page: ?code=xxx&state=...
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

type DoneSender = oneshot::Sender<Result<CallbackResult, Error>>;

/// Shared state for the Axum callback route.
#[derive(Clone)]
struct CallbackServerState {
    expected_state: Arc<String>,
    /// Taken by the first request that settles the flow.
    done_tx: Arc<Mutex<Option<DoneSender>>>,
}

/// Longest time open connections get to finish once the grace delay is over.
const CLOSE_DRAIN: Duration = Duration::from_millis(250);

/// A single-use loopback listener for the redirect of the consent page.
///
/// The listening sockets are closed by [`CallbackServer::shutdown`], or by `Drop`
/// on any other exit path.
pub struct CallbackServer {
    addrs: Vec<SocketAddr>,
    handles: Vec<Handle>,
    done_rx: Option<oneshot::Receiver<Result<CallbackResult, Error>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CallbackServer {
    /// Listens on the redirect URL's host and port and serves its path. A
    /// `localhost` redirect binds `127.0.0.1` and, when available, `[::1]`,
    /// since browsers may resolve either. A busy port is an authorization error.
    pub fn bind(redirect_url: &Url, expected_state: String) -> Result<Self, Error> {
        let port = redirect_url
            .port_or_known_default()
            .ok_or_else(|| Error::Config(format!("redirect url {redirect_url} has no port")))?;
        let path = match redirect_url.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };

        let (done_tx, done_rx) = oneshot::channel();
        let state = CallbackServerState {
            expected_state: Arc::new(expected_state),
            done_tx: Arc::new(Mutex::new(Some(done_tx))),
        };
        let app = Router::new()
            .route(&path, get(handle_callback))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        let mut server = Self {
            addrs: Vec::new(),
            handles: Vec::new(),
            done_rx: Some(done_rx),
            tasks: Vec::new(),
        };
        for (ip, required) in listen_addrs(redirect_url, port) {
            let listener = match TcpListener::bind(SocketAddr::new(ip, port)) {
                Ok(l) => l,
                Err(e) if required => {
                    return Err(Error::Auth(format!("Port {} not available: {}", port, e)));
                }
                Err(e) => {
                    debug!("Skipping callback listener on {}: {}", ip, e);
                    continue;
                }
            };
            listener.set_nonblocking(true)?;
            let addr = listener.local_addr()?;

            let handle = Handle::new();
            let serving = axum_server::from_tcp(listener)
                .handle(handle.clone())
                .serve(app.clone().into_make_service());

            info!("OAuth callback server listening on http://{}{}", addr, path);
            server.tasks.push(tokio::spawn(async move {
                if let Err(e) = serving.await {
                    error!("Callback server error: {}", e);
                }
                info!("Callback server on {} shut down.", addr);
            }));
            server.handles.push(handle);
            server.addrs.push(addr);
        }

        Ok(server)
    }

    /// The primary listening address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addrs[0]
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Resolves once the first valid callback (or a provider error) arrives.
    pub async fn wait_for_code(&mut self) -> Result<CallbackResult, Error> {
        let rx = self
            .done_rx
            .take()
            .ok_or_else(|| Error::Auth("authorization code already consumed".into()))?;
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Auth("callback server stopped before receiving a code".into())),
        }
    }

    /// Waits `grace` so the confirmation page reaches the browser, then closes
    /// the sockets and waits for the server tasks to finish.
    pub async fn shutdown(mut self, grace: Duration) {
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }
        let drain = grace.min(CLOSE_DRAIN);
        for handle in &self.handles {
            handle.graceful_shutdown(Some(drain));
        }
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Callback server task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            debug!("Callback server dropped; closing listeners");
            for handle in &self.handles {
                handle.shutdown();
            }
        }
    }
}

/// Addresses to listen on, each flagged whether failing to bind is fatal.
fn listen_addrs(redirect_url: &Url, port: u16) -> Vec<(IpAddr, bool)> {
    let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
    match redirect_url.host() {
        Some(Host::Ipv4(ip)) => vec![(IpAddr::V4(ip), true)],
        Some(Host::Ipv6(ip)) => vec![(IpAddr::V6(ip), true)],
        // An ephemeral port would differ per family, so only one listener then.
        Some(Host::Domain(d)) if d.eq_ignore_ascii_case("localhost") && port != 0 => {
            vec![(v4, true), (IpAddr::V6(Ipv6Addr::LOCALHOST), false)]
        }
        Some(Host::Domain(d)) if d.eq_ignore_ascii_case("localhost") => vec![(v4, true)],
        other => {
            warn!("Redirect host {:?} is not loopback; listening on {} instead", other, v4);
            vec![(v4, true)]
        }
    }
}

async fn handle_callback(
    State(state): State<CallbackServerState>,
    Query(query): Query<AuthQuery>,
) -> (StatusCode, Html<String>) {
    if let Some(err) = query.error.as_ref() {
        let desc = query.error_description.clone().unwrap_or_default();
        warn!("Consent page returned an error: {} {}", err, desc);
        if let Some(tx) = state.done_tx.lock().await.take() {
            let _ = tx.send(Err(Error::Auth(format!("authorization denied: {} {}", err, desc))));
        }
        let msg = format!("<h2>OAuth Error</h2><p>{}</p><p>{}</p>", err, desc);
        return (StatusCode::OK, Html(msg));
    }

    let Some(code) = query.code.clone() else {
        let msg = "<h2>Missing 'code' query param</h2><p>Check logs or try again.</p>";
        return (StatusCode::BAD_REQUEST, Html(msg.to_string()));
    };

    if query.state.as_deref() != Some(state.expected_state.as_str()) {
        warn!("Rejecting callback with mismatched state parameter");
        let msg = "<h2>Invalid state parameter</h2><p>Restart the authorization from liveframe.</p>";
        return (StatusCode::BAD_REQUEST, Html(msg.to_string()));
    }

    match state.done_tx.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(Ok(CallbackResult {
                code,
                state: query.state.clone(),
            }));
            let success = r#"
<h1>Authorization Successful</h1>
<p>You can close this window now.</p>
"#;
            (StatusCode::OK, Html(success.to_string()))
        }
        None => {
            let msg = "<h2>Authorization already completed</h2><p>You can close this window.</p>";
            (StatusCode::OK, Html(msg.to_string()))
        }
    }
}
