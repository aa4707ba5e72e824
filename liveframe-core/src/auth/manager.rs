// liveframe-core/src/auth/manager.rs
//
// Produces the process-wide AuthorizedClient: cached token, then one refresh
// attempt, then the interactive consent flow over the loopback listener.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::Error;
use crate::auth::callback_server::CallbackServer;
use crate::auth::client::AuthorizedClient;
use crate::auth::persist_token;
use crate::auth::pkce::{new_csrf_state, PkcePair};
use crate::auth::token_endpoint::{exchange_code, exchange_refresh_token};
use crate::http::HttpClient;
use crate::models::{AuthenticationPrompt, ClientConfig, Token};
use crate::tasks::shutdown_signalled;
use crate::traits::{AuthenticationHandler, TokenStore};

const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CALLBACK_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SessionManager {
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    http: Arc<dyn HttpClient>,
    prompt: Arc<dyn AuthenticationHandler>,
    consent_timeout: Duration,
    callback_grace: Duration,
    exchange_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        http: Arc<dyn HttpClient>,
        prompt: Arc<dyn AuthenticationHandler>,
    ) -> Self {
        Self {
            config,
            store,
            http,
            prompt,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
            callback_grace: DEFAULT_CALLBACK_GRACE,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, consent_timeout: Duration, callback_grace: Duration) -> Self {
        self.consent_timeout = consent_timeout;
        self.callback_grace = callback_grace;
        self
    }

    /// Upper bound on each call to the token endpoint.
    pub fn with_exchange_timeout(mut self, exchange_timeout: Duration) -> Self {
        self.exchange_timeout = exchange_timeout;
        self
    }

    /// Runs once at startup. `shutdown` aborts a pending consent wait.
    pub async fn authorize(&self, shutdown: watch::Receiver<bool>) -> Result<Arc<AuthorizedClient>, Error> {
        let token = self.acquire_token(shutdown).await?;
        Ok(Arc::new(AuthorizedClient::new(
            self.config.clone(),
            token,
            Arc::clone(&self.store),
            Arc::clone(&self.http),
        )))
    }

    pub async fn acquire_token(&self, mut shutdown: watch::Receiver<bool>) -> Result<Token, Error> {
        match self.store.load() {
            Ok(token) if token.is_usable() => {
                info!("Cached token is valid until {}", token.expiry);
                return Ok(token);
            }
            Ok(token) if token.is_renewable() => {
                info!("Cached token expired at {}, refreshing...", token.expiry);
                let refresh = exchange_refresh_token(self.http.as_ref(), &self.config, &token.refresh_token);
                match self.bounded_exchange(refresh, &mut shutdown).await? {
                    Ok(new_token) => {
                        persist_token(&self.store, &new_token).await;
                        info!("Token refreshed successfully");
                        return Ok(new_token);
                    }
                    Err(e) => {
                        warn!("Token refresh failed ({}); starting interactive authorization", e);
                    }
                }
            }
            Ok(_) => info!("Cached token expired and cannot be renewed"),
            Err(Error::NotFound(_)) => info!("No cached token found"),
            Err(e) => warn!("Ignoring unreadable token cache: {}", e),
        }

        self.interactive_grant(shutdown).await
    }

    /// The authorization-code flow. Every exit path closes the listener.
    pub async fn interactive_grant(&self, mut shutdown: watch::Receiver<bool>) -> Result<Token, Error> {
        info!("Starting OAuth authentication flow...");
        let csrf_state = new_csrf_state();
        let pkce = PkcePair::generate();

        let mut server = CallbackServer::bind(&self.config.redirect_url, csrf_state.clone())?;

        let prompt = AuthenticationPrompt {
            url: build_auth_url(&self.config, &csrf_state, &pkce.challenge),
            redirect_url: self.config.redirect_url.to_string(),
        };
        self.prompt.handle_prompt(prompt).await?;

        debug!("Waiting for authorization callback (timeout: {:?})...", self.consent_timeout);
        let waited = tokio::select! {
            res = server.wait_for_code() => res,
            _ = tokio::time::sleep(self.consent_timeout) => {
                Err(Error::Auth(format!("no authorization within {:?}", self.consent_timeout)))
            }
            _ = shutdown_signalled(&mut shutdown) => {
                Err(Error::Cancelled("shutdown requested during authorization".into()))
            }
        };

        let callback = match waited {
            Ok(cb) => cb,
            Err(e) => {
                server.shutdown(Duration::ZERO).await;
                return Err(e);
            }
        };

        info!("Exchanging authorization code for access token...");
        let exchange = exchange_code(self.http.as_ref(), &self.config, &callback.code, &pkce.verifier);
        let token = match self.bounded_exchange(exchange, &mut shutdown).await.and_then(|r| r) {
            Ok(t) => t,
            Err(e) => {
                server.shutdown(Duration::ZERO).await;
                return Err(e);
            }
        };

        if !token.is_renewable() {
            warn!("Token endpoint issued no refresh token; re-authorization will be needed after expiry");
        }
        persist_token(&self.store, &token).await;
        server.shutdown(self.callback_grace).await;

        info!("OAuth flow completed successfully");
        Ok(token)
    }

    /// Runs one token-endpoint call under the exchange timeout. The outer
    /// `Err` is shutdown only; a timeout comes back as the inner error.
    async fn bounded_exchange<F>(
        &self,
        call: F,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Result<Token, Error>, Error>
    where
        F: Future<Output = Result<Token, Error>>,
    {
        tokio::select! {
            biased;
            _ = shutdown_signalled(shutdown) => {
                Err(Error::Cancelled("shutdown requested during token exchange".into()))
            }
            res = timeout(self.exchange_timeout, call) => Ok(res.unwrap_or_else(|e| Err(Error::Timeout(e)))),
        }
    }

}

/// Consent URL requesting offline access and forced re-consent, so a refresh
/// token is issued even when the user has authorized before.
pub fn build_auth_url(config: &ClientConfig, state: &str, code_challenge: &str) -> String {
    let base = config.auth_endpoint.as_str();
    let sep = if config.auth_endpoint.query().is_some() { '&' } else { '?' };
    format!(
        "{base}{sep}response_type=code&client_id={cid}&redirect_uri={redir}&scope={scope}\
         &state={st}&access_type=offline&prompt=consent\
         &code_challenge={challenge}&code_challenge_method=S256",
        cid = urlencoding::encode(&config.client_id),
        redir = urlencoding::encode(config.redirect_url.as_str()),
        scope = urlencoding::encode(&config.scope_string()),
        st = urlencoding::encode(state),
        challenge = urlencoding::encode(code_challenge),
    )
}
