//! Runtime settings for the session manager and the polling pipeline.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::Error;
use crate::models::{ClientConfig, YOUTUBE_READONLY_SCOPE};
use crate::tasks::status_poller::PollerSettings;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ERROR_COOLDOWN_SECS: u64 = 1;
const DEFAULT_CONSENT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CALLBACK_GRACE_SECS: u64 = 2;

const CONFIG_DIR_NAME: &str = ".liveframe";
const SECRET_FILE_NAME: &str = "secret.json";
const TOKEN_FILE_NAME: &str = "token.json";

/// `~/.liveframe`, or a relative `.liveframe` if no home directory is known.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME))
}

#[derive(Debug, Clone)]
pub struct LiveframeConfig {
    pub secret_path: PathBuf,
    pub token_path: PathBuf,
    /// Overrides the redirect URL from the secret file.
    pub redirect_url: Option<String>,
    pub scopes: Vec<String>,
    pub poll_interval: Duration,
    pub call_timeout: Duration,
    pub error_cooldown: Duration,
    pub consent_timeout: Duration,
    /// Delay between answering the callback and closing the listener.
    pub callback_grace: Duration,
    pub open_browser: bool,
}

impl Default for LiveframeConfig {
    fn default() -> Self {
        let dir = default_config_dir();
        Self {
            secret_path: dir.join(SECRET_FILE_NAME),
            token_path: dir.join(TOKEN_FILE_NAME),
            redirect_url: None,
            scopes: vec![YOUTUBE_READONLY_SCOPE.to_string()],
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            error_cooldown: Duration::from_secs(DEFAULT_ERROR_COOLDOWN_SECS),
            consent_timeout: Duration::from_secs(DEFAULT_CONSENT_TIMEOUT_SECS),
            callback_grace: Duration::from_secs(DEFAULT_CALLBACK_GRACE_SECS),
            open_browser: true,
        }
    }
}

impl LiveframeConfig {
    /// Reads and parses the secret file. Any failure here is a configuration
    /// error and is not retried.
    pub fn load_client_config(&self) -> Result<ClientConfig, Error> {
        debug!("Loading client secrets from {}", self.secret_path.display());
        let contents = fs::read_to_string(&self.secret_path).map_err(|e| {
            Error::Config(format!(
                "cannot read secret file {}: {e}",
                self.secret_path.display()
            ))
        })?;
        ClientConfig::from_secret_json(&contents, self.redirect_url.as_deref(), self.scopes.clone())
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings::new(self.poll_interval, self.call_timeout, self.error_cooldown)
    }
}
