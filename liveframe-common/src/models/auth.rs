use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080/oauth2callback";
pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Access lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Everything needed to talk to the provider's OAuth endpoints.
/// Built once from the secret file and never mutated afterwards.
#[derive(Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_endpoint: Url,
    pub token_endpoint: Url,
    pub redirect_url: Url,
    pub scopes: Vec<String>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_endpoint", &self.auth_endpoint.as_str())
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("redirect_url", &self.redirect_url.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// On-disk layout of the provider's credential export:
/// `{"installed": {...}}` for desktop clients, `{"web": {...}}` for web ones.
#[derive(Debug, Deserialize)]
pub struct SecretFile {
    pub installed: Option<SecretSection>,
    pub web: Option<SecretSection>,
}

#[derive(Debug, Deserialize)]
pub struct SecretSection {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl ClientConfig {
    /// Parses the secret file contents.
    ///
    /// `redirect_override` wins over the file's `redirect_uris`; without it the
    /// first loopback entry is used, then [`DEFAULT_REDIRECT_URL`].
    pub fn from_secret_json(
        json: &str,
        redirect_override: Option<&str>,
        scopes: Vec<String>,
    ) -> Result<Self, Error> {
        let file: SecretFile = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("unparseable secret file: {e}")))?;

        let section = file
            .installed
            .or(file.web)
            .ok_or_else(|| Error::Config("secret file has neither 'installed' nor 'web' section".into()))?;

        if section.client_id.trim().is_empty() {
            return Err(Error::Config("secret file has an empty client_id".into()));
        }

        let redirect = match redirect_override {
            Some(r) => r.to_string(),
            None => section
                .redirect_uris
                .iter()
                .find(|u| u.starts_with("http://localhost") || u.starts_with("http://127.0.0.1"))
                .cloned()
                .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string()),
        };

        let parse = |what: &str, raw: &str| {
            Url::parse(raw).map_err(|e| Error::Config(format!("invalid {what} '{raw}': {e}")))
        };

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            auth_endpoint: parse("auth_uri", &section.auth_uri)?,
            token_endpoint: parse("token_uri", &section.token_uri)?,
            redirect_url: parse("redirect url", &redirect)?,
            scopes,
        })
    }

    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// The access/refresh pair, exactly as persisted in the token cache.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "tokenType")]
    pub token_type: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.is_renewable())
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl Token {
    /// Usable iff the expiry lies in the future.
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }

    /// Renewable iff there is a refresh token to trade in.
    pub fn is_renewable(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// True when the token is expired or will be within `leeway`.
    pub fn expires_within(&self, leeway: Duration) -> bool {
        !self.is_usable_at(Utc::now() + leeway)
    }
}

/// JSON returned by the token endpoint for both grant types.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Converts into a [`Token`] anchored at `now`. A refresh response usually
    /// omits `refresh_token`; `previous_refresh` is carried over in that case.
    pub fn into_token(self, now: DateTime<Utc>, previous_refresh: Option<&str>) -> Token {
        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let refresh_token = self
            .refresh_token
            .filter(|r| !r.is_empty())
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();

        Token {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token,
            expiry: now + Duration::seconds(expires_in),
        }
    }
}

/// `{"error": "...", "error_description": "..."}` from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// What the user has to act on to finish the interactive grant.
#[derive(Debug, Clone)]
pub struct AuthenticationPrompt {
    pub url: String,
    pub redirect_url: String,
}
