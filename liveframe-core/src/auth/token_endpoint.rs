//! The two grants we send to the provider's token endpoint.

use chrono::Utc;
use tracing::debug;

use crate::Error;
use crate::http::{HttpClient, HttpResponse};
use crate::models::{ClientConfig, Token, TokenErrorResponse, TokenResponse};

/// Trades an authorization code (plus PKCE verifier) for a token pair.
pub async fn exchange_code(
    http: &dyn HttpClient,
    config: &ClientConfig,
    code: &str,
    pkce_verifier: &str,
) -> Result<Token, Error> {
    let params = vec![
        ("client_id".to_string(), config.client_id.clone()),
        ("client_secret".to_string(), config.client_secret.clone()),
        ("code".to_string(), code.to_string()),
        ("code_verifier".to_string(), pkce_verifier.to_string()),
        ("grant_type".to_string(), "authorization_code".to_string()),
        ("redirect_uri".to_string(), config.redirect_url.to_string()),
    ];

    debug!("Exchanging authorization code at {}", config.token_endpoint);
    let resp = http
        .post_form(config.token_endpoint.to_string(), params)
        .await
        .map_err(|e| Error::Auth(format!("HTTP error exchanging code: {e}")))?;

    let parsed = parse_token_response(resp, "authorization_code")?;
    Ok(parsed.into_token(Utc::now(), None))
}

/// Mints a new access token from `refresh_token`. Makes exactly one request.
pub async fn exchange_refresh_token(
    http: &dyn HttpClient,
    config: &ClientConfig,
    refresh_token: &str,
) -> Result<Token, Error> {
    let params = vec![
        ("client_id".to_string(), config.client_id.clone()),
        ("client_secret".to_string(), config.client_secret.clone()),
        ("refresh_token".to_string(), refresh_token.to_string()),
        ("grant_type".to_string(), "refresh_token".to_string()),
    ];

    debug!("Refreshing access token at {}", config.token_endpoint);
    let resp = http
        .post_form(config.token_endpoint.to_string(), params)
        .await
        .map_err(|e| Error::Auth(format!("HTTP error refreshing token: {e}")))?;

    let parsed = parse_token_response(resp, "refresh_token")?;
    Ok(parsed.into_token(Utc::now(), Some(refresh_token)))
}

fn parse_token_response(resp: HttpResponse, grant: &str) -> Result<TokenResponse, Error> {
    if !resp.is_success() {
        let detail = match serde_json::from_str::<TokenErrorResponse>(&resp.body) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{} ({})", err.error, desc),
                None => err.error,
            },
            Err(_) => format!("HTTP {}", resp.status),
        };
        return Err(Error::Auth(format!("token endpoint rejected {grant} grant: {detail}")));
    }

    serde_json::from_str::<TokenResponse>(&resp.body)
        .map_err(|e| Error::Auth(format!("Parse error on {grant} token JSON: {e}")))
}
