use std::fmt;

use serde::Deserialize;
use titvo_core::{Credentials, TitvoError};

/// Bearer token obtained once per run.
///
/// `Debug` and `Display` never print the token itself.
///
/// # Examples
///
/// ```
/// use titvo_bitbucket::auth::AccessToken;
///
/// let token = AccessToken::new("abc123");
/// assert_eq!(token.secret(), "abc123");
/// assert!(!format!("{token:?}").contains("abc123"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange client credentials for a bearer token.
///
/// Posts `grant_type=client_credentials` to `{oauth_url}/access_token`.
///
/// # Errors
///
/// Returns [`TitvoError::Auth`] if the request fails, the platform rejects
/// the credentials, or the response carries no token.
pub async fn fetch_access_token(
    http: &reqwest::Client,
    oauth_url: &str,
    credentials: &Credentials,
) -> Result<AccessToken, TitvoError> {
    let url = format!("{}/access_token", oauth_url.trim_end_matches('/'));
    tracing::debug!(%url, client_id = %credentials.client_id, "requesting access token");

    let response = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| TitvoError::Auth(format!("token request failed: {e}")))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| TitvoError::Auth(format!("failed to read token response: {e}")))?;

    parse_token_response(status, &body)
}

/// Interpret the token endpoint's answer.
///
/// # Errors
///
/// Returns [`TitvoError::Auth`] for non-2xx statuses, unparseable bodies,
/// and bodies without a non-empty `access_token`.
///
/// # Examples
///
/// ```
/// use titvo_bitbucket::auth::parse_token_response;
///
/// let token = parse_token_response(200, r#"{"access_token":"t0k","expires_in":7200}"#).unwrap();
/// assert_eq!(token.secret(), "t0k");
///
/// assert!(parse_token_response(200, r#"{"scopes":"repository"}"#).is_err());
/// ```
pub fn parse_token_response(status: u16, body: &str) -> Result<AccessToken, TitvoError> {
    let parsed: Option<TokenResponse> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let reason = parsed
            .as_ref()
            .and_then(|r| r.error_description.clone().or_else(|| r.error.clone()))
            .unwrap_or_else(|| body.to_string());
        return Err(TitvoError::Auth(format!("HTTP {status}: {reason}")));
    }

    let parsed = parsed
        .ok_or_else(|| TitvoError::Auth(format!("unexpected token response: {body}")))?;
    match parsed.access_token {
        Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
        _ => Err(TitvoError::Auth("response did not include an access token".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_credentials_surface_description() {
        let body = r#"{"error":"invalid_client","error_description":"Invalid OAuth client credentials"}"#;
        let err = parse_token_response(400, body).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("Invalid OAuth client credentials"));
    }

    #[test]
    fn non_json_error_body_is_kept() {
        let err = parse_token_response(502, "Bad Gateway").unwrap_err();
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = parse_token_response(200, r#"{"access_token":""}"#).unwrap_err();
        assert!(matches!(err, TitvoError::Auth(_)));
    }

    #[test]
    fn garbage_success_body_is_rejected() {
        assert!(parse_token_response(200, "<html>").is_err());
    }
}
