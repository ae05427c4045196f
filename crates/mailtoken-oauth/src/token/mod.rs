//! `OAuth2` token types and the persisted credential record.

use crate::error::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Seconds before `expires_at` at which a token is already treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Provider error code signalling that the user has not finished the device flow.
pub const AUTHORIZATION_PENDING: &str = "authorization_pending";

/// Persisted `OAuth2` credential.
///
/// `extra` carries provider fields such as `token_type` and `scope` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Bearer token handed to the mail client.
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens.
    pub refresh_token: String,
    /// Validity in seconds reported when the access token was issued.
    pub expires_in: u64,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
    /// Provider-returned fields passed through opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// Builds the record for a first issuance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the response carries no refresh
    /// token or an out-of-range `expires_in`.
    pub fn issue(response: TokenResponse) -> Result<Self> {
        Self::issue_at(response, Utc::now())
    }

    /// Builds the record for a first issuance at `now`.
    ///
    /// # Errors
    ///
    /// See [`CredentialRecord::issue`].
    pub fn issue_at(response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let refresh_token = response
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::InvalidResponse("missing refresh_token".into()))?;

        Ok(Self {
            expires_at: expiry_from(now, response.expires_in)?,
            access_token: response.access_token,
            refresh_token,
            expires_in: response.expires_in,
            extra: response.extra,
        })
    }

    /// Builds the record that replaces `self` after a refresh.
    ///
    /// The stored refresh token is kept unless the response carries a new one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if `expires_in` is out of range.
    pub fn refreshed(&self, response: TokenResponse) -> Result<Self> {
        self.refreshed_at(response, Utc::now())
    }

    /// Builds the refreshed record at `now`.
    ///
    /// # Errors
    ///
    /// See [`CredentialRecord::refreshed`].
    pub fn refreshed_at(&self, response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let refresh_token = response
            .refresh_token
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| self.refresh_token.clone());

        Ok(Self {
            expires_at: expiry_from(now, response.expires_in)?,
            access_token: response.access_token,
            refresh_token,
            expires_in: response.expires_in,
            extra: response.extra,
        })
    }

    /// Checks if the access token must be refreshed (with 60 second buffer).
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    /// Checks if the access token must be refreshed as of `now`.
    #[must_use]
    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now + TimeDelta::seconds(EXPIRY_MARGIN_SECS)
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in: u64) -> Result<DateTime<Utc>> {
    i64::try_from(expires_in)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| Error::InvalidResponse(format!("expires_in out of range: {expires_in}")))
}

/// Token response from `OAuth2` server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Expires in seconds.
    pub expires_in: u64,
    /// Refresh token; always sent on first issuance, optional on refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Remaining fields (`token_type`, `scope`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error response from `OAuth2` server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Error description; absent and `null` both read as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub error_description: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ErrorResponse {
    /// Returns true for the device flow's "keep polling" signal.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.error == AUTHORIZATION_PENDING
    }

    /// Converts to an Error.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::provider(self.error, self.error_description)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> TokenResponse {
        serde_json::from_value(value).unwrap()
    }

    fn stored(expires_at: DateTime<Utc>) -> CredentialRecord {
        CredentialRecord {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            expires_in: 3600,
            expires_at,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_issue_computes_expiry() {
        let now = Utc::now();
        let record = CredentialRecord::issue_at(
            response(json!({
                "access_token": "A1",
                "refresh_token": "R1",
                "expires_in": 3599,
                "token_type": "Bearer",
                "scope": "https://mail.google.com/"
            })),
            now,
        )
        .unwrap();

        assert_eq!(record.access_token, "A1");
        assert_eq!(record.refresh_token, "R1");
        assert_eq!(record.expires_at, now + TimeDelta::seconds(3599));
        assert_eq!(record.extra["token_type"], "Bearer");
        assert_eq!(record.extra["scope"], "https://mail.google.com/");
    }

    #[test]
    fn test_issue_requires_refresh_token() {
        let err = CredentialRecord::issue(response(json!({
            "access_token": "A1",
            "expires_in": 3600
        })))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));

        let err = CredentialRecord::issue(response(json!({
            "access_token": "A1",
            "refresh_token": "",
            "expires_in": 3600
        })))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_refresh_keeps_stored_refresh_token() {
        let now = Utc::now();
        let old = stored(now - TimeDelta::seconds(10));
        let new = old
            .refreshed_at(
                response(json!({"access_token": "A2", "expires_in": 3600})),
                now,
            )
            .unwrap();

        assert_eq!(new.access_token, "A2");
        assert_eq!(new.refresh_token, "R1");
        assert_eq!(new.expires_at, now + TimeDelta::seconds(3600));
    }

    #[test]
    fn test_refresh_takes_rotated_refresh_token() {
        let old = stored(Utc::now());
        let new = old
            .refreshed(response(json!({
                "access_token": "A2",
                "refresh_token": "R2",
                "expires_in": 3600
            })))
            .unwrap();
        assert_eq!(new.refresh_token, "R2");

        let blank = old
            .refreshed(response(json!({
                "access_token": "A3",
                "refresh_token": "",
                "expires_in": 3600
            })))
            .unwrap();
        assert_eq!(blank.refresh_token, "R1");
    }

    #[test]
    fn test_expiry_margin() {
        let now = Utc::now();
        assert!(stored(now - TimeDelta::seconds(10)).needs_refresh_at(now));
        assert!(stored(now + TimeDelta::seconds(59)).needs_refresh_at(now));
        assert!(!stored(now + TimeDelta::seconds(60)).needs_refresh_at(now));
        assert!(!stored(now + TimeDelta::seconds(3600)).needs_refresh_at(now));
    }

    #[test]
    fn test_expires_in_out_of_range() {
        let err = CredentialRecord::issue(response(json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "expires_in": u64::MAX
        })))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_error_response_pending() {
        let pending: ErrorResponse =
            serde_json::from_str(r#"{"error": "authorization_pending"}"#).unwrap();
        assert!(pending.is_pending());
        assert_eq!(pending.error_description, "");

        let null_description: ErrorResponse = serde_json::from_str(
            r#"{"error": "authorization_pending", "error_description": null}"#,
        )
        .unwrap();
        assert!(null_description.is_pending());
        assert_eq!(null_description.error_description, "");

        let denied: ErrorResponse = serde_json::from_str(
            r#"{"error": "access_denied", "error_description": "The user denied access"}"#,
        )
        .unwrap();
        assert!(!denied.is_pending());
        assert_eq!(
            denied.into_error().to_string(),
            "OAuth2 error: access_denied - The user denied access"
        );
    }
}
