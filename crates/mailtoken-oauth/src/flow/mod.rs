//! `OAuth2` grant client and the device authorization flow.

mod device;

pub use device::{DeviceAuthorization, DeviceFlow, print_instructions};

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::token::{ErrorResponse, TokenResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// Grant type for exchanging a device code (RFC 8628).
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Outcome of one device-code exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceExchange {
    /// User completed authorization; tokens issued.
    Success(TokenResponse),
    /// User has not finished yet; poll again after the interval.
    Pending,
    /// Any other provider error. Never retried.
    Fatal(ErrorResponse),
}

/// Decoded provider reply.
enum Reply<T> {
    Granted(T),
    Rejected(ErrorResponse),
}

/// Client identity plus provider endpoints; performs the token grants.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Requests a device code and user code from the provider.
    ///
    /// An empty `scope` is left out of the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] on a non-success status, or a transport
    /// error if the request fails.
    pub async fn request_device_code(&self, scope: &str) -> Result<DeviceAuthorization> {
        let mut params = HashMap::new();
        params.insert("client_id", self.client_id.as_str());
        if !scope.is_empty() {
            params.insert("scope", scope);
        }

        match self.post_form(&self.provider.device_auth_url, &params).await? {
            Reply::Granted(auth) => Ok(auth),
            Reply::Rejected(error) => Err(error.into_error()),
        }
    }

    /// Exchanges a device code for tokens (one poll).
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures or an undecodable
    /// success body; provider rejections come back as
    /// [`DeviceExchange::Fatal`].
    pub async fn exchange_device_code(&self, device_code: &str) -> Result<DeviceExchange> {
        let mut params = HashMap::new();
        params.insert("grant_type", DEVICE_CODE_GRANT);
        params.insert("device_code", device_code);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        Ok(
            match self.post_form(&self.provider.token_url, &params).await? {
                Reply::Granted(token) => DeviceExchange::Success(token),
                Reply::Rejected(error) if error.is_pending() => DeviceExchange::Pending,
                Reply::Rejected(error) => DeviceExchange::Fatal(error),
            },
        )
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the provider rejects the refresh token
    /// (revoked or expired), or a transport error.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        match self.post_form(&self.provider.token_url, &params).await? {
            Reply::Granted(token) => Ok(token),
            Reply::Rejected(error) => Err(error.into_error()),
        }
    }

    /// Posts a form and decodes the JSON reply.
    ///
    /// Error bodies that are not JSON become an error named after the HTTP
    /// status. Some providers answer pending polls with `200` and an
    /// `error` object, so a success body that decodes as an error is
    /// treated as a rejection too.
    async fn post_form<T: DeserializeOwned>(
        &self,
        url: &Url,
        params: &HashMap<&str, &str>,
    ) -> Result<Reply<T>> {
        debug!(%url, "POST");
        let response = self.http_client.post(url.clone()).form(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return match serde_json::from_str::<T>(&body) {
                Ok(value) => Ok(Reply::Granted(value)),
                Err(err) => match serde_json::from_str::<ErrorResponse>(&body) {
                    Ok(error) => Ok(Reply::Rejected(error)),
                    Err(_) => Err(Error::InvalidResponse(err.to_string())),
                },
            };
        }

        let error = serde_json::from_str::<ErrorResponse>(&body).unwrap_or_else(|_| ErrorResponse {
            error: status.to_string(),
            error_description: body,
        });
        if !error.is_pending() {
            warn!(%url, %status, error = %error.error, "Provider rejected request");
        }
        Ok(Reply::Rejected(error))
    }
}
