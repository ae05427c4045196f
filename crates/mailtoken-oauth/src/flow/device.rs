//! Device Authorization Flow implementation (RFC 8628).

use super::{DeviceExchange, OAuthClient};
use crate::error::{Error, Result};
use crate::store::TokenStore;
use crate::token::CredentialRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Device authorization response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceAuthorization {
    /// Device code for polling.
    pub device_code: String,
    /// User code to display to the user.
    pub user_code: String,
    /// Verification URL where user should go.
    ///
    /// Google sends `verification_url`, RFC 8628 names it `verification_uri`.
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    /// Verification URL with the user code embedded (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    /// Expiration time of the device code in seconds.
    pub expires_in: u64,
    /// Polling interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

const fn default_interval() -> u64 {
    5
}

type Prompt = Box<dyn Fn(&DeviceAuthorization) + Send + Sync>;

/// Prints the verification URL and user code as a banner on stdout.
pub fn print_instructions(auth: &DeviceAuthorization) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("Go to: {}", auth.verification_url);
    println!("Enter code: {}", auth.user_code);
    println!("{rule}\n");
    println!("Waiting for authorization...");
}

/// Device Authorization Flow for `OAuth2`.
///
/// Requests a device code, shows the user code to the operator, then polls
/// the token endpoint until the user approves. Only `authorization_pending`
/// is retried; any other provider answer ends the flow. The issued record
/// is written to the [`TokenStore`].
pub struct DeviceFlow {
    client: OAuthClient,
    store: TokenStore,
    scope: Option<String>,
    timeout: Option<Duration>,
    prompt: Prompt,
}

impl fmt::Debug for DeviceFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFlow")
            .field("client", &self.client)
            .field("store", &self.store)
            .field("scope", &self.scope)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DeviceFlow {
    /// Creates a new device flow.
    #[must_use]
    pub fn new(client: OAuthClient, store: TokenStore) -> Self {
        Self {
            client,
            store,
            scope: None,
            timeout: None,
            prompt: Box::new(print_instructions),
        }
    }

    /// Overrides the provider's default scopes.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Gives up polling after `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces how the user code is shown to the operator.
    #[must_use]
    pub fn with_prompt(
        mut self,
        prompt: impl Fn(&DeviceAuthorization) + Send + Sync + 'static,
    ) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// Runs the flow to completion and persists the issued credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the provider rejects the request or the
    /// exchange with anything but `authorization_pending`,
    /// [`Error::Timeout`] if the configured timeout elapses, and transport
    /// or storage errors as they occur.
    pub async fn authorize(&self) -> Result<CredentialRecord> {
        let scope = self
            .scope
            .clone()
            .unwrap_or_else(|| self.client.provider.default_scope());
        let auth = self.client.request_device_code(&scope).await?;
        debug!(
            interval = auth.interval,
            expires_in = auth.expires_in,
            "Device code issued"
        );

        (self.prompt)(&auth);

        let poll = self.poll_for_token(&auth);
        let record = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, poll)
                .await
                .map_err(|_| Error::Timeout(limit.as_secs()))??,
            None => poll.await?,
        };

        self.store.save(&record)?;
        info!(path = %self.store.path().display(), "Authorization complete");
        Ok(record)
    }

    /// Polls until the exchange stops returning `authorization_pending`.
    async fn poll_for_token(&self, auth: &DeviceAuthorization) -> Result<CredentialRecord> {
        let interval = Duration::from_secs(auth.interval);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.client.exchange_device_code(&auth.device_code).await? {
                DeviceExchange::Success(token) => {
                    debug!(attempts, "Device code exchanged");
                    return CredentialRecord::issue(token);
                }
                DeviceExchange::Pending => {
                    debug!(attempts, "Authorization pending");
                    tokio::time::sleep(interval).await;
                }
                DeviceExchange::Fatal(error) => return Err(error.into_error()),
            }
        }
    }
}
