//! Access token lifecycle: reuse while valid, refresh when expired.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::flow::OAuthClient;
use crate::store::TokenStore;

/// Hands out a valid access token from the [`TokenStore`], refreshing it
/// through the [`OAuthClient`] when it is within a minute of expiry.
///
/// Never starts the device flow; a missing record is
/// [`Error::NotAuthorized`].
#[derive(Debug, Clone)]
pub struct TokenManager {
    client: OAuthClient,
    store: TokenStore,
}

impl TokenManager {
    /// Creates a manager over the given client and store.
    #[must_use]
    pub const fn new(client: OAuthClient, store: TokenStore) -> Self {
        Self { client, store }
    }

    /// Returns a currently valid access token.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthorized`] if no record is stored
    /// - [`Error::Parse`] if the stored record is corrupt
    /// - [`Error::Provider`] if the provider rejects the refresh token
    /// - transport and storage errors as they occur
    pub async fn get_access_token(&self) -> Result<String> {
        let Some(record) = self.store.load()? else {
            return Err(Error::NotAuthorized {
                path: self.store.path().to_path_buf(),
            });
        };

        if !record.needs_refresh() {
            debug!(expires_at = %record.expires_at, "Using stored access token");
            return Ok(record.access_token);
        }

        debug!(expires_at = %record.expires_at, "Access token expired, refreshing");
        let response = self.client.refresh(&record.refresh_token).await?;
        let refreshed = record.refreshed(response)?;
        self.store.save(&refreshed)?;
        info!(expires_at = %refreshed.expires_at, "Access token refreshed");

        Ok(refreshed.access_token)
    }
}
