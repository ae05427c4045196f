//! `OAuth2` provider configurations.

use crate::error::Result;
use url::Url;

/// `OAuth2` provider endpoints for the device and refresh grants.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Google").
    pub name: String,
    /// Token endpoint URL (device-code exchange and refresh).
    pub token_url: Url,
    /// Device authorization endpoint URL.
    pub device_auth_url: Url,
    /// Default scopes.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if URLs are invalid.
    pub fn new(
        name: impl Into<String>,
        token_url: impl AsRef<str>,
        device_auth_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            token_url: Url::parse(token_url.as_ref())?,
            device_auth_url: Url::parse(device_auth_url.as_ref())?,
            default_scopes: Vec::new(),
        })
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Space-separated default scope string.
    #[must_use]
    pub fn default_scope(&self) -> String {
        self.default_scopes.join(" ")
    }

    /// Google `OAuth2` provider configuration.
    ///
    /// Scopes:
    /// - `https://mail.google.com/` - Full Gmail access (IMAP/SMTP)
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Ok(Self::new(
            "Google",
            "https://oauth2.googleapis.com/token",
            "https://oauth2.googleapis.com/device/code",
        )?
        .with_default_scopes(vec!["https://mail.google.com/".to_string()]))
    }

    /// Microsoft/Outlook `OAuth2` provider configuration.
    ///
    /// Scopes:
    /// - `https://outlook.office.com/IMAP.AccessAsUser.All` - IMAP access
    /// - `https://outlook.office.com/SMTP.Send` - SMTP access
    /// - `offline_access` - Refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft() -> Result<Self> {
        Ok(Self::new(
            "Microsoft",
            "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            "https://login.microsoftonline.com/common/oauth2/v2.0/devicecode",
        )?
        .with_default_scopes(vec![
            "https://outlook.office.com/IMAP.AccessAsUser.All".to_string(),
            "https://outlook.office.com/SMTP.Send".to_string(),
            "offline_access".to_string(),
        ]))
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

    #[test]
    fn test_google_provider() {
        let provider = Provider::google().unwrap();
        assert_eq!(provider.name, "Google");
        assert_eq!(
            provider.device_auth_url.as_str(),
            "https://oauth2.googleapis.com/device/code"
        );
        assert_eq!(provider.default_scope(), "https://mail.google.com/");
    }

    #[test]
    fn test_microsoft_provider() {
        let provider = Provider::microsoft().unwrap();
        assert_eq!(provider.name, "Microsoft");
        assert_eq!(provider.default_scopes.len(), 3);
        assert!(provider.default_scope().ends_with("offline_access"));
    }

    #[test]
    fn test_custom_provider() {
        let provider = Provider::new(
            "Custom",
            "https://auth.example.com/token",
            "https://auth.example.com/device",
        )
        .unwrap()
        .with_default_scopes(vec!["email".to_string()]);

        assert_eq!(provider.name, "Custom");
        assert_eq!(provider.default_scope(), "email");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = Provider::new("Broken", "not a url", "https://auth.example.com/device");
        assert!(matches!(result, Err(crate::Error::Url(_))));
    }
}
