//! Configuration file, environment and flag resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use mailtoken_oauth::{Error, OAuthClient, Provider};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Cli;

/// Client id shipped in the sample configuration.
pub const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID_HERE";

/// Environment variable overriding `client_id`.
pub const ENV_CLIENT_ID: &str = "MAILTOKEN_CLIENT_ID";
/// Environment variable overriding `client_secret`.
pub const ENV_CLIENT_SECRET: &str = "MAILTOKEN_CLIENT_SECRET";
/// Environment variable overriding `token_file`.
pub const ENV_TOKEN_FILE: &str = "MAILTOKEN_TOKEN_FILE";

/// Which provider preset to start from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Gmail / Google Workspace.
    #[default]
    Google,
    /// Outlook / Microsoft 365.
    Microsoft,
    /// Any provider; `token_url` and `device_auth_url` are required.
    Custom,
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Provider preset.
    pub provider: ProviderKind,
    /// `OAuth2` client id of the registered app.
    pub client_id: Option<String>,
    /// `OAuth2` client secret of the registered app.
    pub client_secret: Option<String>,
    /// Space-separated scopes; provider defaults when unset.
    pub scope: Option<String>,
    /// Token endpoint override.
    pub token_url: Option<String>,
    /// Device authorization endpoint override.
    pub device_auth_url: Option<String>,
    /// Where tokens are stored.
    pub token_file: Option<PathBuf>,
    /// Overall limit on waiting for the user during `--authorize`.
    pub poll_timeout_secs: Option<u64>,
}

impl Settings {
    /// Reads the configuration file; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        serde_json::from_str(&contents)
            .with_context(|| format!("invalid configuration file {}", path.display()))
    }

    /// Applies `MAILTOKEN_*` overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(client_id) = lookup(ENV_CLIENT_ID) {
            self.client_id = Some(client_id);
        }
        if let Some(secret) = lookup(ENV_CLIENT_SECRET) {
            self.client_secret = Some(secret);
        }
        if let Some(token_file) = lookup(ENV_TOKEN_FILE) {
            self.token_file = Some(PathBuf::from(token_file));
        }
    }

    /// Applies command line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(token_file) = &cli.token_file {
            self.token_file = Some(token_file.clone());
        }
        if let Some(timeout) = cli.timeout {
            self.poll_timeout_secs = Some(timeout);
        }
    }

    /// Configured client id, ignoring blanks and the sample placeholder.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !id.starts_with(PLACEHOLDER_CLIENT_ID))
    }

    /// Token file path, defaulting under the user config directory.
    pub fn token_file(&self) -> PathBuf {
        self.token_file.clone().unwrap_or_else(default_token_file)
    }

    /// Device flow polling limit, if any.
    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }

    /// Provider endpoints after applying URL overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is invalid or a custom provider lacks one.
    pub fn provider(&self) -> mailtoken_oauth::Result<Provider> {
        let base = match self.provider {
            ProviderKind::Google => Provider::google()?,
            ProviderKind::Microsoft => Provider::microsoft()?,
            ProviderKind::Custom => {
                let token_url = self.token_url.as_deref().ok_or_else(|| {
                    Error::InvalidConfig("custom provider requires token_url".into())
                })?;
                let device_auth_url = self.device_auth_url.as_deref().ok_or_else(|| {
                    Error::InvalidConfig("custom provider requires device_auth_url".into())
                })?;
                return Provider::new("Custom", token_url, device_auth_url);
            }
        };

        Ok(Provider {
            token_url: match &self.token_url {
                Some(url) => url.parse()?,
                None => base.token_url,
            },
            device_auth_url: match &self.device_auth_url {
                Some(url) => url.parse()?,
                None => base.device_auth_url,
            },
            ..base
        })
    }

    /// Grant client for the given client id.
    ///
    /// # Errors
    ///
    /// See [`Settings::provider`].
    pub fn oauth_client(&self, client_id: &str) -> mailtoken_oauth::Result<OAuthClient> {
        let client = OAuthClient::new(client_id, self.provider()?);
        Ok(match &self.client_secret {
            Some(secret) if !secret.is_empty() => client.with_client_secret(secret),
            _ => client,
        })
    }
}

fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtoken")
}

/// `<config dir>/mailtoken/config.json`.
pub fn default_config_path() -> PathBuf {
    app_config_dir().join("config.json")
}

/// `<config dir>/mailtoken/oauth2_tokens.json`.
pub fn default_token_file() -> PathBuf {
    app_config_dir().join("oauth2_tokens.json")
}
