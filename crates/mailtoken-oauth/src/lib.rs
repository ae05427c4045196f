//! # mailtoken-oauth
//!
//! `OAuth2` token acquisition and refresh for mail clients that read their
//! access token from a helper command (neomutt `imap_oauth_refresh_command`
//! and friends).
//!
//! ## Features
//!
//! - **Device flow**: first-time authorization (RFC 8628) for terminals
//!   without a browser
//! - **Token lifecycle**: expiry check with a 60 second margin, refresh,
//!   refresh-token preservation
//! - **Token storage**: one JSON file, owner-only permissions, atomic
//!   replacement
//! - **Provider configurations**: Gmail and Outlook presets, or any
//!   `OAuth2` provider with a device endpoint
//!
//! ## Quick Start
//!
//! ### First-time authorization
//!
//! ```ignore
//! use mailtoken_oauth::{DeviceFlow, OAuthClient, Provider, TokenStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OAuthClient::new("your_client_id", Provider::google()?)
//!         .with_client_secret("your_secret");
//!     let store = TokenStore::new("/home/me/.config/mailtoken/oauth2_tokens.json");
//!
//!     // Prints the verification URL and user code, then polls
//!     let record = DeviceFlow::new(client, store).authorize().await?;
//!     println!("Authorized until {}", record.expires_at);
//!     Ok(())
//! }
//! ```
//!
//! ### Getting a token
//!
//! ```ignore
//! use mailtoken_oauth::{OAuthClient, Provider, TokenManager, TokenStore};
//!
//! let manager = TokenManager::new(client, store);
//! // Refreshes and rewrites the store only when expired
//! let access_token = manager.get_access_token().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod manager;
pub mod provider;
pub mod store;
pub mod token;

pub use error::{Error, Result};
pub use flow::{DeviceAuthorization, DeviceExchange, DeviceFlow, OAuthClient};
pub use manager::TokenManager;
pub use provider::Provider;
pub use store::TokenStore;
pub use token::{CredentialRecord, TokenResponse};
