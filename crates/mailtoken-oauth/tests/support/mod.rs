//! Shared helpers for tests against a mock `OAuth2` provider.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use mailtoken_oauth::{OAuthClient, Provider, TokenStore};
use tempfile::TempDir;
use wiremock::MockServer;

/// Client pointed at the mock server's `/token` and `/device/code`.
pub fn mock_client(server: &MockServer) -> OAuthClient {
    let provider = Provider::new(
        "Mock",
        format!("{}/token", server.uri()),
        format!("{}/device/code", server.uri()),
    )
    .unwrap()
    .with_default_scopes(vec!["https://mail.google.com/".to_string()]);

    OAuthClient::new("client-123", provider).with_client_secret("secret-456")
}

/// Store in a fresh temp directory; keep the `TempDir` alive for the test.
pub fn temp_store() -> (TempDir, TokenStore) {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path().join("oauth2_tokens.json"));
    (dir, store)
}

/// Form fields of every request the server received on `path`.
pub async fn form_bodies(server: &MockServer, path: &str) -> Vec<HashMap<String, String>> {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .into_iter()
        .filter(|request| request.url.path() == path)
        .map(|request| {
            url::form_urlencoded::parse(&request.body)
                .into_owned()
                .collect()
        })
        .collect()
}

/// Total number of requests the server received.
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .len()
}
