//! Device authorization flow against a mock provider.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use mailtoken_oauth::{DeviceExchange, DeviceFlow, Error};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{form_bodies, mock_client, temp_store};

async fn mount_device_code(server: &MockServer, interval: u64) {
    Mock::given(method("POST"))
        .and(path("/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "device-abc",
            "user_code": "WXYZ-1234",
            "verification_url": "https://www.google.com/device",
            "expires_in": 1800,
            "interval": interval
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn pending() -> ResponseTemplate {
    ResponseTemplate::new(428).set_body_json(json!({
        "error": "authorization_pending",
        "error_description": "Precondition Required"
    }))
}

fn issued() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": "ya29.first",
        "expires_in": 3599,
        "refresh_token": "1//refresh",
        "scope": "https://mail.google.com/",
        "token_type": "Bearer"
    }))
}

#[tokio::test]
async fn authorize_polls_until_granted() {
    let server = MockServer::start().await;
    mount_device_code(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(pending())
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(issued())
        .expect(1)
        .mount(&server)
        .await;

    let shown = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&shown);
    let (_dir, store) = temp_store();
    let flow = DeviceFlow::new(mock_client(&server), store.clone()).with_prompt(move |auth| {
        captured
            .lock()
            .unwrap()
            .push((auth.verification_url.clone(), auth.user_code.clone()));
    });

    let started = Instant::now();
    let record = flow.authorize().await.expect("authorized");
    let elapsed = started.elapsed();

    assert_eq!(
        shown.lock().unwrap().as_slice(),
        &[(
            "https://www.google.com/device".to_string(),
            "WXYZ-1234".to_string()
        )]
    );
    assert!(elapsed >= Duration::from_secs(2), "slept {elapsed:?}");

    assert_eq!(record.access_token, "ya29.first");
    assert_eq!(record.refresh_token, "1//refresh");
    assert_eq!(record.expires_in, 3599);
    assert!(record.expires_at > Utc::now() + TimeDelta::seconds(3500));
    assert_eq!(record.extra["token_type"], "Bearer");
    assert_eq!(store.load().unwrap(), Some(record));

    let exchanges = form_bodies(&server, "/token").await;
    assert_eq!(exchanges.len(), 3);
    for form in &exchanges {
        assert_eq!(form["client_id"], "client-123");
        assert_eq!(form["client_secret"], "secret-456");
        assert_eq!(form["device_code"], "device-abc");
        assert_eq!(
            form["grant_type"],
            "urn:ietf:params:oauth:grant-type:device_code"
        );
    }

    let requests = form_bodies(&server, "/device/code").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["client_id"], "client-123");
    assert_eq!(requests[0]["scope"], "https://mail.google.com/");
    assert!(!requests[0].contains_key("client_secret"));
}

#[tokio::test]
async fn authorize_uses_configured_scope() {
    let server = MockServer::start().await;
    mount_device_code(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(issued())
        .mount(&server)
        .await;

    let (_dir, store) = temp_store();
    DeviceFlow::new(mock_client(&server), store)
        .with_scope("email offline_access")
        .with_prompt(|_| {})
        .authorize()
        .await
        .unwrap();

    let requests = form_bodies(&server, "/device/code").await;
    assert_eq!(requests[0]["scope"], "email offline_access");
}

#[tokio::test]
async fn authorize_aborts_on_access_denied() {
    let server = MockServer::start().await;
    mount_device_code(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "access_denied",
            "error_description": "Forbidden"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, store) = temp_store();
    let err = DeviceFlow::new(mock_client(&server), store.clone())
        .with_prompt(|_| {})
        .authorize()
        .await
        .unwrap_err();

    match err {
        Error::Provider { error, description } => {
            assert_eq!(error, "access_denied");
            assert_eq!(description, "Forbidden");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn authorize_does_not_retry_slow_down() {
    let server = MockServer::start().await;
    mount_device_code(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(428).set_body_json(json!({
            "error": "slow_down"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, store) = temp_store();
    let err = DeviceFlow::new(mock_client(&server), store)
        .with_prompt(|_| {})
        .authorize()
        .await
        .unwrap_err();

    assert!(err.is_provider_rejection());
}

#[tokio::test]
async fn authorize_times_out_while_pending() {
    let server = MockServer::start().await;
    mount_device_code(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(pending())
        .mount(&server)
        .await;

    let (_dir, store) = temp_store();
    let err = DeviceFlow::new(mock_client(&server), store.clone())
        .with_timeout(Duration::from_millis(1500))
        .with_prompt(|_| {})
        .authorize()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(1)));
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn authorize_fails_when_device_code_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/device/code"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "The OAuth client was not found."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(issued())
        .expect(0)
        .mount(&server)
        .await;

    let prompted = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&prompted);
    let (_dir, store) = temp_store();
    let err = DeviceFlow::new(mock_client(&server), store)
        .with_prompt(move |_| *flag.lock().unwrap() = true)
        .authorize()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { ref error, .. } if error == "invalid_client"));
    assert!(!*prompted.lock().unwrap());
}

#[tokio::test]
async fn authorize_rejects_grant_without_refresh_token() {
    let server = MockServer::start().await;
    mount_device_code(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.first",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;

    let (_dir, store) = temp_store();
    let err = DeviceFlow::new(mock_client(&server), store.clone())
        .with_prompt(|_| {})
        .authorize()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidResponse(_)));
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn exchange_classifies_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(pending())
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "expired_token"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(issued())
        .mount(&server)
        .await;

    let client = mock_client(&server);

    assert_eq!(
        client.exchange_device_code("device-abc").await.unwrap(),
        DeviceExchange::Pending
    );

    match client.exchange_device_code("device-abc").await.unwrap() {
        DeviceExchange::Fatal(error) => assert_eq!(error.error, "expired_token"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    match client.exchange_device_code("device-abc").await.unwrap() {
        DeviceExchange::Fatal(error) => {
            assert_eq!(error.error, "502 Bad Gateway");
            assert_eq!(error.error_description, "Bad Gateway");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    match client.exchange_device_code("device-abc").await.unwrap() {
        DeviceExchange::Success(token) => {
            assert_eq!(token.access_token, "ya29.first");
            assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn exchange_treats_pending_in_success_body_as_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "authorization_pending"
        })))
        .mount(&server)
        .await;

    let outcome = mock_client(&server)
        .exchange_device_code("device-abc")
        .await
        .unwrap();
    assert_eq!(outcome, DeviceExchange::Pending);
}

#[tokio::test]
async fn authorize_keeps_polling_when_pending_has_null_description() {
    let server = MockServer::start().await;
    mount_device_code(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "authorization_pending",
            "error_description": null
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(issued())
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, store) = temp_store();
    let record = DeviceFlow::new(mock_client(&server), store)
        .with_prompt(|_| {})
        .authorize()
        .await
        .unwrap();

    assert_eq!(record.access_token, "ya29.first");
    assert_eq!(form_bodies(&server, "/token").await.len(), 2);
}
