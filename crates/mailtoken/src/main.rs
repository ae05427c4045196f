//! `mailtoken` - `OAuth2` token helper for terminal mail clients.
//!
//! Default mode prints a valid access token on stdout (for neomutt's
//! `imap_oauth_refresh_command`); `--authorize` runs the one-time device
//! authorization flow. Logs go to stderr.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod config;
mod setup;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mailtoken_oauth::{DeviceFlow, TokenManager, TokenStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(hint) = hint(&err) {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let mut settings = Settings::load(&config_path)?;
    settings.apply_env(|key| std::env::var(key).ok());
    settings.apply_cli(cli);

    let Some(client_id) = settings.client_id() else {
        eprintln!("{}", setup::instructions(settings.provider, &config_path));
        anyhow::bail!("no OAuth2 client id configured");
    };

    let client = settings
        .oauth_client(client_id)
        .context("invalid provider configuration")?;
    let store = TokenStore::new(settings.token_file());

    if cli.authorize {
        info!(provider = %client.provider.name, "Starting OAuth2 authorization");
        let mut flow = DeviceFlow::new(client, store.clone());
        if let Some(scope) = &settings.scope {
            flow = flow.with_scope(scope);
        }
        if let Some(limit) = settings.poll_timeout() {
            flow = flow.with_timeout(limit);
        }

        flow.authorize().await.context("authorization failed")?;
        println!(
            "\n✓ Authorization successful! Tokens saved to: {}",
            store.path().display()
        );
    } else {
        let access_token = TokenManager::new(client, store)
            .get_access_token()
            .await
            .context("could not obtain an access token")?;
        println!("{access_token}");
    }

    Ok(())
}

/// Operator guidance for the failure classes that need different actions.
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let err = err.downcast_ref::<mailtoken_oauth::Error>()?;
    if err.is_not_authorized() {
        Some("No tokens yet. Run `mailtoken --authorize` first.")
    } else if err.is_provider_rejection() {
        Some("The provider rejected the request. Run `mailtoken --authorize` to sign in again.")
    } else if err.is_corrupt_state() {
        Some("The token file is corrupted. Run `mailtoken --authorize` to replace it.")
    } else {
        None
    }
}
