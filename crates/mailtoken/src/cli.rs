//! Command line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Prints a valid `OAuth2` access token for a mail client.
///
/// Run once with `--authorize` to sign in; afterwards every run prints the
/// current access token, refreshing it when it has expired.
#[derive(Debug, Parser)]
#[command(name = "mailtoken", version, about, long_about)]
pub struct Cli {
    /// Run the device authorization flow and store the tokens.
    #[arg(long)]
    pub authorize: bool,

    /// Configuration file (default: <config dir>/mailtoken/config.json).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Token file, overriding the configuration.
    #[arg(long, value_name = "PATH")]
    pub token_file: Option<PathBuf>,

    /// Give up waiting for authorization after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase log output on stderr (-v, -vv).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is unset.
    pub const fn default_log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "mailtoken=info,mailtoken_oauth=info,warn",
            _ => "mailtoken=debug,mailtoken_oauth=debug,info",
        }
    }
}
