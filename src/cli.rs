//! CLI argument parsing and credential configuration.
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;

use crate::{
    PatchbackError, Result, config::DEFAULT_CONFIG_FILE,
    forge::token::InstallationToken, gate::PULL_REQUEST_EVENT,
};

/// Global CLI arguments for credentials, configuration and debugging.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    /// Path to the patchback.toml configuration file.
    pub config: PathBuf,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    /// Installation token for git and API access. Falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,

    #[arg(long, global = true)]
    /// Expiry of the installation token as an RFC 3339 timestamp.
    pub token_expires_at: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Backport subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process a stored webhook delivery and backport what it asks for.
    Handle {
        #[arg(long, default_value = PULL_REQUEST_EVENT)]
        /// Webhook event name (the X-GitHub-Event header).
        event: String,

        #[arg(long)]
        /// File holding the JSON webhook payload.
        payload: PathBuf,
    },
}

impl Args {
    /// Build the installation token from `--token` and
    /// `--token-expires-at`.
    pub fn installation_token(&self) -> Result<InstallationToken> {
        let token = self
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                PatchbackError::InvalidArgs(
                    "an installation token is required: pass --token or set GITHUB_TOKEN"
                        .into(),
                )
            })?;

        let expires_at = self
            .token_expires_at
            .as_deref()
            .map(|expiry| {
                DateTime::parse_from_rfc3339(expiry)
                    .map(|expiry| expiry.with_timezone(&Utc))
            })
            .transpose()?;

        Ok(InstallationToken::new(
            SecretString::from(token.to_string()),
            expires_at,
        ))
    }
}
