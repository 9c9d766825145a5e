//! Short-lived installation credentials.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use secrecy::SecretString;

#[cfg(test)]
use mockall::automock;

use crate::{PatchbackError, Result};

/// Opaque credential scoped to one application installation.
#[derive(Debug, Clone)]
pub struct InstallationToken {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl InstallationToken {
    pub fn new(token: SecretString, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    pub fn secret(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Source of installation tokens. Called once per backport request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn installation_token(&self) -> Result<InstallationToken>;
}

/// Hands out a token issued ahead of time, e.g. by the deployment
/// environment.
pub struct StaticTokenProvider {
    token: InstallationToken,
}

impl StaticTokenProvider {
    pub fn new(token: InstallationToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn installation_token(&self) -> Result<InstallationToken> {
        if let Some(expiry) = self.token.expires_at()
            && self.token.is_expired_at(Utc::now())
        {
            error!("installation token expired at {expiry}");
            return Err(PatchbackError::TokenExpired(expiry));
        }

        Ok(self.token.clone())
    }
}
