//! Access token providers
//!
//! Obtaining an OAuth token is outside this crate; a provider only hands the
//! transport whatever token the environment already has, and is asked again
//! after a 401.

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Source of bearer tokens for API requests
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token
    async fn token(&self) -> Result<String>;

    /// Obtain a fresh token after the current one was rejected
    async fn refresh(&self) -> Result<String> {
        self.token().await
    }
}

/// A fixed token
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Token read from an environment variable
///
/// Refreshing reloads `.env` first so a token rotated by an external helper
/// is picked up without restarting.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    fn read(&self) -> Result<String> {
        let token = std::env::var(&self.var)
            .with_context(|| format!("Access token variable {} is not set", self.var))?;
        let token = token.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("Access token variable {} is empty", self.var);
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    async fn token(&self) -> Result<String> {
        self.read()
    }

    async fn refresh(&self) -> Result<String> {
        if let Ok(path) = dotenvy::dotenv_override() {
            log::debug!("Reloaded environment from {}", path.display());
        }
        self.read()
    }
}
