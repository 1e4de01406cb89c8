//! API key handling for the generative backend.
//!
//! The operator's default key is resolved once at startup from a TOML secrets
//! file, then from the environment (after loading `.env` if present). Callers
//! may supply their own key per request; it always takes precedence.

use crate::config::CredentialConfig;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read secrets file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse secrets file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// An opaque API key.
///
/// `Debug` and `Display` are redacted so a key can't leak through a log line
/// or an error message.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a key, treating blank input as no key at all.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn from_optional(key: Option<String>) -> Option<Self> {
        key.and_then(Self::new)
    }

    /// The raw key, for building the outbound request only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// A flat `KEY = "value"` secrets file.
#[derive(Debug, Default)]
pub struct SecretsFile {
    values: HashMap<String, toml::Value>,
}

impl SecretsFile {
    /// Reads a secrets file. A missing file yields `Ok(None)`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>, CredentialError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents).map(Some)
    }

    pub fn parse(contents: &str) -> Result<Self, CredentialError> {
        let values: HashMap<String, toml::Value> = toml::from_str(contents)?;
        Ok(Self { values })
    }

    /// Looks up a string secret. Non-string values are ignored.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }
}

/// Resolves the operator's default credential.
///
/// Order: secrets file, then the environment variable of the same name.
/// Returns `None` when neither has a non-blank value; that is a valid state.
pub fn resolve_default_credential(config: &CredentialConfig) -> Option<Credential> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    let secrets = match SecretsFile::load(&config.secrets_path) {
        Ok(secrets) => secrets,
        Err(e) => {
            warn!(path = %config.secrets_path.display(), "Ignoring secrets file: {}", e);
            None
        }
    };

    resolve_with(secrets.as_ref(), &config.key_name, |name| std::env::var(name).ok())
}

/// Resolution logic with the environment lookup injected.
pub fn resolve_with<F>(secrets: Option<&SecretsFile>, key_name: &str, env: F) -> Option<Credential>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = secrets.and_then(|s| s.get(key_name)).and_then(Credential::new) {
        debug!(key_name, "Default credential resolved from secrets file");
        return Some(key);
    }

    if let Some(key) = Credential::from_optional(env(key_name)) {
        debug!(key_name, "Default credential resolved from environment");
        return Some(key);
    }

    debug!(key_name, "No default credential configured");
    None
}
