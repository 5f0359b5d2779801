//! Application constants and environment-backed configuration.
//!
//! Two credentials exist and they are never interchangeable:
//! - the publishable key, used for sign-in and user-scoped (row-level
//!   secured) queries;
//! - the service-role key, read only by the privileged client factory.
//!
//! All loaders take a lookup function so tests never touch the process
//! environment.

use std::fmt;
use std::net::SocketAddr;

use reqwest::Url;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Application-level constants
pub const APP_NAME: &str = "First Principles";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_URL: &str = "SUPABASE_URL";
pub const ENV_URL_PUBLIC: &str = "NEXT_PUBLIC_SUPABASE_URL";
pub const ENV_PUBLISHABLE_KEY: &str = "SUPABASE_PUBLISHABLE_KEY";
pub const ENV_PUBLISHABLE_KEY_PUBLIC: &str = "NEXT_PUBLIC_SUPABASE_ANON_KEY";
pub const ENV_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_API_ADDR: &str = "FP_API_ADDR";

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8787";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "first_principles_lib=debug,first_principles=debug,audit=info,access=info,tower_http=info"
    } else {
        "first_principles_lib=info,first_principles=info,audit=info,access=info"
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration value {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

// ═══════════════════════════════════════════════════════════
// SecretKey: zeroed on drop, never printed
// ═══════════════════════════════════════════════════════════

/// A backend credential. Zeroed on drop; `Debug` is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential, for request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &SecretKey) -> bool {
        self.0 == other.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

// ═══════════════════════════════════════════════════════════
// Loaders
// ═══════════════════════════════════════════════════════════

/// Read a variable, treating empty or whitespace-only values as absent.
fn read<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_url<F>(lookup: &F) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = read(lookup, ENV_URL)
        .or_else(|| read(lookup, ENV_URL_PUBLIC))
        .ok_or(ConfigError::Missing(ENV_URL))?;
    parse_backend_url(&raw)
}

/// Parse and sanity-check the backend endpoint.
pub fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name: ENV_URL,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            name: ENV_URL,
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

/// Configuration for user-scoped access (sign-in, row-level secured reads).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub publishable_key: SecretKey,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = read_url(&lookup)?;
        let publishable_key = read(&lookup, ENV_PUBLISHABLE_KEY)
            .or_else(|| read(&lookup, ENV_PUBLISHABLE_KEY_PUBLIC))
            .ok_or(ConfigError::Missing(ENV_PUBLISHABLE_KEY))?;
        Ok(Self {
            url,
            publishable_key: SecretKey::new(publishable_key),
        })
    }
}

/// Configuration for the privileged (policy-bypassing) client.
///
/// Only `SUPABASE_SERVICE_ROLE_KEY` is accepted; a publishable key is never
/// promoted to the service role.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub url: Url,
    pub service_role_key: SecretKey,
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = read_url(&lookup)?;
        let service_role_key = read(&lookup, ENV_SERVICE_ROLE_KEY)
            .ok_or(ConfigError::Missing(ENV_SERVICE_ROLE_KEY))?;
        Ok(Self {
            url,
            service_role_key: SecretKey::new(service_role_key),
        })
    }
}

/// Bind address for the admin HTTP surface.
pub fn api_addr_from_lookup<F>(lookup: F) -> Result<SocketAddr, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = read(&lookup, ENV_API_ADDR).unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
    raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
        name: ENV_API_ADDR,
        reason: e.to_string(),
    })
}
