// Server configuration
//
// Read once at startup, after `.env` has been loaded.

use std::net::SocketAddr;

use anyhow::{Context, Result};

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:9000";

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address
    pub addr: SocketAddr,
    /// Prefix for every API route except `/health`, e.g. `/api`
    pub api_prefix: String,
    /// Origins allowed by CORS; empty means same-origin only
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            api_prefix: String::new(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Environment variables:
    /// - `POOLWRIGHT_ADDR`: listen address (default: 0.0.0.0:9000)
    /// - `API_PREFIX`: route prefix (default: empty)
    /// - `CORS_ALLOWED_ORIGINS`: comma separated origins (default: none)
    pub fn from_env() -> Result<Self> {
        let addr = std::env::var("POOLWRIGHT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse()
            .with_context(|| format!("Invalid POOLWRIGHT_ADDR: {}", addr))?;

        Ok(Self {
            addr,
            api_prefix: std::env::var("API_PREFIX").unwrap_or_default(),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or_default(),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
