//! Client configuration.

use crate::catalog::CatalogEntry;
use crate::drag::JITTER_THRESHOLD;
use crate::proximity::MAX_PAIR_DISTANCE;
use crate::sync::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding the server address.
pub const SERVER_ENV: &str = "MIXCRAFT_SERVER";
/// Environment variable providing a display name to announce.
pub const NAME_ENV: &str = "MIXCRAFT_NAME";

const DEFAULT_SERVER: &str = "localhost:3000";
const DEFAULT_NAMESPACE: &str = "/game";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything the client needs to know before connecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address: bare host, `http(s)://` or `ws(s)://` URL.
    pub server_url: String,
    /// Use `wss` when the address carries no scheme.
    pub secure: bool,
    /// Namespace path appended to the server address.
    pub namespace: String,
    pub reconnect: ReconnectPolicy,
    /// Maximum anchor distance for a pairing candidate.
    pub pair_distance: f64,
    /// Movement below which a drag counts as a click.
    pub jitter: f64,
    /// Palette shown before the first `items` snapshot.
    pub initial_catalog: Vec<CatalogEntry>,
    /// Display name to store and announce on start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER.to_string(),
            secure: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            reconnect: ReconnectPolicy::default(),
            pair_distance: MAX_PAIR_DISTANCE,
            jitter: JITTER_THRESHOLD,
            initial_catalog: vec![
                CatalogEntry::new("🚧", "Kaputt"),
                CatalogEntry::new("🔗", "Verbindung"),
                CatalogEntry::new("💻", "Server"),
            ],
            display_name: None,
        }
    }
}

impl ClientConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server) = lookup(SERVER_ENV).filter(|s| !s.trim().is_empty()) {
            log::info!("Server overridden by {}: {}", SERVER_ENV, server);
            self.server_url = server;
        }
        if let Some(name) = lookup(NAME_ENV).filter(|s| !s.trim().is_empty()) {
            self.display_name = Some(name);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pair_distance > 0.0) {
            return Err(ConfigError::Invalid(format!("pair_distance must be positive, got {}", self.pair_distance)));
        }
        if !(self.jitter >= 0.0) {
            return Err(ConfigError::Invalid(format!("jitter must not be negative, got {}", self.jitter)));
        }
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server_url is empty".to_string()));
        }
        Ok(())
    }

    /// The WebSocket URL to connect to.
    pub fn endpoint_url(&self) -> String {
        resolve_server_url(&self.server_url, &self.namespace, self.secure)
    }
}

/// Turn a server address into a WebSocket endpoint URL.
///
/// `http(s)` maps to `ws(s)`, a bare host gets `ws` (or `wss` when `secure`),
/// and the namespace path is appended unless already present.
pub fn resolve_server_url(raw: &str, namespace: &str, secure: bool) -> String {
    let server = raw.trim().trim_end_matches('/');
    let base = if server.starts_with("ws://") || server.starts_with("wss://") {
        server.to_string()
    } else if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        let scheme = if secure { "wss" } else { "ws" };
        format!("{}://{}", scheme, server)
    };

    let namespace = namespace.trim().trim_matches('/');
    if namespace.is_empty() {
        return base;
    }
    let path = format!("/{}", namespace);
    if base.ends_with(&path) {
        base
    } else {
        format!("{}{}", base, path)
    }
}
