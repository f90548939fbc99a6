#![doc = include_str!("../README.md")]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Process name registered with the process manager.
pub const APP_NAME: &str = "azurechatgov";

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Executable launched when `WEB_SERVER_SCRIPT` is unset.
pub const DEFAULT_SCRIPT: &str = "./bin/web-server";

/// Errors building a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid PORT {value:?}: {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// A pm2 ecosystem file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessManifest {
    pub apps: Vec<AppEntry>,
}

/// One supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub script: String,
    pub args: String,
    pub watch: bool,
    pub autorestart: bool,
    pub env: BTreeMap<String, String>,
}

impl AppEntry {
    /// The web server entry listening on `port`.
    pub fn web_server(script: impl Into<String>, port: u16) -> Self {
        Self {
            name: APP_NAME.to_string(),
            script: script.into(),
            args: format!("start -p {port}"),
            watch: false,
            autorestart: true,
            env: BTreeMap::from([("APP_ENV".to_string(), "PRODUCTION".to_string())]),
        }
    }
}

impl ProcessManifest {
    /// Build the manifest from the process environment.
    pub fn from_env() -> ManifestResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the manifest through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidPort`] when `PORT` is set but is not a
    /// port number.
    pub fn from_lookup<F>(lookup: F) -> ManifestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match get("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|source| ManifestError::InvalidPort { value, source })?,
            None => DEFAULT_PORT,
        };
        let script = get("WEB_SERVER_SCRIPT").unwrap_or_else(|| DEFAULT_SCRIPT.to_string());

        tracing::debug!(port, script = %script, "building process manifest");
        Ok(Self {
            apps: vec![AppEntry::web_server(script, port)],
        })
    }

    /// Pretty-printed JSON, as pm2 reads it.
    pub fn to_json(&self) -> ManifestResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
