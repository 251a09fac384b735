//! `datapoint.toml`: sources, the widget store and logging.
//!
//! ```toml
//! [store]
//! path = "${HOME}/.local/share/datapoint/store.db"
//!
//! [sources.sales]
//! name = "Sales"
//! driver = "sqlite"
//! path = "./data/sales.db"
//!
//! [log]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Paths may reference environment variables as `${NAME}` or `$NAME`;
//! they are expanded when a path is resolved, not when the file is read.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::connection::{ConnectionConfig, ConnectionError};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DATAPOINT_CONFIG";

const LOCAL_FILE: &str = "datapoint.toml";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("environment variable {0} is not set")]
    UndefinedVar(String),

    #[error("source not found: {0}")]
    UnknownSource(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    /// Keyed by source id.
    pub sources: HashMap<String, SourceSettings>,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "datapoint.db".into(),
        }
    }
}

impl StoreSettings {
    pub fn resolved_path(&self) -> Result<PathBuf, SettingsError> {
        Ok(expand_env_vars(&self.path)?.into())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSettings {
    /// Display name, for logs.
    #[serde(default)]
    pub name: String,
    pub driver: String,
    pub path: String,
}

impl SourceSettings {
    pub fn connection(&self) -> Result<ConnectionConfig, SettingsError> {
        Ok(ConnectionConfig {
            driver: self.driver.parse()?,
            path: expand_env_vars(&self.path)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Level filter used when `RUST_LOG` is unset.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Settings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SettingsError::NotFound(path.into()));
        }
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.into(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.into(),
            source,
        })
    }

    /// `$DATAPOINT_CONFIG` when set, otherwise the first existing file among
    /// `./datapoint.toml` and `<config dir>/datapoint/config.toml`, otherwise
    /// defaults.
    pub fn load() -> Result<Self, SettingsError> {
        if let Some(explicit) = env::var_os(CONFIG_ENV) {
            return Self::from_file(explicit);
        }
        let user = dirs::config_dir().map(|dir| dir.join("datapoint").join("config.toml"));
        match std::iter::once(PathBuf::from(LOCAL_FILE))
            .chain(user)
            .find(|candidate| candidate.is_file())
        {
            Some(found) => Self::from_file(found),
            None => Ok(Self::default()),
        }
    }

    pub fn source(&self, id: &str) -> Result<&SourceSettings, SettingsError> {
        self.sources
            .get(id)
            .ok_or_else(|| SettingsError::UnknownSource(id.into()))
    }
}

/// Replace `${NAME}` and `$NAME` with the variable's value. A `$` not
/// followed by a name is kept as is.
pub fn expand_env_vars(input: &str) -> Result<String, SettingsError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];

        let (name, tail) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(close) => (&braced[..close], &braced[close + 1..]),
                None => (braced, ""),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                if end == 0 {
                    out.push('$');
                    rest = after;
                    continue;
                }
                after.split_at(end)
            }
        };

        let value = env::var(name).map_err(|_| SettingsError::UndefinedVar(name.into()))?;
        out.push_str(&value);
        rest = tail;
    }

    out.push_str(rest);
    Ok(out)
}
