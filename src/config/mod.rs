//! Settings file, source connections and environment expansion.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Driver};
pub use settings::{
    expand_env_vars, LogSettings, CONFIG_ENV, Settings, SettingsError, SourceSettings, StoreSettings,
};
