//! Tracing subscriber setup.
//!
//! The `[log]` section supplies the default level and output format;
//! `RUST_LOG` directives, when present, take precedence over the level.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LogSettings;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("unknown log level: {0}")]
    Level(String),

    #[error("unknown log format: {0}. Supported: pretty, json")]
    Format(String),

    #[error("failed to install subscriber: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" | "" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(LogError::Format(s.to_string())),
        }
    }
}

/// Level used when `RUST_LOG` is unset. `verbose` forces at least DEBUG.
pub fn default_level(settings: &LogSettings, verbose: bool) -> Result<LevelFilter, LogError> {
    let level: LevelFilter = settings
        .level
        .parse()
        .map_err(|_| LogError::Level(settings.level.clone()))?;
    Ok(if verbose {
        level.max(LevelFilter::DEBUG)
    } else {
        level
    })
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init(settings: &LogSettings, verbose: bool) -> Result<(), LogError> {
    let format: LogFormat = settings.format.parse()?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level(settings, verbose)?.into())
        .from_env_lossy();

    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(
            builder.json().with_current_span(true).finish(),
        )?,
    }
    Ok(())
}
