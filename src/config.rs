//! Scheduler configuration.
//!
//! Settings live in a TOML file. Every section and field has a default, so an
//! absent file or a partial one is fine:
//!
//! ```toml
//! [business_hours]
//! open_hour = 8
//! close_hour = 18
//! slot_step_minutes = 30
//! overflow = "exclude"
//!
//! [series]
//! default_length = 12
//! default_duration_minutes = 45
//!
//! [logging]
//! filter = "practice_scheduler=debug"
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming the configuration file used by the binary.
pub const CONFIG_ENV_VAR: &str = "PRACTICE_SCHEDULER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What happens to a slot that starts inside business hours but ends after closing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOverflow {
    /// Slots must end at or before closing time.
    #[default]
    Exclude,
    /// Any slot that starts before closing time is offered.
    Include,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
    /// Distance between candidate slot starts, counted from opening time.
    pub slot_step_minutes: u32,
    pub overflow: SlotOverflow,
}

impl Default for BusinessHours {
    fn default() -> Self {
        BusinessHours {
            open_hour: 9,
            close_hour: 17,
            slot_step_minutes: 60,
            overflow: SlotOverflow::Exclude,
        }
    }
}

impl BusinessHours {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open_hour >= self.close_hour {
            return Err(ConfigError::Invalid(format!(
                "business hours open at {} but close at {}",
                self.open_hour, self.close_hour
            )));
        }
        if self.close_hour > 24 {
            return Err(ConfigError::Invalid(format!(
                "close hour {} is past midnight",
                self.close_hour
            )));
        }
        if self.slot_step_minutes == 0 {
            return Err(ConfigError::Invalid(
                "slot step must be at least one minute".to_string(),
            ));
        }
        Ok(())
    }
}

/// Defaults offered when creating a series interactively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesDefaults {
    pub default_length: usize,
    pub default_duration_minutes: i64,
}

impl Default for SeriesDefaults {
    fn default() -> Self {
        SeriesDefaults {
            default_length: 10,
            default_duration_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: "practice_scheduler=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub business_hours: BusinessHours,
    pub series: SeriesDefaults,
    pub logging: LoggingSettings,
}

impl SchedulerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.business_hours.validate()?;
        if self.series.default_length == 0 {
            return Err(ConfigError::Invalid(
                "default series length must be at least 1".to_string(),
            ));
        }
        if self.series.default_duration_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "default appointment duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file was given or it does not exist; defaults were used.
    Default,
    File,
}

#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: SchedulerConfig,
    pub source: ConfigSource,
}

/// Path named by [`CONFIG_ENV_VAR`], if set and non-empty.
pub fn config_path_from_env() -> Option<PathBuf> {
    env::var_os(CONFIG_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Load configuration from `path`, falling back to defaults when there is no file.
pub fn load_config(path: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
    let Some(path) = path else {
        debug!("no configuration file given, using defaults");
        return Ok(ConfigLoadResult {
            config: SchedulerConfig::default(),
            source: ConfigSource::Default,
        });
    };

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "configuration file not found, using defaults");
            return Ok(ConfigLoadResult {
                config: SchedulerConfig::default(),
                source: ConfigSource::Default,
            });
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config = SchedulerConfig::from_toml_str(&text)?;
    info!(path = %path.display(), "loaded configuration");
    Ok(ConfigLoadResult {
        config,
        source: ConfigSource::File,
    })
}
