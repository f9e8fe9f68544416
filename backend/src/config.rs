//! Configuration for the MeetSync backend.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite location, `sqlite:` prefix optional. `:memory:` for a throwaway store.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// `*` or a comma-separated list of origins.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

/// Availability and user defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Slot length used when an availability query omits `duration`.
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
    /// IANA zone assigned to users created without one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration_minutes(),
            default_timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How long before the meeting start the reminder fires.
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_minutes: default_lead_minutes(),
        }
    }
}

/// Live channel and event bus settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds a new socket has to send its `register` message.
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout_secs: u64,
    /// Outbound buffer per connection.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Meeting events buffered per subscriber before it starts lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            registration_timeout_secs: default_registration_timeout(),
            channel_capacity: default_channel_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_database_url() -> String {
    "sqlite:./data/meetsync.db".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}
fn default_duration_minutes() -> i64 {
    60
}
fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}
fn default_true() -> bool {
    true
}
fn default_lead_minutes() -> i64 {
    30
}
fn default_registration_timeout() -> u64 {
    10
}
fn default_channel_capacity() -> usize {
    32
}
fn default_event_capacity() -> usize {
    256
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (MEETSYNC__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("MEETSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduling.default_duration_minutes <= 0 {
            return Err(ConfigError::Message(
                "scheduling.default_duration_minutes must be positive".to_string(),
            ));
        }
        if self.scheduling.default_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "scheduling.default_timezone is not an IANA zone: {}",
                self.scheduling.default_timezone
            )));
        }
        if self.reminders.lead_minutes < 0 {
            return Err(ConfigError::Message(
                "reminders.lead_minutes must not be negative".to_string(),
            ));
        }
        if self.realtime.channel_capacity == 0 || self.realtime.event_capacity == 0 {
            return Err(ConfigError::Message(
                "realtime capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
