use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::lottery::MAX_SEED;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub lottery: LotteryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = env::var("APP_LOG_FORMAT")
            .map(|value| LogFormat::from_str(&value))
            .unwrap_or_default();

        let data_path = env::var("LOTTERY_DATA")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let seed = match env::var("LOTTERY_SEED") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_seed(&raw)?),
            _ => None,
        };

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level, format },
            lottery: LotteryConfig { data_path, seed },
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Line layout for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One terse line per event, without targets.
    #[default]
    Compact,
    /// Targets and thread names included; useful when `run-all` interleaves groups.
    Full,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" | "verbose" => Self::Full,
            _ => Self::Compact,
        }
    }
}

/// Where lottery data lives and whether runs use a pinned seed.
#[derive(Debug, Clone, Default)]
pub struct LotteryConfig {
    pub data_path: Option<PathBuf>,
    /// Fixed seed for every run. Leave unset in production so each run draws a fresh one.
    pub seed: Option<u64>,
}

fn parse_seed(raw: &str) -> Result<u64, ConfigError> {
    let value = raw.trim();
    match value.parse::<u64>() {
        Ok(seed) if seed <= MAX_SEED => Ok(seed),
        _ => Err(ConfigError::InvalidSeed {
            value: value.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSeed { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSeed { value } => write!(
                f,
                "LOTTERY_SEED must be an integer between 0 and {MAX_SEED}, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("APP_LOG_FORMAT");
        env::remove_var("LOTTERY_DATA");
        env::remove_var("LOTTERY_SEED");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert!(config.lottery.data_path.is_none());
        assert!(config.lottery.seed.is_none());
    }

    #[test]
    fn reads_seed_and_data_path() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "ci");
        env::set_var("APP_LOG_FORMAT", "Full");
        env::set_var("LOTTERY_SEED", " 42 ");
        env::set_var("LOTTERY_DATA", "/tmp/lottery.json");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Test);
        assert_eq!(config.telemetry.format, LogFormat::Full);
        assert_eq!(config.lottery.seed, Some(42));
        assert_eq!(
            config.lottery.data_path,
            Some(PathBuf::from("/tmp/lottery.json"))
        );
        reset_env();
    }

    #[test]
    fn rejects_seed_outside_engine_range() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LOTTERY_SEED", "2147483647");
        match AppConfig::load() {
            Err(ConfigError::InvalidSeed { value }) => assert_eq!(value, "2147483647"),
            other => panic!("expected invalid seed, got {other:?}"),
        }
        env::set_var("LOTTERY_SEED", "-3");
        assert!(AppConfig::load().is_err());
        reset_env();
    }
}
