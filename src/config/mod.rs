use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::risk::ScalerFit;

/// Distinguishes runtime behavior for different stages of the tool.
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
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
    pub training: TrainingSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let directory = env::var("CREDIT_RISK_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".credit-risk"));

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let seed = match env::var("CREDIT_RISK_SEED") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidSeed(raw))?,
            ),
            Err(_) => None,
        };

        let scaler_fit = match env::var("CREDIT_RISK_SCALER_FIT") {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "train" | "train_split" => ScalerFit::TrainSplit,
                "full" | "full_dataset" => ScalerFit::FullDataset,
                _ => return Err(ConfigError::InvalidScalerFit(raw)),
            },
            Err(_) => ScalerFit::default(),
        };

        Ok(Self {
            environment,
            storage: StorageConfig { directory },
            telemetry: TelemetryConfig { log_level },
            training: TrainingSettings { seed, scaler_fit },
        })
    }
}

/// Where the model and metrics blobs live between runs.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub directory: PathBuf,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSettings {
    pub seed: Option<u64>,
    pub scaler_fit: ScalerFit,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSeed(String),
    InvalidScalerFit(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSeed(value) => {
                write!(f, "CREDIT_RISK_SEED must be a valid u64, got '{value}'")
            }
            ConfigError::InvalidScalerFit(value) => write!(
                f,
                "CREDIT_RISK_SCALER_FIT must be 'train' or 'full', got '{value}'"
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
        env::remove_var("CREDIT_RISK_STORE_DIR");
        env::remove_var("CREDIT_RISK_SEED");
        env::remove_var("CREDIT_RISK_SCALER_FIT");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.storage.directory, PathBuf::from(".credit-risk"));
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.training.seed, None);
        assert_eq!(config.training.scaler_fit, ScalerFit::TrainSplit);
    }

    #[test]
    fn reads_training_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "ci");
        env::set_var("CREDIT_RISK_SEED", "42");
        env::set_var("CREDIT_RISK_SCALER_FIT", "full");
        let config = AppConfig::load().expect("config loads");
        reset_env();
        assert_eq!(config.environment, AppEnvironment::Test);
        assert_eq!(config.training.seed, Some(42));
        assert_eq!(config.training.scaler_fit, ScalerFit::FullDataset);
    }

    #[test]
    fn rejects_malformed_seed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CREDIT_RISK_SEED", "forty-two");
        let result = AppConfig::load();
        reset_env();
        match result {
            Err(ConfigError::InvalidSeed(value)) => assert_eq!(value, "forty-two"),
            other => panic!("expected invalid seed error, got {other:?}"),
        }
    }
}
