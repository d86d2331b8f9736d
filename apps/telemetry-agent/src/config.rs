//! Configuration (spec §6) — a read-only snapshot built once at startup from
//! CLI args, `.env`, and an optional TOML file, then validated into a single
//! immutable `Config` the Supervisor hands down to every component.
//!
//! Grounded in `original_source/.../settings_manager.py`'s `HerbieSettings`
//! group/field/default/range layout (API, Telemetry/Sampling,
//! LapValidation, RF2/Source, Logging), restructured from a persisted JSON
//! file into the teacher's CLI-args-plus-file `CliArgs`/`Config::load()`
//! split (`apps/client-rs/src/config.rs`).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Parser, Debug, Clone)]
#[command(name = "telemetry-agent")]
#[command(author = "Racing Telemetry Team")]
#[command(version)]
#[command(about = "Dual-rate telemetry sampling and batched upload agent for racing simulators")]
pub struct CliArgs {
    /// Path to an optional TOML config file layering over the defaults.
    #[arg(long, env = "TELEMETRY_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides the `logging.level` config key.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Mirrors the on-disk/`.env` TOML shape; every field optional so a partial
/// file only overrides what it names. Group names match spec §6 exactly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiFile,
    #[serde(default)]
    pub sampling: SamplingFile,
    #[serde(default)]
    pub validation: ValidationFile,
    #[serde(default)]
    pub source: SourceFile,
    #[serde(default)]
    pub logging: LoggingFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiFile {
    pub base_url: Option<String>,
    pub user_id: Option<String>,
    pub timeout_s: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_s: Option<f64>,
    pub batch_size: Option<usize>,
    /// Rate limiter call budget per 60s window. Defaults to `batch_size`
    /// (spec §4.7's intentional conflation; see DESIGN.md).
    pub requests_per_minute: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SamplingFile {
    pub physics_period_ms: Option<u64>,
    pub scoring_poll_period_ms: Option<u64>,
    pub scoring_periodic_s: Option<f64>,
    pub enable_collection: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationFile {
    pub min_points: Option<usize>,
    pub min_lap_time_s: Option<f64>,
    pub max_lap_time_s: Option<f64>,
    pub min_distance_percentage: Option<f32>,
    pub max_gap_s: Option<f64>,
    pub speed_outlier_threshold_kmh: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFile {
    pub access_mode: Option<u8>,
    pub process_id: Option<String>,
    pub player_override: Option<bool>,
    pub player_index: Option<u8>,
    pub char_encoding: Option<String>,
    pub replay_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingFile {
    pub level: Option<String>,
    pub file_logging: Option<bool>,
    pub max_log_size_bytes: Option<u64>,
    pub backup_count: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("base_url must start with http:// or https://, got {0}")]
    InvalidBaseUrl(String),
    #[error("timeout_s must be within 5-120, got {0}")]
    InvalidTimeout(u64),
    #[error("retry_attempts must be within 1-10, got {0}")]
    InvalidRetryAttempts(u32),
    #[error("batch_size must be within 10-1000, got {0}")]
    InvalidBatchSize(usize),
    #[error("requests_per_minute must be at least 1, got {0}")]
    InvalidRequestsPerMinute(usize),
    #[error("min_lap_time_s ({min}) must be less than max_lap_time_s ({max})")]
    LapTimeBoundsInverted { min: f64, max: f64 },
    #[error("failed to load config file {path}: {source}")]
    FileLoad { path: PathBuf, source: config::ConfigError },
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_id: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub batch_size: usize,
    pub requests_per_minute: usize,
}

#[derive(Debug, Clone)]
pub struct SamplingConfig {
    pub physics_period: Duration,
    pub scoring_poll_period: Duration,
    pub scoring_periodic: Duration,
    pub enable_collection: bool,
}

#[derive(Debug, Clone)]
pub struct ValidationSettingsConfig {
    pub min_points: usize,
    pub min_lap_time_s: f64,
    pub max_lap_time_s: f64,
    pub min_distance_percentage: f32,
    pub max_gap_s: f64,
    pub speed_outlier_threshold_kmh: f32,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub access_mode: u8,
    pub process_id: String,
    pub player_override: bool,
    pub player_index: u8,
    pub char_encoding: String,
    pub replay_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_logging: bool,
    pub max_log_size_bytes: u64,
    pub backup_count: u32,
}

/// The fully validated, immutable configuration snapshot every component
/// receives a reference to (spec §9: "injected configuration snapshot").
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub sampling: SamplingConfig,
    pub validation: ValidationSettingsConfig,
    pub source: SourceConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load `.env`, parse CLI args, layer an optional TOML file over the
    /// defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let args = CliArgs::parse();
        Self::from_args(args)
    }

    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => config::Config::builder()
                .add_source(config::File::from(path.as_path()))
                .build()
                .and_then(|built| built.try_deserialize())
                .map_err(|source| ConfigError::FileLoad {
                    path: path.clone(),
                    source,
                })?,
            None => ConfigFile::default(),
        };

        Self::from_file(file, args.log_level)
    }

    fn from_file(file: ConfigFile, log_level_override: Option<String>) -> Result<Self, ConfigError> {
        let base_url = file.api.base_url.unwrap_or_else(|| "http://localhost:8000".to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        let timeout_s = file.api.timeout_s.unwrap_or(30);
        if !(5..=120).contains(&timeout_s) {
            return Err(ConfigError::InvalidTimeout(timeout_s));
        }

        let retry_attempts = file.api.retry_attempts.unwrap_or(3);
        if !(1..=10).contains(&retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(retry_attempts));
        }

        let batch_size = file.api.batch_size.unwrap_or(100);
        if !(10..=1000).contains(&batch_size) {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }

        // Defaults to batch_size per spec §4.9's intentional conflation of
        // the two parameters; a distinct value may be supplied to separate
        // the upload batch size from the rate limiter's call budget.
        let requests_per_minute = file.api.requests_per_minute.unwrap_or(batch_size);
        if requests_per_minute < 1 {
            return Err(ConfigError::InvalidRequestsPerMinute(requests_per_minute));
        }

        let min_lap_time_s = file.validation.min_lap_time_s.unwrap_or(30.0);
        let max_lap_time_s = file.validation.max_lap_time_s.unwrap_or(300.0);
        if min_lap_time_s >= max_lap_time_s {
            return Err(ConfigError::LapTimeBoundsInverted {
                min: min_lap_time_s,
                max: max_lap_time_s,
            });
        }

        let level = log_level_override
            .or(file.logging.level)
            .unwrap_or_else(|| "INFO".to_string());
        let level_upper = level.to_uppercase();
        if !["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"].contains(&level_upper.as_str()) {
            return Err(ConfigError::InvalidLogLevel(level));
        }

        Ok(Config {
            api: ApiConfig {
                base_url,
                user_id: file.api.user_id.unwrap_or_default(),
                timeout: Duration::from_secs(timeout_s),
                retry_attempts,
                retry_delay: Duration::from_secs_f64(file.api.retry_delay_s.unwrap_or(1.0)),
                batch_size,
                requests_per_minute,
            },
            sampling: SamplingConfig {
                physics_period: Duration::from_millis(file.sampling.physics_period_ms.unwrap_or(11)),
                scoring_poll_period: Duration::from_millis(file.sampling.scoring_poll_period_ms.unwrap_or(50)),
                scoring_periodic: Duration::from_secs_f64(file.sampling.scoring_periodic_s.unwrap_or(1.0)),
                enable_collection: file.sampling.enable_collection.unwrap_or(true),
            },
            validation: ValidationSettingsConfig {
                min_points: file.validation.min_points.unwrap_or(100),
                min_lap_time_s,
                max_lap_time_s,
                min_distance_percentage: file.validation.min_distance_percentage.unwrap_or(80.0),
                max_gap_s: file.validation.max_gap_s.unwrap_or(2.0),
                speed_outlier_threshold_kmh: file.validation.speed_outlier_threshold_kmh.unwrap_or(400.0),
            },
            source: SourceConfig {
                access_mode: file.source.access_mode.unwrap_or(0),
                process_id: file.source.process_id.unwrap_or_default(),
                player_override: file.source.player_override.unwrap_or(false),
                player_index: file.source.player_index.unwrap_or(0),
                char_encoding: file.source.char_encoding.unwrap_or_else(|| "utf-8".to_string()),
                replay_file: file.source.replay_file,
            },
            logging: LoggingConfig {
                level: level_upper,
                file_logging: file.logging.file_logging.unwrap_or(false),
                max_log_size_bytes: file.logging.max_log_size_bytes.unwrap_or(10 * 1024 * 1024),
                backup_count: file.logging.backup_count.unwrap_or(5),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_spec_compliant() {
        let config = Config::from_file(ConfigFile::default(), None).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout, Duration::from_secs(30));
        assert_eq!(config.sampling.physics_period, Duration::from_millis(11));
        assert_eq!(config.validation.min_points, 100);
        assert_eq!(config.validation.min_lap_time_s, 30.0);
        assert_eq!(config.validation.max_lap_time_s, 300.0);
        assert_eq!(config.logging.level, "INFO");
        assert_eq!(config.api.requests_per_minute, config.api.batch_size);
    }

    #[test]
    fn requests_per_minute_can_be_set_independently_of_batch_size() {
        let mut file = ConfigFile::default();
        file.api.batch_size = Some(200);
        file.api.requests_per_minute = Some(60);
        let config = Config::from_file(file, None).unwrap();
        assert_eq!(config.api.batch_size, 200);
        assert_eq!(config.api.requests_per_minute, 60);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut file = ConfigFile::default();
        file.api.base_url = Some("ftp://example.com".into());
        assert!(matches!(
            Config::from_file(file, None),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn rejects_inverted_lap_time_bounds() {
        let mut file = ConfigFile::default();
        file.validation.min_lap_time_s = Some(400.0);
        file.validation.max_lap_time_s = Some(300.0);
        assert!(matches!(
            Config::from_file(file, None),
            Err(ConfigError::LapTimeBoundsInverted { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_retry_attempts() {
        let mut file = ConfigFile::default();
        file.api.retry_attempts = Some(20);
        assert!(matches!(
            Config::from_file(file, None),
            Err(ConfigError::InvalidRetryAttempts(20))
        ));
    }

    #[test]
    fn cli_log_level_override_wins_over_file() {
        let mut file = ConfigFile::default();
        file.logging.level = Some("warning".into());
        let config = Config::from_file(file, Some("debug".into())).unwrap();
        assert_eq!(config.logging.level, "DEBUG");
    }
}
