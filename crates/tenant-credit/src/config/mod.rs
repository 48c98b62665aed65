use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::credit::{ScoringConfig, ScoringConfigError, ScoringPreset};

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
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let ledger_path = env::var("CREDIT_LEDGER_PATH")
            .ok()
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { ledger_path },
            scoring: scoring_from_env()?,
        })
    }
}

/// Preset named by `CREDIT_SCORING_PRESET`, with per-coefficient overrides.
fn scoring_from_env() -> Result<ScoringConfig, ConfigError> {
    let preset = match env::var("CREDIT_SCORING_PRESET") {
        Ok(value) if !value.trim().is_empty() => {
            ScoringPreset::parse(&value).ok_or(ConfigError::UnknownPreset(value))?
        }
        _ => ScoringPreset::ThreeFactor,
    };

    let mut scoring = preset.config();
    if let Some(weight) = env_number::<f64>("CREDIT_WEIGHT_BUREAU")? {
        scoring.bureau_weight = weight;
    }
    if let Some(weight) = env_number::<f64>("CREDIT_WEIGHT_FINANCIAL")? {
        scoring.financial_weight = weight;
    }
    if let Some(weight) = env_number::<f64>("CREDIT_WEIGHT_GUARANTEE")? {
        scoring.guarantee_weight = weight;
    }
    if let Some(threshold) = env_number::<u8>("CREDIT_TIER_HIGH")? {
        scoring.high_threshold = threshold;
    }
    if let Some(threshold) = env_number::<u8>("CREDIT_TIER_MEDIUM")? {
        scoring.medium_threshold = threshold;
    }

    scoring.validate().map_err(ConfigError::Scoring)?;
    Ok(scoring)
}

fn env_number<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        _ => Ok(None),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where finalized cases are kept; `None` keeps them in memory only.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub ledger_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str, value: String },
    UnknownPreset(String),
    Scoring(ScoringConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be numeric (found '{value}')")
            }
            ConfigError::UnknownPreset(value) => write!(
                f,
                "CREDIT_SCORING_PRESET must be three_factor or two_factor (found '{value}')"
            ),
            ConfigError::Scoring(err) => write!(f, "invalid scoring configuration: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Scoring(err) => Some(err),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::UnknownPreset(_) => None,
        }
    }
}
