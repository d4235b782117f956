use crate::workflows::placement::eligibility::{EligibilitySchema, UnknownFieldPolicy};
use crate::workflows::placement::report::ReportFormat;
use crate::workflows::placement::slots::{CollisionPolicy, SlotCalendar, SlotError};
use chrono::NaiveDate;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

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
    pub placement: PlacementConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            placement: PlacementConfig::from_env()?,
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Inputs, outputs, and policy dials for a placement run.
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    pub roster_path: PathBuf,
    pub criteria_dir: PathBuf,
    pub report_dir: PathBuf,
    pub report_format: ReportFormat,
    pub fetch_timeout: Duration,
    pub calendar_start: NaiveDate,
    pub calendar_days: u32,
    pub exam_times: Vec<String>,
    pub collision_policy: CollisionPolicy,
    pub numeric_fields: Vec<String>,
    pub categorical_fields: Vec<String>,
    pub unknown_fields: UnknownFieldPolicy,
}

const DEFAULT_EXAM_TIMES: [&str; 3] = ["09:00 AM", "01:00 PM", "04:00 PM"];

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            roster_path: PathBuf::from("students.csv"),
            criteria_dir: PathBuf::from("criteria"),
            report_dir: env::temp_dir().join("reports"),
            report_format: ReportFormat::Csv,
            fetch_timeout: Duration::from_secs(10),
            calendar_start: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap_or_default(),
            calendar_days: 30,
            exam_times: DEFAULT_EXAM_TIMES.iter().map(|t| t.to_string()).collect(),
            collision_policy: CollisionPolicy::Wrap,
            numeric_fields: vec!["cgpa".to_string()],
            categorical_fields: vec!["place".to_string(), "sex".to_string()],
            unknown_fields: UnknownFieldPolicy::Ignore,
        }
    }
}

impl PlacementConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let fetch_timeout = match env::var("PLACEMENT_FETCH_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(parse_setting("PLACEMENT_FETCH_TIMEOUT_SECS", &raw)?),
            Err(_) => defaults.fetch_timeout,
        };
        let calendar_start = match env::var("PLACEMENT_CALENDAR_START") {
            Ok(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue {
                    key: "PLACEMENT_CALENDAR_START",
                    value: raw.clone(),
                }
            })?,
            Err(_) => defaults.calendar_start,
        };

        Ok(Self {
            roster_path: env::var("PLACEMENT_ROSTER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.roster_path),
            criteria_dir: env::var("PLACEMENT_CRITERIA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.criteria_dir),
            report_dir: env::var("PLACEMENT_REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
            report_format: env_setting("PLACEMENT_REPORT_FORMAT", defaults.report_format)?,
            fetch_timeout,
            calendar_start,
            calendar_days: env_setting("PLACEMENT_CALENDAR_DAYS", defaults.calendar_days)?,
            exam_times: env::var("PLACEMENT_EXAM_TIMES")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.exam_times),
            collision_policy: env_setting(
                "PLACEMENT_COLLISION_POLICY",
                defaults.collision_policy,
            )?,
            numeric_fields: env::var("PLACEMENT_NUMERIC_FIELDS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.numeric_fields),
            categorical_fields: env::var("PLACEMENT_CATEGORICAL_FIELDS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.categorical_fields),
            unknown_fields: env_setting("PLACEMENT_UNKNOWN_FIELDS", defaults.unknown_fields)?,
        })
    }

    pub fn calendar(&self) -> Result<SlotCalendar, SlotError> {
        SlotCalendar::consecutive(
            self.calendar_start,
            self.calendar_days,
            self.exam_times.clone(),
        )
    }

    pub fn schema(&self) -> EligibilitySchema {
        EligibilitySchema::new(self.numeric_fields.as_slice(), self.categorical_fields.as_slice())
            .with_unknown_fields(self.unknown_fields)
    }
}

/// Splits a comma separated setting, trimming and dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_setting<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_setting(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_setting<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an unsupported value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
