use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compliance::ComplianceConfig;
use crate::scanner::ScannerConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub compliance: ComplianceConfig,
    pub scanner: ScannerConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Minutes between scan cycles.
    pub interval_minutes: u64,
    /// When false the runner scans and reports without acting.
    pub execute: bool,
    /// Restrict cycles to one organization; `None` scans all.
    pub organization: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub organization: Option<String>,
    pub execute: Option<bool>,
    pub interval_minutes: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cadence.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            compliance: ComplianceConfig::default(),
            scanner: ScannerConfig::default(),
            scheduler: SchedulerConfig {
                interval_minutes: 15,
                execute: true,
                organization: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cadence.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(compliance) = patch.compliance {
            if let Some(window_start_hour) = compliance.window_start_hour {
                self.compliance.window_start_hour = window_start_hour;
            }
            if let Some(window_end_hour) = compliance.window_end_hour {
                self.compliance.window_end_hour = window_end_hour;
            }
            if let Some(daily_message_cap) = compliance.daily_message_cap {
                self.compliance.daily_message_cap = daily_message_cap;
            }
            if let Some(default_timezone) = compliance.default_timezone {
                self.compliance.default_timezone = default_timezone;
            }
            if let Some(excluded_stages) = compliance.excluded_stages {
                self.compliance.excluded_stages = excluded_stages;
            }
        }

        if let Some(scanner) = patch.scanner {
            if let Some(batch_size) = scanner.batch_size {
                self.scanner.batch_size = batch_size;
            }
            if let Some(run_ceiling) = scanner.run_ceiling {
                self.scanner.run_ceiling = run_ceiling;
            }
            if let Some(silent_after_hours) = scanner.silent_after_hours {
                self.scanner.silent_after_hours = silent_after_hours;
            }
            if let Some(dormant_after_days) = scanner.dormant_after_days {
                self.scanner.dormant_after_days = dormant_after_days;
            }
            if let Some(revival_after_days) = scanner.revival_after_days {
                self.scanner.revival_after_days = revival_after_days;
            }
            if let Some(stale_handoff_after_hours) = scanner.stale_handoff_after_hours {
                self.scanner.stale_handoff_after_hours = stale_handoff_after_hours;
            }
        }

        if let Some(scheduler) = patch.scheduler {
            if let Some(interval_minutes) = scheduler.interval_minutes {
                self.scheduler.interval_minutes = interval_minutes;
            }
            if let Some(execute) = scheduler.execute {
                self.scheduler.execute = execute;
            }
            if let Some(organization) = scheduler.organization {
                self.scheduler.organization = Some(organization);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CADENCE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CADENCE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CADENCE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CADENCE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CADENCE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CADENCE_COMPLIANCE_WINDOW_START_HOUR") {
            self.compliance.window_start_hour =
                parse_u32("CADENCE_COMPLIANCE_WINDOW_START_HOUR", &value)?;
        }
        if let Some(value) = read_env("CADENCE_COMPLIANCE_WINDOW_END_HOUR") {
            self.compliance.window_end_hour =
                parse_u32("CADENCE_COMPLIANCE_WINDOW_END_HOUR", &value)?;
        }
        if let Some(value) = read_env("CADENCE_COMPLIANCE_DAILY_CAP") {
            self.compliance.daily_message_cap = parse_u32("CADENCE_COMPLIANCE_DAILY_CAP", &value)?;
        }
        if let Some(value) = read_env("CADENCE_COMPLIANCE_DEFAULT_TIMEZONE") {
            self.compliance.default_timezone = value;
        }

        if let Some(value) = read_env("CADENCE_SCANNER_BATCH_SIZE") {
            self.scanner.batch_size = parse_usize("CADENCE_SCANNER_BATCH_SIZE", &value)?;
        }
        if let Some(value) = read_env("CADENCE_SCANNER_RUN_CEILING") {
            self.scanner.run_ceiling = parse_usize("CADENCE_SCANNER_RUN_CEILING", &value)?;
        }

        if let Some(value) = read_env("CADENCE_SCHEDULER_INTERVAL_MINUTES") {
            self.scheduler.interval_minutes =
                parse_u64("CADENCE_SCHEDULER_INTERVAL_MINUTES", &value)?;
        }
        if let Some(value) = read_env("CADENCE_SCHEDULER_EXECUTE") {
            self.scheduler.execute = parse_bool("CADENCE_SCHEDULER_EXECUTE", &value)?;
        }
        if let Some(value) = read_env("CADENCE_SCHEDULER_ORGANIZATION") {
            self.scheduler.organization = Some(value);
        }

        let log_level =
            read_env("CADENCE_LOGGING_LEVEL").or_else(|| read_env("CADENCE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CADENCE_LOGGING_FORMAT").or_else(|| read_env("CADENCE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(organization) = overrides.organization {
            self.scheduler.organization = Some(organization);
        }
        if let Some(execute) = overrides.execute {
            self.scheduler.execute = execute;
        }
        if let Some(interval_minutes) = overrides.interval_minutes {
            self.scheduler.interval_minutes = interval_minutes;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_compliance(&self.compliance)?;
        validate_scanner(&self.scanner)?;
        validate_scheduler(&self.scheduler)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cadence.toml"), PathBuf::from("config/cadence.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_compliance(compliance: &ComplianceConfig) -> Result<(), ConfigError> {
    if compliance.window_end_hour > 24 {
        return Err(ConfigError::Validation(
            "compliance.window_end_hour must be at most 24".to_string(),
        ));
    }
    if compliance.window_start_hour >= compliance.window_end_hour {
        return Err(ConfigError::Validation(
            "compliance.window_start_hour must be before compliance.window_end_hour".to_string(),
        ));
    }
    if compliance.daily_message_cap == 0 {
        return Err(ConfigError::Validation(
            "compliance.daily_message_cap must be greater than zero".to_string(),
        ));
    }
    if compliance.default_timezone.parse::<Tz>().is_err() {
        return Err(ConfigError::Validation(format!(
            "compliance.default_timezone `{}` is not a known IANA timezone",
            compliance.default_timezone
        )));
    }

    Ok(())
}

fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
    if scanner.batch_size == 0 {
        return Err(ConfigError::Validation(
            "scanner.batch_size must be greater than zero".to_string(),
        ));
    }
    if scanner.run_ceiling == 0 {
        return Err(ConfigError::Validation(
            "scanner.run_ceiling must be greater than zero".to_string(),
        ));
    }
    if scanner.silent_after_hours <= 0 || scanner.stale_handoff_after_hours <= 0 {
        return Err(ConfigError::Validation(
            "scanner silence and stale-handoff thresholds must be positive".to_string(),
        ));
    }
    if scanner.dormant_after_days <= 0 || scanner.dormant_after_days >= scanner.revival_after_days {
        return Err(ConfigError::Validation(
            "scanner.dormant_after_days must be positive and below scanner.revival_after_days"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduler(scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
    if scheduler.interval_minutes == 0 {
        return Err(ConfigError::Validation(
            "scheduler.interval_minutes must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    compliance: Option<CompliancePatch>,
    scanner: Option<ScannerPatch>,
    scheduler: Option<SchedulerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CompliancePatch {
    window_start_hour: Option<u32>,
    window_end_hour: Option<u32>,
    daily_message_cap: Option<u32>,
    default_timezone: Option<String>,
    excluded_stages: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ScannerPatch {
    batch_size: Option<usize>,
    run_ceiling: Option<usize>,
    silent_after_hours: Option<i64>,
    dormant_after_days: Option<i64>,
    revival_after_days: Option<i64>,
    stale_handoff_after_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerPatch {
    interval_minutes: Option<u64>,
    execute: Option<bool>,
    organization: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
