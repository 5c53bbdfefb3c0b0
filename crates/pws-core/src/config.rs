use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

const APP_DIR: &str = "pws";
const CONFIG_FILE: &str = "config.toml";

pub const ENV_STATION_ID: &str = "PWS_STATION_ID";
pub const ENV_API_KEY: &str = "PWS_API_KEY";
pub const ENV_FORECAST_API_KEY: &str = "PWS_FORECAST_API_KEY";

const UNIT_CODES: [&str; 4] = ["e", "m", "h", "s"];

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory the configuration was loaded from
    #[serde(skip, default = "default_config_dir")]
    pub config_dir: PathBuf,

    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Weather Company station ID, e.g. `IMELLE12`
    pub id: String,
    pub api_key: String,
    /// Key for the forecast endpoint if it differs from `api_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_api_key: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Unit system code: `e`, `m`, `h` or `s`
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// IANA timezone of the station, e.g. `Europe/Berlin`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

fn default_units() -> String {
    "m".to_string()
}

fn default_language() -> String {
    "de-DE".to_string()
}

impl StationConfig {
    /// Check if credentials are configured (not placeholders)
    pub fn is_configured(&self) -> bool {
        !is_placeholder(&self.id) && !is_placeholder(&self.api_key)
    }

    /// Parsed station timezone, if set and valid.
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone.as_deref().and_then(|tz| tz.parse().ok())
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            id: "YOUR_STATION_ID".to_string(),
            api_key: "YOUR_WEATHER_API_KEY".to_string(),
            forecast_api_key: None,
            latitude: 0.0,
            longitude: 0.0,
            units: default_units(),
            language: default_language(),
            timezone: None,
        }
    }
}

// Keys stay out of logs
impl std::fmt::Debug for StationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationConfig")
            .field("id", &self.id)
            .field("api_key", &"<redacted>")
            .field("latitude", &self.latitude)
            .field("longitude", &self.longitude)
            .field("units", &self.units)
            .field("language", &self.language)
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
    /// Current conditions poll period (default: 60)
    #[serde(default = "default_current_interval")]
    pub current_interval_secs: u64,
    /// Forecast poll period (default: 300)
    #[serde(default = "default_forecast_interval")]
    pub forecast_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_auto_refresh() -> bool {
    true
}

fn default_current_interval() -> u64 {
    60
}

fn default_forecast_interval() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto_refresh: default_auto_refresh(),
            current_interval_secs: default_current_interval(),
            forecast_interval_secs: default_forecast_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://api.weather.com".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Settings screens ship `YOUR_STATION_ID` / `YOUR_WEATHER_API_KEY` until edited.
const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// True for empty values and unedited `YOUR_...` placeholders.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.starts_with(PLACEHOLDER_PREFIX)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            station: StationConfig::default(),
            refresh: RefreshConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load `<config_dir>/pws/config.toml`, creating it with defaults if missing.
    ///
    /// Environment overrides are applied on top and never written back.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path, creating it with defaults if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if !path.exists() {
            let config = Self {
                config_dir,
                ..Self::default()
            };
            config.save()?;
            tracing::info!(path = %path.display(), "Created default configuration");
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;
        config.config_dir = config_dir;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load()?.into_validated()
    }

    fn into_validated(self) -> Result<(Self, ValidationResult)> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Replace credentials with values from `PWS_*` variables when present.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty(ENV_STATION_ID) {
            self.station.id = id;
        }
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.station.api_key = key;
        }
        if let Some(key) = non_empty(ENV_FORECAST_API_KEY) {
            self.station.forecast_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        if !self.station.is_configured() {
            result.add_warning(
                "station",
                "Station ID or API key not configured - no data will be fetched",
            );
        }

        if !UNIT_CODES.contains(&self.station.units.as_str()) {
            result.add_error(
                "station.units",
                format!(
                    "Unknown unit system '{}', expected one of e, m, h, s",
                    self.station.units
                ),
            );
        }

        let (lat, lon) = (self.station.latitude, self.station.longitude);
        if !(-90.0..=90.0).contains(&lat) {
            result.add_error("station.latitude", "Latitude must be between -90 and 90");
        }
        if !(-180.0..=180.0).contains(&lon) {
            result.add_error("station.longitude", "Longitude must be between -180 and 180");
        }
        if lat == 0.0 && lon == 0.0 {
            result.add_warning(
                "station.latitude",
                "Coordinates not configured - forecast will be unavailable",
            );
        }

        if let Some(tz) = &self.station.timezone {
            if tz.parse::<Tz>().is_err() {
                result.add_error("station.timezone", format!("Unknown timezone: {}", tz));
            }
        }

        if self.refresh.current_interval_secs == 0 {
            result.add_error(
                "refresh.current_interval_secs",
                "Interval must be greater than 0",
            );
        }
        if self.refresh.forecast_interval_secs == 0 {
            result.add_error(
                "refresh.forecast_interval_secs",
                "Interval must be greater than 0",
            );
        }
        if self.refresh.request_timeout_secs == 0 {
            result.add_error(
                "refresh.request_timeout_secs",
                "Timeout must be greater than 0",
            );
        } else if self.refresh.request_timeout_secs > self.refresh.current_interval_secs {
            result.add_warning(
                "refresh.request_timeout_secs",
                "Request timeout is longer than the current-conditions interval",
            );
        }

        if !self.refresh.auto_refresh {
            result.add_warning("refresh.auto_refresh", "Automatic refresh is disabled");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `config_dir`
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(self.config_dir.join(CONFIG_FILE), contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("no platform config directory".into()))?
            .join(APP_DIR);

        Ok(config_dir.join(CONFIG_FILE))
    }
}
