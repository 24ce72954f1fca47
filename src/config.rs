//! Configuration management for the `SmartClima` application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::SmartClimaError;
use crate::http::{Backoff, FetchOptions};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Root configuration structure for the `SmartClima` application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartClimaConfig {
    /// Weather API configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Generative advisory provider
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    /// Postal-code providers
    #[serde(default)]
    pub postal: PostalConfig,
    /// Shared HTTP client behaviour
    #[serde(default)]
    pub http: HttpConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Problems found while loading, reported once logging is up
    #[serde(skip)]
    pub warnings: Vec<String>,
}

const API_KEY_LENGTH: std::ops::RangeInclusive<usize> = 8..=200;

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// `WeatherAPI` key; without one, observations are estimated
    pub api_key: Option<String>,
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// Hours of forecast to fetch
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: u32,
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_weather_max_retries")]
    pub max_retries: u32,
}

/// Generative advisory configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Chat-completions key; without one, the rule engine answers
    pub api_key: Option<String>,
    #[serde(default = "default_advisory_base_url")]
    pub base_url: String,
    #[serde(default = "default_advisory_model")]
    pub model: String,
    #[serde(default = "default_advisory_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_advisory_max_retries")]
    pub max_retries: u32,
}

/// Postal provider configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostalConfig {
    /// Base URL overrides, keyed by provider
    pub viacep_url: Option<String>,
    pub apicep_url: Option<String>,
    pub brasilapi_url: Option<String>,
    #[serde(default = "default_postal_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_postal_max_retries")]
    pub max_retries: u32,
}

/// HTTP client settings shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Retry once without certificate verification on TLS failures
    #[serde(default = "default_true")]
    pub allow_insecure_fallback: bool,
    /// "fixed" or "exponential"
    #[serde(default = "default_backoff")]
    pub backoff: String,
    /// Fixed delay, or lower bound of the exponential delay
    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,
    /// Upper bound of the exponential delay
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache directory; empty means the platform cache directory
    #[serde(default)]
    pub location: String,
    /// How long a resolved postal address stays valid
    #[serde(default = "default_postal_ttl")]
    pub postal_ttl_hours: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, json or compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_weather_base_url() -> String {
    crate::weather::DEFAULT_BASE_URL.to_string()
}

fn default_forecast_hours() -> u32 {
    8
}

fn default_weather_timeout() -> u32 {
    10
}

fn default_weather_max_retries() -> u32 {
    2
}

fn default_advisory_base_url() -> String {
    crate::advisory::openai::DEFAULT_BASE_URL.to_string()
}

fn default_advisory_model() -> String {
    crate::advisory::openai::DEFAULT_MODEL.to_string()
}

fn default_advisory_timeout() -> u32 {
    30
}

fn default_advisory_max_retries() -> u32 {
    1
}

fn default_postal_timeout() -> u32 {
    5
}

fn default_postal_max_retries() -> u32 {
    1
}

fn default_user_agent() -> String {
    format!("smartclima/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_backoff() -> String {
    "exponential".to_string()
}

fn default_backoff_min_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    4000
}

fn default_postal_ttl() -> u32 {
    720
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            forecast_hours: default_forecast_hours(),
            timeout_seconds: default_weather_timeout(),
            max_retries: default_weather_max_retries(),
        }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_advisory_base_url(),
            model: default_advisory_model(),
            timeout_seconds: default_advisory_timeout(),
            max_retries: default_advisory_max_retries(),
        }
    }
}

impl Default for PostalConfig {
    fn default() -> Self {
        Self {
            viacep_url: None,
            apicep_url: None,
            brasilapi_url: None,
            timeout_seconds: default_postal_timeout(),
            max_retries: default_postal_max_retries(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            allow_insecure_fallback: true,
            backoff: default_backoff(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location: String::new(),
            postal_ttl_hours: default_postal_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        let min = Duration::from_millis(self.backoff_min_ms);
        match self.backoff.as_str() {
            "fixed" => Backoff::Fixed(min),
            _ => Backoff::exponential(min, Duration::from_millis(self.backoff_max_ms)),
        }
    }

    #[must_use]
    pub fn fetch_options(&self, timeout_seconds: u32, max_retries: u32) -> FetchOptions {
        FetchOptions::new(
            Duration::from_secs(u64::from(timeout_seconds)),
            max_retries,
            self.backoff(),
        )
    }
}

impl SmartClimaConfig {
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let explicit = config_path.is_some();
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if explicit || config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(explicit)
                    .format(config::FileFormat::Toml),
            );
        }

        // SMARTCLIMA_WEATHER__API_KEY, SMARTCLIMA_CACHE__ENABLED, ...
        builder = builder.add_source(
            Environment::with_prefix("SMARTCLIMA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| format!("Failed to build configuration from {}", config_file.display()))?;

        let mut config: SmartClimaConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_env_keys();
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("smartclima").join("config.toml"))
    }

    /// Directory for the persistent cache
    #[must_use]
    pub fn cache_path(&self) -> Option<PathBuf> {
        let location = self.cache.location.trim();
        if location.is_empty() {
            return dirs::cache_dir().map(|dir| dir.join("smartclima"));
        }
        match location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None => Some(PathBuf::from(location)),
        }
    }

    /// Honour the conventional `WEATHER_API_KEY` / `OPENAI_API_KEY` variables
    fn apply_env_keys(&mut self) {
        let from_env = |name: &str| std::env::var(name).ok();
        if self.weather.api_key.is_none() {
            self.weather.api_key = from_env("WEATHER_API_KEY");
        }
        if self.advisory.api_key.is_none() {
            self.advisory.api_key = from_env("OPENAI_API_KEY");
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        // A blank or implausible key means "not configured"
        let keys = [
            ("Weather", &mut self.weather.api_key),
            ("Advisory", &mut self.advisory.api_key),
        ];
        for (name, key) in keys {
            let Some(len) = key.as_deref().map(|k| k.trim().len()) else {
                continue;
            };
            if len == 0 {
                *key = None;
            } else if !API_KEY_LENGTH.contains(&len) {
                let warning = format!(
                    "{name} API key ignored: {len} characters is outside {}..={}; using the offline fallback",
                    API_KEY_LENGTH.start(),
                    API_KEY_LENGTH.end()
                );
                warn!("{}", warning);
                self.warnings.push(warning);
                *key = None;
            }
        }
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.weather.forecast_hours == 0 {
            self.weather.forecast_hours = default_forecast_hours();
        }
        if self.advisory.base_url.is_empty() {
            self.advisory.base_url = default_advisory_base_url();
        }
        if self.advisory.model.is_empty() {
            self.advisory.model = default_advisory_model();
        }
        if self.advisory.timeout_seconds == 0 {
            self.advisory.timeout_seconds = default_advisory_timeout();
        }
        if self.postal.timeout_seconds == 0 {
            self.postal.timeout_seconds = default_postal_timeout();
        }
        if self.http.user_agent.is_empty() {
            self.http.user_agent = default_user_agent();
        }
        if self.cache.postal_ttl_hours == 0 {
            self.cache.postal_ttl_hours = default_postal_ttl();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let timeouts = [
            ("Weather", self.weather.timeout_seconds),
            ("Advisory", self.advisory.timeout_seconds),
            ("Postal", self.postal.timeout_seconds),
        ];
        for (name, timeout) in timeouts {
            if timeout > 300 {
                return Err(SmartClimaError::config(format!(
                    "{name} timeout cannot exceed 300 seconds"
                ))
                .into());
            }
        }

        let retries = [
            ("Weather", self.weather.max_retries),
            ("Advisory", self.advisory.max_retries),
            ("Postal", self.postal.max_retries),
        ];
        for (name, max_retries) in retries {
            if max_retries > 10 {
                return Err(SmartClimaError::config(format!(
                    "{name} max retries cannot exceed 10"
                ))
                .into());
            }
        }

        if self.weather.forecast_hours > 48 {
            return Err(SmartClimaError::config("Forecast hours cannot exceed 48").into());
        }

        if self.http.backoff_min_ms > self.http.backoff_max_ms {
            return Err(SmartClimaError::config(
                "HTTP backoff_min_ms cannot be greater than backoff_max_ms",
            )
            .into());
        }

        if self.http.backoff_max_ms > 60_000 {
            return Err(SmartClimaError::config("HTTP backoff cannot exceed 60000 ms").into());
        }

        if self.cache.postal_ttl_hours > 8760 {
            return Err(SmartClimaError::config(
                "Postal cache TTL cannot exceed 8760 hours (1 year)",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(SmartClimaError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json", "compact"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(SmartClimaError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let valid_backoffs = ["fixed", "exponential"];
        if !valid_backoffs.contains(&self.http.backoff.as_str()) {
            return Err(SmartClimaError::config(format!(
                "Invalid backoff '{}'. Must be one of: {}",
                self.http.backoff,
                valid_backoffs.join(", ")
            ))
            .into());
        }

        let urls = [
            ("Weather API base URL", Some(&self.weather.base_url)),
            ("Advisory base URL", Some(&self.advisory.base_url)),
            ("ViaCEP URL", self.postal.viacep_url.as_ref()),
            ("ApiCEP URL", self.postal.apicep_url.as_ref()),
            ("BrasilAPI URL", self.postal.brasilapi_url.as_ref()),
        ];
        for (name, url) in urls {
            let Some(url) = url else { continue };
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SmartClimaError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SmartClimaConfig::default();
        assert_eq!(config.weather.base_url, "https://api.weatherapi.com/v1");
        assert_eq!(config.weather.timeout_seconds, 10);
        assert_eq!(config.weather.forecast_hours, 8);
        assert_eq!(config.advisory.model, "gpt-3.5-turbo");
        assert_eq!(config.cache.postal_ttl_hours, 720);
        assert!(config.cache.enabled);
        assert!(config.http.allow_insecure_fallback);
        assert_eq!(config.logging.level, "info");
        assert!(config.weather.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_implausible_keys_fall_back_instead_of_failing() {
        let mut config = SmartClimaConfig::default();
        config.weather.api_key = Some("abc1234".to_string());
        config.advisory.api_key = Some("x".repeat(201));
        config.apply_defaults();

        assert!(config.weather.api_key.is_none());
        assert!(config.advisory.api_key.is_none());
        assert_eq!(config.warnings.len(), 2);
        assert!(config.warnings[0].starts_with("Weather API key ignored: 7 characters"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_plausible_key_is_kept() {
        let mut config = SmartClimaConfig::default();
        config.weather.api_key = Some("abcd1234".to_string());
        config.apply_defaults();
        assert_eq!(config.weather.api_key.as_deref(), Some("abcd1234"));
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_short_key_in_file_still_loads() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[weather]\napi_key = \"abc1234\"").unwrap();

        let config = SmartClimaConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert!(config.weather.api_key.is_none());
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn test_empty_key_means_unconfigured() {
        let mut config = SmartClimaConfig::default();
        config.weather.api_key = Some("  ".to_string());
        config.apply_defaults();
        assert!(config.weather.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = SmartClimaConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = SmartClimaConfig::default();
        config.postal.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = SmartClimaConfig::default();
        config.http.backoff_min_ms = 5000;
        config.http.backoff_max_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_urls() {
        let mut config = SmartClimaConfig::default();
        config.postal.viacep_url = Some("ftp://viacep.com.br".to_string());
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("ViaCEP URL"));
    }

    #[test]
    fn test_backoff_selection() {
        let mut http = HttpConfig::default();
        assert!(matches!(http.backoff(), Backoff::Exponential { .. }));

        http.backoff = "fixed".to_string();
        http.backoff_min_ms = 250;
        assert_eq!(http.backoff(), Backoff::Fixed(Duration::from_millis(250)));

        let options = http.fetch_options(7, 3);
        assert_eq!(options.timeout, Duration::from_secs(7));
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[weather]
api_key = "file-weather-key"
forecast_hours = 6

[postal]
viacep_url = "http://localhost:8080"
max_retries = 0

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = SmartClimaConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.weather.api_key.as_deref(), Some("file-weather-key"));
        assert_eq!(config.weather.forecast_hours, 6);
        assert_eq!(config.weather.timeout_seconds, 10);
        assert_eq!(config.postal.viacep_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.postal.max_retries, 0);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = SmartClimaConfig::load_from_path(Some(PathBuf::from(
            "/definitely/not/here/smartclima.toml",
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_cache_path() {
        let mut config = SmartClimaConfig::default();
        config.cache.location = "/tmp/smartclima-cache".to_string();
        assert_eq!(config.cache_path(), Some(PathBuf::from("/tmp/smartclima-cache")));
    }

    #[test]
    fn test_config_path_generation() {
        let path = SmartClimaConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("smartclima"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
