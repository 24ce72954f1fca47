//! Weather observation and forecast models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    /// Returned by the live weather provider
    Live,
    /// Synthesized from the latitude band
    Estimated,
}

impl fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationSource::Live => f.write_str("live"),
            ObservationSource::Estimated => f.write_str("estimated"),
        }
    }
}

/// Current weather at one location
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherObservation {
    /// Temperature in Celsius
    pub temperature: f64,
    /// Feels-like temperature in Celsius
    pub apparent_temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// Wind speed in km/h
    pub wind_speed_kmh: f64,
    /// Human-readable description of conditions
    pub description: String,
    /// City/region label, or literal coordinates when unknown
    pub location_label: String,
    /// Country, when the provider reports one
    pub country: Option<String>,
    /// When the provider last updated this observation
    pub timestamp: DateTime<Utc>,
    pub source: ObservationSource,
    /// Fetched without TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
}

impl WeatherObservation {
    #[must_use]
    pub fn is_estimated(&self) -> bool {
        self.source == ObservationSource::Estimated
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temperature)
    }

    /// Format feels-like temperature with unit
    #[must_use]
    pub fn format_apparent_temperature(&self) -> String {
        format!("{:.1}°C", self.apparent_temperature)
    }

    /// Format wind information
    #[must_use]
    pub fn format_wind(&self) -> String {
        format!("{:.1} km/h", self.wind_speed_kmh)
    }
}

/// One hour of the short-range forecast
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HourlyForecast {
    pub time: DateTime<Utc>,
    /// Local wall-clock label as reported by the provider ("HH:MM")
    pub hour_label: String,
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub description: String,
    pub humidity: f64,
    pub wind_speed_kmh: f64,
    /// Chance of rain in percent
    pub chance_of_rain: u8,
    #[serde(default)]
    pub insecure: bool,
}
