//! `WeatherAPI` response structures and conversion utilities

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{HourlyForecast, ObservationSource, WeatherObservation};

/// `current.json` response
#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    pub location: Option<LocationInfo>,
    pub current: Option<CurrentData>,
}

#[derive(Debug, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
}

impl LocationInfo {
    fn label(&self) -> String {
        if self.region.is_empty() || self.region == self.name {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.region)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrentData {
    pub last_updated_epoch: Option<i64>,
    pub temp_c: f64,
    pub feelslike_c: Option<f64>,
    pub humidity: f64,
    pub wind_kph: f64,
    pub condition: Condition,
}

/// `forecast.json` response
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub forecast: Option<ForecastData>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastData {
    #[serde(rename = "forecastday")]
    pub days: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastDay {
    #[serde(rename = "hour")]
    pub hours: Vec<HourData>,
}

#[derive(Debug, Deserialize)]
pub struct HourData {
    pub time_epoch: i64,
    /// Local time, "YYYY-MM-DD HH:MM"
    pub time: String,
    pub temp_c: f64,
    pub feelslike_c: Option<f64>,
    pub humidity: f64,
    pub wind_kph: f64,
    #[serde(default)]
    pub chance_of_rain: f64,
    pub condition: Condition,
}

impl CurrentResponse {
    /// Convert to an observation; `label` overrides the provider's place name
    pub fn into_observation(self, label: Option<&str>) -> Option<WeatherObservation> {
        let current = self.current?;
        let location = self.location;

        let location_label = match (label, &location) {
            (Some(label), _) => label.to_string(),
            (None, Some(info)) => info.label(),
            (None, None) => return None,
        };

        let timestamp = current
            .last_updated_epoch
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            .unwrap_or_else(Utc::now);

        Some(WeatherObservation {
            temperature: current.temp_c,
            apparent_temperature: current.feelslike_c.unwrap_or(current.temp_c),
            humidity: current.humidity,
            wind_speed_kmh: current.wind_kph,
            description: current.condition.text,
            location_label,
            country: location
                .map(|info| info.country)
                .filter(|country| !country.is_empty()),
            timestamp,
            source: ObservationSource::Live,
            insecure: false,
        })
    }
}

impl ForecastResponse {
    /// The next `count` hours starting at the hour containing `now`
    pub fn next_hours(self, now: DateTime<Utc>, count: usize) -> Vec<HourlyForecast> {
        let current_hour = now.timestamp() - now.timestamp().rem_euclid(3600);

        self.forecast
            .map(|forecast| forecast.days)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|day| day.hours)
            .filter(|hour| hour.time_epoch >= current_hour)
            .take(count)
            .filter_map(HourData::into_hourly)
            .collect()
    }
}

impl HourData {
    fn into_hourly(self) -> Option<HourlyForecast> {
        let time = DateTime::from_timestamp(self.time_epoch, 0)?;
        let hour_label = self
            .time
            .split_once(' ')
            .map_or_else(|| time.format("%H:%M").to_string(), |(_, hm)| hm.to_string());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let chance_of_rain = self.chance_of_rain.round().clamp(0.0, 100.0) as u8;

        Some(HourlyForecast {
            time,
            hour_label,
            temperature: self.temp_c,
            apparent_temperature: self.feelslike_c.unwrap_or(self.temp_c),
            description: self.condition.text,
            humidity: self.humidity,
            wind_speed_kmh: self.wind_kph,
            chance_of_rain,
            insecure: false,
        })
    }
}
