//! Current conditions and short-range forecast
//!
//! [`WeatherProvider::observe`] never fails: any problem with the live call
//! (no key, network, bad status, malformed body) yields an estimate derived
//! from the latitude band instead.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::cascade::Failure;
use crate::http::{FetchOptions, HttpError, RetryingHttpClient};
use crate::models::{Coordinates, HourlyForecast, ObservationSource, WeatherObservation};

pub mod weatherapi;

pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";
pub const DEFAULT_FORECAST_HOURS: usize = 8;

const BASELINE_TEMPERATURE: f64 = 23.5;
const BASELINE_HUMIDITY: f64 = 65.0;
const BASELINE_WIND_KMH: f64 = 15.2;
const BASELINE_DESCRIPTION: &str = "partly cloudy";

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("no weather API key configured")]
    MissingApiKey,

    #[error("weather request failed: {0}")]
    Http(#[from] HttpError),

    #[error("weather response is missing {0}")]
    Incomplete(&'static str),
}

impl From<WeatherError> for Failure {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::Incomplete(_) => Failure::IncompleteData(err.to_string()),
            WeatherError::MissingApiKey | WeatherError::Http(_) => {
                Failure::ProviderUnavailable(err.to_string())
            }
        }
    }
}

/// Climate estimate for a latitude, used when no live data is available
///
/// Starts from a fixed baseline; the latitude band then sets temperature and
/// condition. Apparent temperature equals temperature.
#[must_use]
pub fn estimate(coordinates: Coordinates, label: Option<&str>) -> WeatherObservation {
    let (temperature, description) = match coordinates.latitude {
        lat if lat < -30.0 => (18.0, "temperate"),
        lat if lat < -15.0 => (24.0, "tropical"),
        lat if lat.is_finite() => (28.0, "hot"),
        _ => (BASELINE_TEMPERATURE, BASELINE_DESCRIPTION),
    };

    WeatherObservation {
        temperature,
        apparent_temperature: temperature,
        humidity: BASELINE_HUMIDITY,
        wind_speed_kmh: BASELINE_WIND_KMH,
        description: description.to_string(),
        location_label: label.map_or_else(|| coordinates.format_coordinates(), str::to_string),
        country: None,
        timestamp: Utc::now(),
        source: ObservationSource::Estimated,
        insecure: false,
    }
}

/// `WeatherAPI` client with an offline fallback
pub struct WeatherProvider {
    http: RetryingHttpClient,
    api_key: Option<String>,
    base_url: String,
    options: FetchOptions,
    forecast_hours: usize,
}

impl WeatherProvider {
    #[must_use]
    pub fn new(
        http: RetryingHttpClient,
        api_key: Option<String>,
        base_url: &str,
        options: FetchOptions,
    ) -> Self {
        Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
            forecast_hours: DEFAULT_FORECAST_HOURS,
        }
    }

    #[must_use]
    pub fn with_forecast_hours(mut self, hours: usize) -> Self {
        self.forecast_hours = hours;
        self
    }

    /// Current conditions, live when possible, estimated otherwise
    pub async fn observe(&self, coordinates: Coordinates, label: Option<&str>) -> WeatherObservation {
        match self.current(coordinates, label).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!("Live weather unavailable ({}); using latitude estimate", e);
                estimate(coordinates, label)
            }
        }
    }

    /// Live conditions from `current.json`
    #[instrument(skip(self, label), fields(coordinates = %coordinates))]
    pub async fn current(
        &self,
        coordinates: Coordinates,
        label: Option<&str>,
    ) -> Result<WeatherObservation, WeatherError> {
        let url = self.url("current.json", coordinates, "")?;
        let fetched = self
            .http
            .get_json::<weatherapi::CurrentResponse>(&url, &self.options)
            .await?;
        if fetched.insecure {
            warn!("Weather data received over an unverified TLS connection");
        }

        let mut observation = fetched
            .body
            .into_observation(label)
            .ok_or(WeatherError::Incomplete("current conditions"))?;
        observation.insecure = fetched.insecure;
        debug!(
            "Live weather for {}: {} {}",
            observation.location_label,
            observation.format_temperature(),
            observation.description
        );
        Ok(observation)
    }

    /// The next hours of forecast starting at the current hour; empty on any failure
    pub async fn forecast(&self, coordinates: Coordinates, now: DateTime<Utc>) -> Vec<HourlyForecast> {
        match self.hourly(coordinates, now).await {
            Ok(hours) => hours,
            Err(e) => {
                warn!("Forecast unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Hourly forecast from `forecast.json` (two days, so late evenings still
    /// get a full window)
    #[instrument(skip(self), fields(coordinates = %coordinates))]
    pub async fn hourly(
        &self,
        coordinates: Coordinates,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyForecast>, WeatherError> {
        let url = self.url("forecast.json", coordinates, "&days=2")?;
        let fetched = self
            .http
            .get_json::<weatherapi::ForecastResponse>(&url, &self.options)
            .await?;

        let mut hours = fetched.body.next_hours(now, self.forecast_hours);
        for hour in &mut hours {
            hour.insecure = fetched.insecure;
        }
        debug!("Forecast returned {} hours", hours.len());
        Ok(hours)
    }

    fn url(&self, endpoint: &str, coordinates: Coordinates, extra: &str) -> Result<String, WeatherError> {
        let key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        Ok(format!(
            "{}/{}?key={}&q={}{}",
            self.base_url,
            endpoint,
            urlencoding::encode(key),
            urlencoding::encode(&coordinates.as_query()),
            extra
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Backoff;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAO_PAULO: Coordinates = Coordinates::new(-23.5505, -46.6333);

    fn provider(base_url: &str, key: Option<&str>) -> WeatherProvider {
        let http = RetryingHttpClient::new("smartclima-test", false).unwrap();
        let options = FetchOptions::new(Duration::from_secs(5), 0, Backoff::Fixed(Duration::ZERO));
        WeatherProvider::new(http, key.map(str::to_string), base_url, options)
    }

    #[rstest]
    #[case(-35.0, 18.0, "temperate")]
    #[case(-30.0, 24.0, "tropical")]
    #[case(-23.55, 24.0, "tropical")]
    #[case(-15.0, 28.0, "hot")]
    #[case(0.0, 28.0, "hot")]
    #[case(5.0, 28.0, "hot")]
    fn test_latitude_bands(#[case] lat: f64, #[case] temperature: f64, #[case] description: &str) {
        let observation = estimate(Coordinates::new(lat, -50.0), None);
        assert_eq!(observation.temperature, temperature);
        assert_eq!(observation.apparent_temperature, temperature);
        assert_eq!(observation.description, description);
        assert_eq!(observation.humidity, 65.0);
        assert_eq!(observation.wind_speed_kmh, 15.2);
        assert!(observation.is_estimated());
    }

    #[test]
    fn test_estimate_label() {
        assert_eq!(estimate(SAO_PAULO, Some("São Paulo, SP")).location_label, "São Paulo, SP");
        assert_eq!(estimate(SAO_PAULO, None).location_label, "-23.5505, -46.6333");
    }

    #[tokio::test]
    async fn test_live_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/current.json"))
            .and(query_param("key", "test-key"))
            .and(query_param("q", "-23.5505,-46.6333"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "location": {"name": "Sao Paulo", "region": "Sao Paulo", "country": "Brazil"},
                "current": {
                    "last_updated_epoch": 1_700_000_000,
                    "temp_c": 27.0,
                    "feelslike_c": 29.1,
                    "humidity": 48,
                    "wind_kph": 9.4,
                    "condition": {"text": "Sunny"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let observation = provider(&server.uri(), Some("test-key"))
            .observe(SAO_PAULO, None)
            .await;

        assert_eq!(observation.source, ObservationSource::Live);
        assert_eq!(observation.temperature, 27.0);
        assert_eq!(observation.apparent_temperature, 29.1);
        assert_eq!(observation.humidity, 48.0);
        assert_eq!(observation.description, "Sunny");
        assert_eq!(observation.location_label, "Sao Paulo");
        assert_eq!(observation.country.as_deref(), Some("Brazil"));
        assert!(!observation.insecure);
    }

    #[tokio::test]
    async fn test_unverified_tls_is_flagged_on_observation_and_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/current.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "location": {"name": "Manaus", "region": "Amazonas", "country": "Brazil"},
                "current": {
                    "temp_c": 31.0,
                    "humidity": 80,
                    "wind_kph": 5.0,
                    "condition": {"text": "Humid"}
                }
            })))
            .mount(&server)
            .await;
        let now = Utc::now();
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "forecast": {"forecastday": [{"hour": [{
                    "time_epoch": now.timestamp() + 3600,
                    "time": "2026-01-01 13:00",
                    "temp_c": 32.0,
                    "humidity": 75,
                    "wind_kph": 6.0,
                    "condition": {"text": "Cloudy"}
                }]}]}
            })))
            .mount(&server)
            .await;

        let options = FetchOptions::new(Duration::from_secs(5), 0, Backoff::Fixed(Duration::ZERO));
        let provider = WeatherProvider::new(
            crate::http::testing::untrusted_certificate_client(true),
            Some("test-key".into()),
            &server.uri(),
            options,
        );

        let observation = provider.observe(Coordinates::new(-3.1, -60.0), None).await;
        assert_eq!(observation.source, ObservationSource::Live);
        assert!(observation.insecure);

        let hours = provider.forecast(Coordinates::new(-3.1, -60.0), now).await;
        assert_eq!(hours.len(), 1);
        assert!(hours[0].insecure);
    }

    #[tokio::test]
    async fn test_missing_key_estimates_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let observation = provider(&server.uri(), None)
            .observe(Coordinates::new(-35.0, -58.0), None)
            .await;
        assert!(observation.is_estimated());
        assert_eq!(observation.temperature, 18.0);
        assert_eq!(observation.description, "temperate");
    }

    #[tokio::test]
    async fn test_rejected_key_estimates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 2006, "message": "API key is invalid."}
            })))
            .mount(&server)
            .await;

        let observation = provider(&server.uri(), Some("bad-key"))
            .observe(SAO_PAULO, Some("São Paulo, SP"))
            .await;
        assert!(observation.is_estimated());
        assert_eq!(observation.temperature, 24.0);
        assert_eq!(observation.location_label, "São Paulo, SP");
    }

    #[tokio::test]
    async fn test_forecast_starts_at_current_hour() {
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap().timestamp();
        let hours: Vec<_> = (0..48)
            .map(|h| {
                json!({
                    "time_epoch": base + h * 3600,
                    "time": format!("2024-01-{:02} {:02}:00", 15 + h / 24, h % 24),
                    "temp_c": 20.0 + h as f64 * 0.1,
                    "feelslike_c": 21.0,
                    "humidity": 70,
                    "wind_kph": 10.0,
                    "chance_of_rain": 35,
                    "condition": {"text": "Patchy rain possible"}
                })
            })
            .collect();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("days", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "forecast": {"forecastday": [
                    {"hour": hours[..24]},
                    {"hour": hours[24..]}
                ]}
            })))
            .mount(&server)
            .await;

        let now = Utc.with_ymd_and_hms(2024, 1, 15, 22, 40, 0).unwrap();
        let forecast = provider(&server.uri(), Some("test-key"))
            .forecast(SAO_PAULO, now)
            .await;

        assert_eq!(forecast.len(), DEFAULT_FORECAST_HOURS);
        assert_eq!(forecast[0].hour_label, "22:00");
        assert_eq!(forecast[2].hour_label, "00:00");
        assert_eq!(forecast[0].chance_of_rain, 35);
    }

    #[tokio::test]
    async fn test_forecast_failure_is_empty() {
        let forecast = provider("http://127.0.0.1:1", Some("test-key"))
            .forecast(SAO_PAULO, Utc::now())
            .await;
        assert!(forecast.is_empty());

        let forecast = provider("http://127.0.0.1:1", None)
            .forecast(SAO_PAULO, Utc::now())
            .await;
        assert!(forecast.is_empty());
    }
}
