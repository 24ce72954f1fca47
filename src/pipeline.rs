//! Location → Weather → Forecast → Advisory, one call at a time

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::advisory::{AdvisoryEngine, ChatClient};
use crate::config::SmartClimaConfig;
use crate::history::{self, RecentLocation};
use crate::http::{HttpError, RetryingHttpClient};
use crate::location_resolver::{LocationResolver, ResolutionError, ResolvedLocation};
use crate::models::{
    AdvisoryResult, AdvisorySource, ComfortProfile, HourlyForecast, LocationQuery,
    WeatherObservation,
};
use crate::postal::{PROVIDERS, PostalProvider};
use crate::weather::WeatherProvider;

/// Everything produced for one check
#[derive(Debug, Clone, Serialize)]
pub struct ClimateReport {
    pub location: ResolvedLocation,
    pub observation: WeatherObservation,
    pub forecast: Vec<HourlyForecast>,
    pub advisory: AdvisoryResult,
}

impl ClimateReport {
    /// Human-readable notes for every degraded step
    #[must_use]
    pub fn provenance_notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.location.is_approximate() {
            notes.push(
                "Location is approximate: no postal provider answered, so the region centre was used."
                    .to_string(),
            );
        }
        if self.location.context.insecure() {
            notes.push(
                "Postal data was fetched without TLS certificate verification.".to_string(),
            );
        }
        if self.observation.insecure || self.forecast.iter().any(|hour| hour.insecure) {
            notes.push(
                "Weather data was fetched without TLS certificate verification.".to_string(),
            );
        }
        if self.advisory.insecure {
            notes.push(
                "The advisory was fetched without TLS certificate verification.".to_string(),
            );
        }
        if self.observation.is_estimated() {
            notes.push(
                "Weather is estimated from latitude; live data was unavailable.".to_string(),
            );
        }
        if self.advisory.source == AdvisorySource::RuleBased {
            notes.push("Recommendations come from built-in comfort rules.".to_string());
        }
        notes
    }
}

pub struct SmartClima {
    resolver: LocationResolver,
    weather: WeatherProvider,
    advisory: AdvisoryEngine,
}

impl SmartClima {
    #[must_use]
    pub fn new(resolver: LocationResolver, weather: WeatherProvider, advisory: AdvisoryEngine) -> Self {
        Self {
            resolver,
            weather,
            advisory,
        }
    }

    /// Wire every component from configuration
    pub fn from_config(config: &SmartClimaConfig) -> Result<Self, HttpError> {
        let http = RetryingHttpClient::new(&config.http.user_agent, config.http.allow_insecure_fallback)?;

        let overrides = [
            config.postal.viacep_url.as_deref(),
            config.postal.apicep_url.as_deref(),
            config.postal.brasilapi_url.as_deref(),
        ];
        let providers = PROVIDERS
            .iter()
            .zip(overrides)
            .map(|(descriptor, base_url)| PostalProvider::new(descriptor, base_url))
            .collect();

        let resolver = LocationResolver::new(
            http.clone(),
            providers,
            config
                .http
                .fetch_options(config.postal.timeout_seconds, config.postal.max_retries),
        )
        .with_cache_ttl(Duration::from_secs(
            u64::from(config.cache.postal_ttl_hours) * 60 * 60,
        ));

        let weather = WeatherProvider::new(
            http.clone(),
            config.weather.api_key.clone(),
            &config.weather.base_url,
            config
                .http
                .fetch_options(config.weather.timeout_seconds, config.weather.max_retries),
        )
        .with_forecast_hours(config.weather.forecast_hours as usize);

        let advisory = AdvisoryEngine::new(ChatClient::new(
            http,
            config.advisory.api_key.clone(),
            &config.advisory.base_url,
            &config.advisory.model,
            config
                .http
                .fetch_options(config.advisory.timeout_seconds, config.advisory.max_retries),
        ));

        Ok(Self::new(resolver, weather, advisory))
    }

    /// Run the whole cascade; only location resolution can fail
    #[instrument(skip(self, profile))]
    pub async fn check(
        &self,
        query: &LocationQuery,
        profile: &ComfortProfile,
    ) -> Result<ClimateReport, ResolutionError> {
        let location = self.resolver.resolve(query).await?;
        let label = location.place_label();

        let observation = self.weather.observe(location.coordinates, label.as_deref()).await;
        let forecast = self.weather.forecast(location.coordinates, Utc::now()).await;
        let advisory = self.advisory.advise(&observation, &forecast, profile).await;

        let recent = RecentLocation::new(location.label(), location.coordinates);
        if let Err(e) = history::record(recent).await {
            warn!("Failed to record location history: {}", e);
        }

        info!(
            "Check complete for {}: weather {}, advisory {}",
            location.label(),
            observation.source,
            advisory.source
        );

        Ok(ClimateReport {
            location,
            observation,
            forecast,
            advisory,
        })
    }
}
