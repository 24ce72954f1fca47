//! Location Resolution Module
//!
//! Turns a [`LocationQuery`] into coordinates plus whatever address metadata
//! could be found. Coordinates and city names resolve offline; postal codes
//! walk the provider table, then fall back to the region centroid for the
//! CEP prefix so a well-formed CEP with a known prefix always resolves.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache;
use crate::cascade::{Cascade, Failure, found};
use crate::gazetteer::{Gazetteer, MatchTier};
use crate::http::{FetchOptions, RetryingHttpClient};
use crate::models::{Address, Coordinates, LocationQuery};
use crate::postal::{PostalProvider, digits_only};

/// City label used for addresses estimated from the CEP prefix
pub const APPROXIMATE_CITY: &str = "Approximate location";

const CACHE_PROVIDER: &str = "cache";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("city '{0}' is not in the gazetteer")]
    CityNotInGazetteer(String),

    #[error("'{0}' is not a valid CEP (expected 8 digits)")]
    InvalidPostalCode(String),

    #[error("no provider resolved CEP {0} and its prefix maps to no region")]
    NoProviderSucceeded(String),
}

/// How the coordinates were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    /// Taken verbatim from the query
    Coordinates,
    /// Gazetteer match on a city name query
    CityName(MatchTier),
    /// Postal address whose city is in the gazetteer
    PostalCity,
    /// Postal address with an unknown city; region centroid used
    PostalRegion,
    /// Every provider failed; region guessed from the CEP prefix
    PrefixEstimate,
}

impl ResolutionMethod {
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            ResolutionMethod::Coordinates => "coordinates as given",
            ResolutionMethod::CityName(MatchTier::Exact | MatchTier::Normalized) => "city name",
            ResolutionMethod::CityName(_) => "closest city name",
            ResolutionMethod::PostalCity => "postal code, city centre",
            ResolutionMethod::PostalRegion => "postal code, state capital",
            ResolutionMethod::PrefixEstimate => "postal code prefix estimate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Resolved,
    Failed { kind: &'static str, message: String },
}

/// One provider call made while resolving a postal code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAttempt {
    pub provider: &'static str,
    pub outcome: AttemptOutcome,
    /// The answer came over an unverified TLS connection
    pub insecure: bool,
}

/// Everything tried while resolving one query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionContext {
    attempts: Vec<ProviderAttempt>,
}

impl ResolutionContext {
    fn resolved(&mut self, provider: &'static str, insecure: bool) {
        self.attempts.push(ProviderAttempt {
            provider,
            outcome: AttemptOutcome::Resolved,
            insecure,
        });
    }

    fn failed(&mut self, provider: &'static str, failure: &Failure, insecure: bool) {
        self.attempts.push(ProviderAttempt {
            provider,
            outcome: AttemptOutcome::Failed {
                kind: failure.kind(),
                message: failure.message().to_string(),
            },
            insecure,
        });
    }

    #[must_use]
    pub fn attempts(&self) -> &[ProviderAttempt] {
        &self.attempts
    }

    /// Provider whose answer was used
    #[must_use]
    pub fn provider(&self) -> Option<&'static str> {
        self.attempts
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Resolved)
            .map(|a| a.provider)
    }

    /// The used answer came over an unverified TLS connection
    #[must_use]
    pub fn insecure(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::Resolved && a.insecure)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub address: Option<Address>,
    /// Gazetteer place for city-name queries
    pub place: Option<String>,
    pub coordinates: Coordinates,
    pub method: ResolutionMethod,
    pub context: ResolutionContext,
}

impl ResolvedLocation {
    fn offline(coordinates: Coordinates, method: ResolutionMethod) -> Self {
        Self {
            address: None,
            place: None,
            coordinates,
            method,
            context: ResolutionContext::default(),
        }
    }

    /// "City, UF" of the address or gazetteer place, if any
    #[must_use]
    pub fn place_label(&self) -> Option<String> {
        self.address
            .as_ref()
            .and_then(Address::label)
            .or_else(|| self.place.clone())
    }

    /// [`Self::place_label`], falling back to the coordinates
    #[must_use]
    pub fn label(&self) -> String {
        self.place_label()
            .unwrap_or_else(|| self.coordinates.format_coordinates())
    }

    #[must_use]
    pub fn is_approximate(&self) -> bool {
        self.address.as_ref().is_some_and(|a| a.approximate)
    }
}

/// Service for resolving location queries
pub struct LocationResolver {
    http: RetryingHttpClient,
    providers: Vec<PostalProvider>,
    options: FetchOptions,
    gazetteer: &'static Gazetteer,
    cache_ttl: Duration,
}

impl LocationResolver {
    #[must_use]
    pub fn new(http: RetryingHttpClient, providers: Vec<PostalProvider>, options: FetchOptions) -> Self {
        Self {
            http,
            providers,
            options,
            gazetteer: Gazetteer::builtin(),
            cache_ttl: Duration::from_secs(720 * 60 * 60),
        }
    }

    #[must_use]
    pub fn with_gazetteer(mut self, gazetteer: &'static Gazetteer) -> Self {
        self.gazetteer = gazetteer;
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Resolve a location query into coordinates
    pub async fn resolve(&self, query: &LocationQuery) -> Result<ResolvedLocation, ResolutionError> {
        debug!("Resolving location query: {:?}", query);

        let resolved = match query {
            LocationQuery::Coordinates(lat, lon) => self.resolve_coordinates(*lat, *lon)?,
            LocationQuery::CityName(name) => self.resolve_city(name)?,
            LocationQuery::PostalCode(cep) => self.resolve_postal_code(cep).await?,
        };

        info!(
            "Resolved location: {} at ({}) via {:?}",
            resolved.label(),
            resolved.coordinates,
            resolved.method
        );
        Ok(resolved)
    }

    fn resolve_coordinates(&self, lat: f64, lon: f64) -> Result<ResolvedLocation, ResolutionError> {
        let coordinates = Coordinates::new(lat, lon).validate().ok_or(
            ResolutionError::InvalidCoordinates {
                latitude: lat,
                longitude: lon,
            },
        )?;
        Ok(ResolvedLocation::offline(coordinates, ResolutionMethod::Coordinates))
    }

    fn resolve_city(&self, name: &str) -> Result<ResolvedLocation, ResolutionError> {
        let city = self
            .gazetteer
            .match_city(name)
            .ok_or_else(|| ResolutionError::CityNotInGazetteer(name.trim().to_string()))?;

        if city.tier >= MatchTier::QueryInEntry {
            warn!(
                "'{}' matched '{}' by substring; result may be imprecise",
                name, city.entry.name
            );
        }

        let mut resolved =
            ResolvedLocation::offline(city.coordinates(), ResolutionMethod::CityName(city.tier));
        resolved.place = Some(format!("{}, {}", city.entry.name, city.entry.region_code));
        Ok(resolved)
    }

    async fn resolve_postal_code(&self, raw: &str) -> Result<ResolvedLocation, ResolutionError> {
        let cep = digits_only(raw);
        if cep.len() != 8 {
            return Err(ResolutionError::InvalidPostalCode(raw.trim().to_string()));
        }

        let mut context = ResolutionContext::default();
        let cache_key = format!("postal:{cep}");

        match cache::get::<Address>(&cache_key).await {
            Ok(Some(address)) => {
                if let Ok((coordinates, method)) = self.locate_address(&address) {
                    debug!("Using cached address for CEP {}", cep);
                    context.resolved(CACHE_PROVIDER, false);
                    return Ok(ResolvedLocation {
                        address: Some(address),
                        place: None,
                        coordinates,
                        method,
                        context,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup failed for CEP {}: {}", cep, e),
        }

        for provider in &self.providers {
            let (address, insecure) = match provider.lookup(&self.http, &cep, &self.options).await {
                Ok(fetched) => (fetched.body, fetched.insecure),
                Err(e) => {
                    warn!("Postal provider failed: {}", e);
                    context.failed(provider.name(), &Failure::from(e), false);
                    continue;
                }
            };

            match self.locate_address(&address) {
                Ok((coordinates, method)) => {
                    context.resolved(provider.name(), insecure);
                    if let Err(e) = cache::put(&cache_key, address.clone(), self.cache_ttl).await {
                        warn!("Failed to cache address for CEP {}: {}", cep, e);
                    }
                    return Ok(ResolvedLocation {
                        address: Some(address),
                        place: None,
                        coordinates,
                        method,
                        context,
                    });
                }
                Err(failure) => {
                    debug!("{} answered but the address could not be placed: {}", provider.name(), failure);
                    context.failed(provider.name(), &failure, insecure);
                }
            }
        }

        self.estimate_from_prefix(&cep, context)
    }

    /// Gazetteer city first, then the region centroid
    fn locate_address(&self, address: &Address) -> Result<(Coordinates, ResolutionMethod), Failure> {
        let (city, region) = address
            .city_and_region()
            .ok_or_else(|| Failure::IncompleteData("address has no city or region".into()))?;

        found(
            self.gazetteer
                .match_city(city)
                .map(|m| (m.coordinates(), ResolutionMethod::PostalCity)),
            format!("city '{city}' not in gazetteer"),
        )
        .or_next(|_| {
            found(
                self.gazetteer
                    .centroid_for_region(region)
                    .map(|c| (c, ResolutionMethod::PostalRegion)),
                format!("unknown region '{region}'"),
            )
        })
    }

    fn estimate_from_prefix(
        &self,
        cep: &str,
        context: ResolutionContext,
    ) -> Result<ResolvedLocation, ResolutionError> {
        let not_found = || ResolutionError::NoProviderSucceeded(cep.to_string());

        let region = self
            .gazetteer
            .region_for_postal_prefix(&cep[..2])
            .ok_or_else(not_found)?;
        let coordinates = self.gazetteer.centroid_for_region(region).ok_or_else(not_found)?;

        warn!(
            "All postal providers failed for CEP {}; estimating from prefix region {}",
            cep, region
        );

        Ok(ResolvedLocation {
            address: Some(Address {
                city: Some(APPROXIMATE_CITY.to_string()),
                region_code: Some(region.to_string()),
                postal_code: cep.to_string(),
                approximate: true,
                ..Address::default()
            }),
            place: None,
            coordinates,
            method: ResolutionMethod::PrefixEstimate,
            context,
        })
    }
}
