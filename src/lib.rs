//! `SmartClima` - thermal comfort assistant
//!
//! This library resolves a Brazilian postal code, city name or coordinate
//! pair to a location, reads the current weather and the next hours of
//! forecast, and produces clothing and climate-control recommendations.
//! Every step degrades to an offline fallback instead of failing.

pub mod advisory;
pub mod cache;
pub mod cascade;
pub mod config;
pub mod error;
pub mod gazetteer;
pub mod history;
pub mod http;
pub mod location_resolver;
pub mod logging;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod postal;
pub mod text;
pub mod weather;

// Re-export core types for public API
pub use advisory::AdvisoryEngine;
pub use cascade::{Cascade, Failure};
pub use config::SmartClimaConfig;
pub use error::SmartClimaError;
pub use http::RetryingHttpClient;
pub use location_resolver::{LocationResolver, ResolutionError, ResolvedLocation};
pub use models::{
    Address, AdvisoryResult, ComfortProfile, Coordinates, HourlyForecast, LocationQuery,
    WeatherObservation,
};
pub use parser::LocationParser;
pub use pipeline::{ClimateReport, SmartClima};
pub use weather::WeatherProvider;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
