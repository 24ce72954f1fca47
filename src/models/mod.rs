//! Data models for the SmartClima application
//!
//! This module contains the core domain models organized by concern:
//! - Location: queries, coordinates and postal addresses
//! - Weather: current observation and hourly forecast
//! - Advisory: comfort profile and recommendation results

pub mod advisory;
pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use advisory::{
    AdvisoryResult, AdvisorySource, ClothingBand, ComfortProfile, ComfortTargets, HumidityFlag,
    InfantCare, TemperaturePreference, TimeWindow,
};
pub use location::{Address, Coordinates, LocationQuery};
pub use weather::{HourlyForecast, ObservationSource, WeatherObservation};
