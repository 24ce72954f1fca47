//! Location models: queries, coordinates and postal addresses

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum LocationQuery {
    /// Brazilian CEP, possibly with punctuation
    PostalCode(String),
    /// Latitude and longitude in decimal degrees
    Coordinates(f64, f64),
    /// Free-text city name
    CityName(String),
}

/// Geographic coordinates in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinates {
    /// Create unchecked coordinates; call [`Coordinates::validate`] before use
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180], both finite
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Return `self` if valid
    pub fn validate(self) -> Option<Self> {
        self.is_valid().then_some(self)
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Query value understood by weather APIs (`lat,lon`)
    #[must_use]
    pub fn as_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_coordinates())
    }
}

/// Normalized postal address as returned by a postal-data provider
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    /// Federative unit, e.g. "SP"
    pub region_code: Option<String>,
    /// Eight digits, no punctuation
    pub postal_code: String,
    /// Telephone area code (DDD)
    pub area_code: Option<String>,
    /// Synthesized from the postal prefix rather than looked up
    #[serde(default)]
    pub approximate: bool,
}

impl Address {
    /// City and region usable for matching, if both are present and non-blank
    #[must_use]
    pub fn city_and_region(&self) -> Option<(&str, &str)> {
        let city = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        let region = self
            .region_code
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())?;
        Some((city, region))
    }

    /// "City, UF" label, falling back to whatever part is known
    #[must_use]
    pub fn label(&self) -> Option<String> {
        match (self.city.as_deref(), self.region_code.as_deref()) {
            (Some(city), Some(region)) => Some(format!("{city}, {region}")),
            (Some(city), None) => Some(city.to_string()),
            (None, Some(region)) => Some(region.to_string()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0, true)]
    #[case(-90.0, 180.0, true)]
    #[case(90.0, -180.0, true)]
    #[case(-23.5505, -46.6333, true)]
    #[case(90.1, 0.0, false)]
    #[case(0.0, -180.5, false)]
    #[case(f64::NAN, 0.0, false)]
    #[case(0.0, f64::INFINITY, false)]
    fn test_coordinate_validation(#[case] lat: f64, #[case] lon: f64, #[case] valid: bool) {
        assert_eq!(Coordinates::new(lat, lon).is_valid(), valid);
        assert_eq!(Coordinates::new(lat, lon).validate().is_some(), valid);
    }

    #[test]
    fn test_format_coordinates() {
        let coords = Coordinates::new(-23.550_52, -46.633_308);
        assert_eq!(coords.format_coordinates(), "-23.5505, -46.6333");
    }

    #[test]
    fn test_address_completeness() {
        let mut address = Address {
            city: Some("São Paulo".into()),
            region_code: Some("SP".into()),
            postal_code: "01310100".into(),
            ..Address::default()
        };
        assert_eq!(address.city_and_region(), Some(("São Paulo", "SP")));
        assert_eq!(address.label().as_deref(), Some("São Paulo, SP"));

        address.city = Some("   ".into());
        assert_eq!(address.city_and_region(), None);
    }
}
