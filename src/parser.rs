use crate::models::LocationQuery;

/// Turns one free-form string into a [`LocationQuery`]
pub struct LocationParser;

impl LocationParser {
    /// Parse location input (coordinates, postal codes, city names)
    ///
    /// Coordinates are not range-checked here; the resolver rejects
    /// out-of-range values so the user gets a precise error.
    #[must_use]
    pub fn parse(input: &str) -> LocationQuery {
        let input = input.trim();

        // Try to parse as coordinates (lat,lon)
        if let Some((lat, lon)) = Self::parse_coordinates(input) {
            return LocationQuery::Coordinates(lat, lon);
        }

        if Self::is_postal_code(input) {
            return LocationQuery::PostalCode(input.to_string());
        }

        LocationQuery::CityName(input.to_string())
    }

    /// Parse coordinates from a string like "-23.5505,-46.6333" or "-23.5505 -46.6333"
    ///
    /// Whitespace-separated pairs need a decimal point so that "01310 100"
    /// stays a postal code.
    fn parse_coordinates(input: &str) -> Option<(f64, f64)> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() != 2 {
            return None;
        }
        if !input.contains(',') && !parts.iter().any(|p| p.contains('.')) {
            return None;
        }

        let lat = parts[0].parse::<f64>().ok()?;
        let lon = parts[1].parse::<f64>().ok()?;
        Some((lat, lon))
    }

    /// Digits with optional CEP punctuation; length is checked by the resolver
    fn is_postal_code(input: &str) -> bool {
        input.chars().any(|c| c.is_ascii_digit())
            && input
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | ' '))
    }
}
