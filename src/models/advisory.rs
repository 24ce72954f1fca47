//! Thermal-comfort advisory models and the user's comfort profile

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the user likes indoor temperatures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperaturePreference {
    /// Prefers cooler rooms
    Cooler,
    #[default]
    Neutral,
    /// Prefers warmer rooms
    Warmer,
}

impl TemperaturePreference {
    /// Shift applied to every rule-based target before clamping
    #[must_use]
    pub fn offset(self) -> f64 {
        match self {
            TemperaturePreference::Cooler => -1.0,
            TemperaturePreference::Neutral => 0.0,
            TemperaturePreference::Warmer => 1.0,
        }
    }

    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            TemperaturePreference::Cooler => "prefers cooler rooms",
            TemperaturePreference::Neutral => "prefers moderate temperatures",
            TemperaturePreference::Warmer => "prefers warmer rooms",
        }
    }
}

impl FromStr for TemperaturePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cooler" | "cool" | "cold" => Ok(Self::Cooler),
            "neutral" => Ok(Self::Neutral),
            "warmer" | "warm" | "hot" => Ok(Self::Warmer),
            other => Err(format!(
                "unknown preference '{other}', expected cooler, neutral or warmer"
            )),
        }
    }
}

impl fmt::Display for TemperaturePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperaturePreference::Cooler => f.write_str("cooler"),
            TemperaturePreference::Neutral => f.write_str("neutral"),
            TemperaturePreference::Warmer => f.write_str("warmer"),
        }
    }
}

/// Two wall-clock times, e.g. arrival/departure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
    }

    #[must_use]
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `HH:MM-HH:MM` or `HH:MM,HH:MM`
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut parts = input.split(['-', ',']).map(str::trim);
        let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected 'HH:MM-HH:MM', got '{input}'"));
        };
        let parse = |s: &str| {
            NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("invalid time '{s}': {e}"))
        };
        Ok(Self::new(parse(start)?, parse(end)?))
    }

    /// Format as `HH:MM` pair
    #[must_use]
    pub fn format(&self, separator: &str) -> String {
        format!(
            "{}{separator}{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Preferences that personalize the advisory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComfortProfile {
    pub preference: TemperaturePreference,
    /// Arrives home at `start`, leaves at `end`
    pub home_schedule: TimeWindow,
    /// Gets in the car at `start` (morning) and `end` (evening)
    pub car_schedule: TimeWindow,
    /// Include infant-care guidance
    pub infant_care: bool,
}

impl Default for ComfortProfile {
    fn default() -> Self {
        Self {
            preference: TemperaturePreference::Neutral,
            home_schedule: TimeWindow::new(TimeWindow::hm(18, 0), TimeWindow::hm(8, 0)),
            car_schedule: TimeWindow::new(TimeWindow::hm(7, 30), TimeWindow::hm(17, 30)),
            infant_care: false,
        }
    }
}

/// Where an advisory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvisorySource {
    /// Written by the generative provider
    Generated,
    /// Computed by the local rule engine
    RuleBased,
}

impl fmt::Display for AdvisorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisorySource::Generated => f.write_str("generated"),
            AdvisorySource::RuleBased => f.write_str("rule-based"),
        }
    }
}

/// Clothing recommendation band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClothingBand {
    /// Below 15 °C
    HeavyLayers,
    /// 15 to 22 °C
    LightLayer,
    /// 22 to 28 °C
    Breathable,
    /// 28 °C and above
    MinimalWithSunProtection,
}

/// Humidity outside the 40–60 % comfort range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumidityFlag {
    Low,
    High,
}

/// Infant-room guidance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfantCare {
    pub target_celsius: f64,
    pub humidity_flag: Option<HumidityFlag>,
}

/// Structured numbers behind a rule-based advisory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComfortTargets {
    pub clothing: ClothingBand,
    pub home_celsius: f64,
    pub vehicle_celsius: f64,
    pub infant: Option<InfantCare>,
}

/// Sectioned thermal-comfort recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResult {
    pub text: String,
    pub source: AdvisorySource,
    /// Present when the rule engine produced the advisory
    pub targets: Option<ComfortTargets>,
    /// Generated over a connection without TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cooler", TemperaturePreference::Cooler)]
    #[case(" Neutral ", TemperaturePreference::Neutral)]
    #[case("WARM", TemperaturePreference::Warmer)]
    fn test_preference_parsing(#[case] input: &str, #[case] expected: TemperaturePreference) {
        assert_eq!(input.parse::<TemperaturePreference>(), Ok(expected));
    }

    #[test]
    fn test_unknown_preference() {
        assert!("tepid".parse::<TemperaturePreference>().is_err());
    }

    #[test]
    fn test_time_window_parsing() {
        let window = TimeWindow::parse("18:00-08:00").unwrap();
        assert_eq!(window.format("-"), "18:00-08:00");

        let window = TimeWindow::parse("07:30, 17:30").unwrap();
        assert_eq!(window.format(" and "), "07:30 and 17:30");

        assert!(TimeWindow::parse("18:00").is_err());
        assert!(TimeWindow::parse("25:00-08:00").is_err());
        assert!(TimeWindow::parse("08:00-09:00-10:00").is_err());
    }

    #[test]
    fn test_default_profile_matches_typical_routine() {
        let profile = ComfortProfile::default();
        assert_eq!(profile.preference, TemperaturePreference::Neutral);
        assert_eq!(profile.home_schedule.format("-"), "18:00-08:00");
        assert_eq!(profile.car_schedule.format(","), "07:30,17:30");
        assert!(!profile.infant_care);
    }

    #[test]
    fn test_advisory_source_serialization() {
        assert_eq!(
            serde_json::to_string(&AdvisorySource::RuleBased).unwrap(),
            "\"rule-based\""
        );
        assert_eq!(AdvisorySource::Generated.to_string(), "generated");
    }
}
