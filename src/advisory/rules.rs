//! Deterministic thermal-comfort rules
//!
//! Targets are `round(clamp(t - delta + offset, low, high))` where `t` is the
//! observed temperature and `offset` comes from the comfort profile. Both the
//! offset and the clamp are monotonic, so every target is non-decreasing in
//! `t` and always inside its bounds.

use std::fmt;

use crate::models::{
    AdvisoryResult, AdvisorySource, ClothingBand, ComfortProfile, ComfortTargets, HourlyForecast,
    HumidityFlag, InfantCare, WeatherObservation,
};

const HOME_DELTA: f64 = 2.0;
const HOME_RANGE: (f64, f64) = (18.0, 26.0);
const VEHICLE_DELTA: f64 = 3.0;
const VEHICLE_RANGE: (f64, f64) = (18.0, 24.0);
const INFANT_DELTA: f64 = 1.0;
const INFANT_RANGE: (f64, f64) = (20.0, 24.0);
const HUMIDITY_RANGE: (f64, f64) = (40.0, 60.0);

/// Outside temperatures where recirculation beats outside air
const RECIRCULATE_ABOVE: f64 = 28.0;
const RECIRCULATE_BELOW: f64 = 15.0;
const RAIN_LIKELY: u8 = 50;

/// Lower bound inclusive, upper bound exclusive
#[must_use]
pub fn clothing_band(temperature: f64) -> ClothingBand {
    match temperature {
        t if t < 15.0 => ClothingBand::HeavyLayers,
        t if t < 22.0 => ClothingBand::LightLayer,
        t if t < 28.0 => ClothingBand::Breathable,
        _ => ClothingBand::MinimalWithSunProtection,
    }
}

fn target(temperature: f64, delta: f64, offset: f64, (low, high): (f64, f64)) -> f64 {
    (temperature - delta + offset).clamp(low, high).round()
}

#[must_use]
pub fn humidity_flag(humidity: f64) -> Option<HumidityFlag> {
    if humidity < HUMIDITY_RANGE.0 {
        Some(HumidityFlag::Low)
    } else if humidity > HUMIDITY_RANGE.1 {
        Some(HumidityFlag::High)
    } else {
        None
    }
}

#[must_use]
pub fn comfort_targets(observation: &WeatherObservation, profile: &ComfortProfile) -> ComfortTargets {
    let t = observation.temperature;
    let offset = profile.preference.offset();

    ComfortTargets {
        clothing: clothing_band(t),
        home_celsius: target(t, HOME_DELTA, offset, HOME_RANGE),
        vehicle_celsius: target(t, VEHICLE_DELTA, offset, VEHICLE_RANGE),
        infant: profile.infant_care.then(|| InfantCare {
            target_celsius: target(t, INFANT_DELTA, offset, INFANT_RANGE),
            humidity_flag: humidity_flag(observation.humidity),
        }),
    }
}

fn clothing_text(band: ClothingBand) -> &'static str {
    match band {
        ClothingBand::HeavyLayers => {
            "Wear heavy layers: a warm coat over a sweater, long trousers and closed shoes."
        }
        ClothingBand::LightLayer => {
            "Wear a light layer: long sleeves or a light jacket you can take off later."
        }
        ClothingBand::Breathable => {
            "Wear light, breathable clothing: cotton or linen, short sleeves are fine."
        }
        ClothingBand::MinimalWithSunProtection => {
            "Wear minimal, loose clothing and protect yourself from the sun: hat, sunglasses and sunscreen. Drink water often."
        }
    }
}

/// Rule-based advisory text, one numbered section per concern
struct RuleText<'a> {
    observation: &'a WeatherObservation,
    forecast: &'a [HourlyForecast],
    profile: &'a ComfortProfile,
    targets: &'a ComfortTargets,
}

impl fmt::Display for RuleText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            observation,
            forecast,
            profile,
            targets,
        } = *self;
        let home = profile.home_schedule;
        let car = profile.car_schedule;

        writeln!(f, "1. CLOTHING")?;
        writeln!(f, "{}", clothing_text(targets.clothing))?;
        if let Some(peak) = forecast
            .iter()
            .max_by(|a, b| a.temperature.total_cmp(&b.temperature))
            .filter(|peak| clothing_band(peak.temperature) != targets.clothing)
        {
            writeln!(
                f,
                "It will reach {:.0}°C around {}; dress so you can adjust.",
                peak.temperature, peak.hour_label
            )?;
        }
        if let Some(rain) = forecast.iter().find(|h| h.chance_of_rain >= RAIN_LIKELY) {
            writeln!(
                f,
                "Rain is likely around {} ({}%); take an umbrella.",
                rain.hour_label, rain.chance_of_rain
            )?;
        }

        writeln!(f, "\n2. HOME CLIMATE CONTROL")?;
        writeln!(f, "Set the air conditioning to {:.0}°C.", targets.home_celsius)?;
        writeln!(
            f,
            "You are home from {} to {}: switch it on 15 minutes before {} and off when you leave at {}.",
            home.start.format("%H:%M"),
            home.end.format("%H:%M"),
            home.start.format("%H:%M"),
            home.end.format("%H:%M"),
        )?;
        writeln!(
            f,
            "Keep doors and windows closed while it runs; each degree closer to the outside temperature saves energy."
        )?;

        writeln!(f, "\n3. CAR CLIMATE CONTROL")?;
        writeln!(f, "Set the car to {:.0}°C.", targets.vehicle_celsius)?;
        writeln!(
            f,
            "Pre-condition the car for 5 minutes before {} and {}.",
            car.start.format("%H:%M"),
            car.end.format("%H:%M"),
        )?;
        if observation.temperature >= RECIRCULATE_ABOVE || observation.temperature < RECIRCULATE_BELOW {
            writeln!(f, "Use recirculation: the outside air is far from the target.")?;
        } else {
            writeln!(f, "Use outside air: recirculation is not needed at this temperature.")?;
        }

        if let Some(infant) = &targets.infant {
            writeln!(f, "\n4. INFANT CARE")?;
            writeln!(f, "Keep the baby's room at {:.0}°C.", infant.target_celsius)?;
            match infant.humidity_flag {
                Some(HumidityFlag::Low) => writeln!(
                    f,
                    "Humidity is low ({:.0}%); use a humidifier or a damp towel in the room.",
                    observation.humidity
                )?,
                Some(HumidityFlag::High) => writeln!(
                    f,
                    "Humidity is high ({:.0}%); ventilate the room or use a dehumidifier.",
                    observation.humidity
                )?,
                None => writeln!(f, "Humidity is comfortable ({:.0}%).", observation.humidity)?,
            }
            write!(f, "Never point air conditioning directly at the baby.")?;
        }
        Ok(())
    }
}

/// Build the rule-based advisory
#[must_use]
pub fn advise(
    observation: &WeatherObservation,
    forecast: &[HourlyForecast],
    profile: &ComfortProfile,
) -> AdvisoryResult {
    let targets = comfort_targets(observation, profile);
    let text = RuleText {
        observation,
        forecast,
        profile,
        targets: &targets,
    }
    .to_string();

    AdvisoryResult {
        text: text.trim_end().to_string(),
        source: AdvisorySource::RuleBased,
        targets: Some(targets),
        insecure: false,
    }
}
