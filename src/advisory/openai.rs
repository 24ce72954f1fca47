//! OpenAI-compatible chat-completions client and prompt template

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, warn};

use super::AdvisoryError;
use crate::http::{FetchOptions, Fetched, RetryingHttpClient};
use crate::models::{ComfortProfile, HourlyForecast, WeatherObservation};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Forecast hours included in the prompt
const PROMPT_FORECAST_HOURS: usize = 5;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

pub struct ChatClient {
    http: RetryingHttpClient,
    api_key: Option<String>,
    base_url: String,
    model: String,
    options: FetchOptions,
}

impl ChatClient {
    #[must_use]
    pub fn new(
        http: RetryingHttpClient,
        api_key: Option<String>,
        base_url: &str,
        model: &str,
        options: FetchOptions,
    ) -> Self {
        Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            options,
        }
    }

    /// Send one user message and return the trimmed answer
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    pub async fn complete(&self, prompt: &str) -> Result<Fetched<String>, AdvisoryError> {
        let key = self.api_key.as_deref().ok_or(AdvisoryError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let fetched = self
            .http
            .post_json::<_, ChatResponse>(&url, Some(key), &request, &self.options)
            .await?;
        if fetched.insecure {
            warn!("Advisory received over an unverified TLS connection");
        }

        let answer = fetched
            .body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(AdvisoryError::EmptyAnswer)?;

        debug!("Received advisory of {} characters", answer.len());
        Ok(Fetched {
            body: answer,
            insecure: fetched.insecure,
        })
    }
}

/// Instruction template for the generative advisory
struct Prompt<'a> {
    observation: &'a WeatherObservation,
    forecast: &'a [HourlyForecast],
    profile: &'a ComfortProfile,
}

impl fmt::Display for Prompt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            observation,
            forecast,
            profile,
        } = *self;

        writeln!(
            f,
            "You are an expert in thermal comfort, climate control and energy saving. \
             Give practical, precise advice. Do not hedge with \"maybe\", \"might\" or \"consider\".\n"
        )?;
        writeln!(
            f,
            "CURRENT WEATHER in {}: {:.1}°C, feels like {:.1}°C. Conditions: {}. Humidity: {:.0}%. Wind: {:.1} km/h.",
            observation.location_label,
            observation.temperature,
            observation.apparent_temperature,
            observation.description,
            observation.humidity,
            observation.wind_speed_kmh,
        )?;

        if !forecast.is_empty() {
            writeln!(f, "\nForecast for the next hours:")?;
            for hour in forecast.iter().take(PROMPT_FORECAST_HOURS) {
                writeln!(
                    f,
                    "- {}: {:.1}°C, {}, {}% chance of rain",
                    hour.hour_label, hour.temperature, hour.description, hour.chance_of_rain
                )?;
            }
        }

        writeln!(f, "\nUSER PREFERENCES:")?;
        writeln!(
            f,
            "- Temperature preference: {} ({})",
            profile.preference,
            profile.preference.describe()
        )?;
        writeln!(f, "- At home from {}", profile.home_schedule.format(" to "))?;
        writeln!(f, "- In the car at {}", profile.car_schedule.format(" and "))?;
        if profile.infant_care {
            writeln!(f, "- There is an infant at home")?;
        }

        f.write_str(
            "\nPROVIDE:\n\
             1. CLOTHING: exactly what to wear now for the current temperature and conditions.\n\
             2. HOME CLIMATE CONTROL:\n   \
                - EXACT air-conditioning temperature for the home\n   \
                - When to switch it on and off given the forecast and the time at home\n   \
                - Estimated energy saving from following this advice (in %)\n\
             3. CAR CLIMATE CONTROL:\n   \
                - EXACT temperature for the car\n   \
                - When to pre-condition the car before leaving\n   \
                - Whether to use recirculation or outside air\n",
        )?;
        if profile.infant_care {
            f.write_str("4. INFANT CARE: room temperature for the baby and what to do about humidity.\n")?;
        }
        f.write_str("\nUse direct sentences and short commands. Split the answer into numbered sections.")
    }
}

#[must_use]
pub fn build_prompt(
    observation: &WeatherObservation,
    forecast: &[HourlyForecast],
    profile: &ComfortProfile,
) -> String {
    Prompt {
        observation,
        forecast,
        profile,
    }
    .to_string()
}
