//! Thermal-comfort advisory with a deterministic fallback
//!
//! The generative provider is tried first. Whatever goes wrong (no key,
//! network, provider error, empty answer) the rule engine answers instead,
//! so [`AdvisoryEngine::advise`] always returns an advisory.

use thiserror::Error;
use tracing::{info, warn};

use crate::cascade::Failure;
use crate::http::HttpError;
use crate::models::{
    AdvisoryResult, AdvisorySource, ComfortProfile, HourlyForecast, WeatherObservation,
};

pub mod openai;
pub mod rules;

pub use openai::ChatClient;

#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("no advisory API key configured")]
    MissingApiKey,

    #[error("advisory request failed: {0}")]
    Http(#[from] HttpError),

    #[error("advisory provider returned an empty answer")]
    EmptyAnswer,
}

impl From<AdvisoryError> for Failure {
    fn from(err: AdvisoryError) -> Self {
        match err {
            AdvisoryError::EmptyAnswer => Failure::IncompleteData(err.to_string()),
            AdvisoryError::MissingApiKey | AdvisoryError::Http(_) => {
                Failure::ProviderUnavailable(err.to_string())
            }
        }
    }
}

pub struct AdvisoryEngine {
    chat: ChatClient,
}

impl AdvisoryEngine {
    #[must_use]
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    pub async fn advise(
        &self,
        observation: &WeatherObservation,
        forecast: &[HourlyForecast],
        profile: &ComfortProfile,
    ) -> AdvisoryResult {
        let prompt = openai::build_prompt(observation, forecast, profile);

        match self.chat.complete(&prompt).await {
            Ok(fetched) => {
                info!("Advisory produced ({})", AdvisorySource::Generated);
                AdvisoryResult {
                    text: fetched.body,
                    source: AdvisorySource::Generated,
                    targets: None,
                    insecure: fetched.insecure,
                }
            }
            Err(e) => {
                warn!(
                    "Generative advisory unavailable ({}); using comfort rules",
                    Failure::from(e)
                );
                rules::advise(observation, forecast, profile)
            }
        }
    }
}
