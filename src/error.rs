//! Error types and handling for the `SmartClima` application

use thiserror::Error;

/// Main error type for the `SmartClima` application
#[derive(Error, Debug)]
pub enum SmartClimaError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Location could not be resolved
    #[error("Location error: {message}")]
    Location { message: String },
}

impl SmartClimaError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new location error
    pub fn location<S: Into<String>>(message: S) -> Self {
        Self::Location {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SmartClimaError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            SmartClimaError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            SmartClimaError::Location { message } => {
                format!("Could not find that location: {message}")
            }
        }
    }
}

impl From<crate::location_resolver::ResolutionError> for SmartClimaError {
    fn from(err: crate::location_resolver::ResolutionError) -> Self {
        use crate::location_resolver::ResolutionError;
        match err {
            ResolutionError::InvalidCoordinates { .. } | ResolutionError::InvalidPostalCode(_) => {
                Self::validation(err.to_string())
            }
            ResolutionError::CityNotInGazetteer(_) | ResolutionError::NoProviderSucceeded(_) => {
                Self::location(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location_resolver::ResolutionError;

    #[test]
    fn test_error_creation() {
        let config_err = SmartClimaError::config("missing API key");
        assert!(matches!(config_err, SmartClimaError::Config { .. }));

        let validation_err = SmartClimaError::validation("invalid coordinates");
        assert!(matches!(validation_err, SmartClimaError::Validation { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = SmartClimaError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let validation_err = SmartClimaError::validation("test input");
        assert!(validation_err.user_message().contains("test input"));
    }

    #[test]
    fn test_resolution_error_conversion() {
        let err: SmartClimaError = ResolutionError::InvalidPostalCode("123".into()).into();
        assert!(matches!(err, SmartClimaError::Validation { .. }));
        assert!(err.user_message().starts_with("Invalid input"));

        let err: SmartClimaError = ResolutionError::CityNotInGazetteer("Atlantis".into()).into();
        assert!(matches!(err, SmartClimaError::Location { .. }));
        assert!(err.user_message().contains("Atlantis"));
    }
}
