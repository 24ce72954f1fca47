//! Failure taxonomy shared by every fallback chain
//!
//! Postal providers, gazetteer tiers, weather and advisory all follow the same
//! "try A, else B, else C" shape. Each step yields `Result<T, Failure>` and the
//! [`Cascade`] combinator moves on to the next alternative only when the
//! failure is recoverable. `InvalidInput` always stops the chain.

use thiserror::Error;

/// Why one step of a cascade did not produce a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Malformed input; retrying or falling back cannot help
    #[error("invalid-input: {0}")]
    InvalidInput(String),
    /// Network, timeout or HTTP error after the retry policy gave up
    #[error("provider-unavailable: {0}")]
    ProviderUnavailable(String),
    /// Syntactically valid response with required fields missing
    #[error("incomplete-data: {0}")]
    IncompleteData(String),
    /// Lookup exhausted without a match
    #[error("no-match: {0}")]
    NoMatch(String),
}

impl Failure {
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Failure::InvalidInput(_))
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::InvalidInput(_) => "invalid-input",
            Failure::ProviderUnavailable(_) => "provider-unavailable",
            Failure::IncompleteData(_) => "incomplete-data",
            Failure::NoMatch(_) => "no-match",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Failure::InvalidInput(m)
            | Failure::ProviderUnavailable(m)
            | Failure::IncompleteData(m)
            | Failure::NoMatch(m) => m,
        }
    }
}

/// Fallback combinator over `Result<T, Failure>`
pub trait Cascade<T> {
    /// Run `next` only if `self` failed with a recoverable failure
    fn or_next<F>(self, next: F) -> Result<T, Failure>
    where
        F: FnOnce(&Failure) -> Result<T, Failure>;
}

impl<T> Cascade<T> for Result<T, Failure> {
    fn or_next<F>(self, next: F) -> Result<T, Failure>
    where
        F: FnOnce(&Failure) -> Result<T, Failure>,
    {
        match self {
            Ok(value) => Ok(value),
            Err(failure) if failure.is_recoverable() => next(&failure),
            Err(failure) => Err(failure),
        }
    }
}

/// Lift an `Option` into the cascade as a `NoMatch`
pub fn found<T>(value: Option<T>, what: impl Into<String>) -> Result<T, Failure> {
    value.ok_or_else(|| Failure::NoMatch(what.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_failure_falls_through() {
        let first: Result<u8, Failure> = Err(Failure::ProviderUnavailable("down".into()));
        let result = first.or_next(|_| Ok(7));
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_invalid_input_stops_the_chain() {
        let first: Result<u8, Failure> = Err(Failure::InvalidInput("bad cep".into()));
        let mut called = false;
        let result = first.or_next(|_| {
            called = true;
            Ok(1)
        });
        assert!(!called);
        assert_eq!(result, Err(Failure::InvalidInput("bad cep".into())));
    }

    #[test]
    fn test_success_short_circuits() {
        let first: Result<u8, Failure> = Ok(3);
        let result = first.or_next(|_| panic!("must not run"));
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_found_maps_none_to_no_match() {
        assert_eq!(found(Some(1), "x"), Ok(1));
        let err = found::<u8>(None, "no city").unwrap_err();
        assert_eq!(err.kind(), "no-match");
        assert_eq!(err.to_string(), "no-match: no city");
    }

    #[test]
    fn test_display_matches_kind_and_message() {
        let failures = [
            Failure::InvalidInput("a".into()),
            Failure::ProviderUnavailable("b".into()),
            Failure::IncompleteData("c".into()),
            Failure::NoMatch("d".into()),
        ];
        for failure in failures {
            assert_eq!(failure.to_string(), format!("{}: {}", failure.kind(), failure.message()));
        }
    }
}
