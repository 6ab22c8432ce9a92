//! The stable error taxonomy used across the decision-and-protection pipeline.
//!
//! Every dependency failure anywhere in the orchestrator (oracle, NLU, cache,
//! drivers, tools) is classified into one of these variants before it reaches
//! the pipeline. The pipeline's propagation policy then decides what happens
//! to it: only [`ErrorClass::Validation`] and [`ErrorClass::AdmissionDenied`]
//! ever surface to the HTTP caller as non-200; everything else triggers the
//! fallback matrix and returns 200 with a diagnostic `metadata` field.

use std::fmt;
use std::time::Duration;

/// Stable classification of a failure, independent of which dependency raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The oracle is in `EMERGENCY` or `LOCKDOWN`; surfaces as 503 + Retry-After.
    AdmissionDenied,
    /// A downstream call exceeded its deadline.
    Timeout,
    /// Downstream signalled overload (HTTP 429 or equivalent).
    RateLimited,
    /// Downstream reported a server error (HTTP 5xx or equivalent).
    ServerError,
    /// Downstream output could not be repaired to the current schema.
    Schema,
    /// A circuit breaker rejected the call before it was attempted.
    CircuitOpen,
    /// Unclassified exception / panic / I/O error.
    Exception,
    /// The inbound request failed the input contract; surfaces as 400.
    Validation,
    /// A high-risk intent was blocked under STRICT security mode pending confirmation.
    SecurityRequiresConfirmation,
}

impl ErrorClass {
    /// `true` for failure classes that degrade the pipeline (trigger the
    /// fallback matrix) rather than surface as a non-200 response.
    pub fn degrades_gracefully(self) -> bool {
        !matches!(self, Self::Validation | Self::AdmissionDenied)
    }

    /// Stable wire code used in the error envelope and turn events.
    pub fn code(self) -> &'static str {
        match self {
            Self::AdmissionDenied => "admission_denied",
            Self::Timeout => "timeout",
            Self::RateLimited => "429",
            Self::ServerError => "5xx",
            Self::Schema => "schema",
            Self::CircuitOpen => "circuit_open",
            Self::Exception => "exception",
            Self::Validation => "validation",
            Self::SecurityRequiresConfirmation => "security_requires_confirmation",
        }
    }

    pub fn is_timeout(self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn is_rate_limited(self) -> bool {
        matches!(self, Self::RateLimited)
    }

    pub fn is_circuit_open(self) -> bool {
        matches!(self, Self::CircuitOpen)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unified error type for the pipeline, carrying an application error plus
/// the stable classification and optional retry hint.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError<E>
where
    E: std::error::Error + 'static,
{
    #[error("admission denied, retry after {retry_after:?}")]
    AdmissionDenied { retry_after: Duration },

    #[error("{layer} timed out after {elapsed:?}")]
    Timeout { layer: String, elapsed: Duration },

    #[error("circuit breaker {name:?} is open")]
    CircuitOpen { name: String },

    #[error("schema validation failed: {reason}")]
    Schema { reason: String },

    #[error("request validation failed: {reason}")]
    Validation { reason: String },

    #[error("security review required for this intent")]
    SecurityRequiresConfirmation,

    #[error(transparent)]
    Application(#[from] E),
}

impl<E> OrchestratorError<E>
where
    E: std::error::Error + 'static,
{
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AdmissionDenied { .. } => ErrorClass::AdmissionDenied,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::CircuitOpen { .. } => ErrorClass::CircuitOpen,
            Self::Schema { .. } => ErrorClass::Schema,
            Self::Validation { .. } => ErrorClass::Validation,
            Self::SecurityRequiresConfirmation => ErrorClass::SecurityRequiresConfirmation,
            Self::Application(_) => ErrorClass::Exception,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_validation_and_admission_denied_are_non_degrading() {
        let non_degrading: Vec<_> = [
            ErrorClass::AdmissionDenied,
            ErrorClass::Timeout,
            ErrorClass::RateLimited,
            ErrorClass::ServerError,
            ErrorClass::Schema,
            ErrorClass::CircuitOpen,
            ErrorClass::Exception,
            ErrorClass::Validation,
            ErrorClass::SecurityRequiresConfirmation,
        ]
        .into_iter()
        .filter(|c| !c.degrades_gracefully())
        .collect();

        assert_eq!(
            non_degrading,
            vec![ErrorClass::AdmissionDenied, ErrorClass::Validation]
        );
    }
}
