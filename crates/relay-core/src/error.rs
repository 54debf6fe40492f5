//! Domain errors - error types for collaborator contracts

use thiserror::Error;

/// Errors surfaced by the collaborator contracts the hub consumes.
///
/// None of these are fatal to the hub process: persistence failure aborts
/// a single send, lookup failure degrades to an empty display name, and
/// presence failures are logged and swallowed.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("message persistence failed: {0}")]
    PersistFailed(String),

    #[error("identity lookup failed: {0}")]
    LookupFailed(String),

    #[error("presence backend unavailable: {0}")]
    PresenceUnavailable(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl DomainError {
    /// Stable error code for logs and API responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PersistFailed(_) => "PERSIST_FAILED",
            Self::LookupFailed(_) => "LOOKUP_FAILED",
            Self::PresenceUnavailable(_) => "PRESENCE_UNAVAILABLE",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = DomainError::PersistFailed("timeout".to_string());
        assert_eq!(err.to_string(), "message persistence failed: timeout");
        assert_eq!(err.code(), "PERSIST_FAILED");
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            DomainError::PersistFailed(String::new()).code(),
            DomainError::LookupFailed(String::new()).code(),
            DomainError::PresenceUnavailable(String::new()).code(),
            DomainError::Validation(String::new()).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
