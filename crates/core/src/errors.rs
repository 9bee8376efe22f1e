use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid skill level `{0}` (expected an integer in 1..=5)")]
    InvalidSkillLevel(String),
    #[error("unknown conversation mode `{0}` (expected skill|avail)")]
    UnknownConversationMode(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure taxonomy of the chatbot core. None of these are fatal to the process: each one
/// degrades to a user-visible message, a re-prompt, a retry, or a skipped participant.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("employee `{lookup}` was not found in the directory")]
    IdentityNotFound { lookup: String },
    #[error("directory write failed: {0}")]
    DirectoryWriteFailed(String),
    #[error("input `{input}` does not match any option while {state}")]
    AmbiguousInput { state: String, input: String },
    #[error("platform rate limit persisted after {attempts} attempts")]
    PlatformRateLimited { attempts: u32 },
    #[error("platform request failed: {0}")]
    PlatformRequestFailed(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable label used as the `error_class` log field.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::IdentityNotFound { .. } => "identity_not_found",
            Self::DirectoryWriteFailed(_) => "directory_write_failed",
            Self::AmbiguousInput { .. } => "ambiguous_input",
            Self::PlatformRateLimited { .. } => "platform_rate_limited",
            Self::PlatformRequestFailed(_) => "platform_request_failed",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Whether the conversation can carry on in its current state.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::IdentityNotFound { .. } | Self::Configuration(_) => false,
            Self::Domain(_)
            | Self::DirectoryWriteFailed(_)
            | Self::AmbiguousInput { .. }
            | Self::PlatformRateLimited { .. }
            | Self::PlatformRequestFailed(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn invalid_level_converts_into_recoverable_domain_error() {
        let error = ApplicationError::from(DomainError::InvalidSkillLevel("6".to_owned()));

        assert_eq!(error.error_class(), "domain");
        assert!(error.is_recoverable());
        assert!(error.to_string().contains("1..=5"));
    }

    #[test]
    fn identity_not_found_is_terminal() {
        let error = ApplicationError::IdentityNotFound { lookup: "Jane Doe".to_owned() };

        assert_eq!(error.error_class(), "identity_not_found");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn platform_failures_are_recoverable() {
        assert!(ApplicationError::PlatformRateLimited { attempts: 3 }.is_recoverable());
        assert!(ApplicationError::PlatformRequestFailed("channel_not_found".to_owned())
            .is_recoverable());
        assert_eq!(
            ApplicationError::DirectoryWriteFailed("locked".to_owned()).error_class(),
            "directory_write_failed"
        );
    }
}
