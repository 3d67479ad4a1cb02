//! Error taxonomy for the sandbox pipeline

use thiserror::Error;

/// Result type for sandbox pipeline operations
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

/// Failures a single execution can run into, one variant per pipeline stage
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Language identifier is not in the registry
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Request failed shape validation before anything was provisioned
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Runtime engine unreachable or image could not be obtained
    #[error("Failed to provision sandbox: {0}")]
    ProvisionFailure(String),

    /// Source payload could not be written into the sandbox
    #[error("Failed to inject source: {0}")]
    InjectionFailure(String),

    /// Program exceeded its wall-clock deadline
    #[error("Execution timeout after {secs}s")]
    ExecutionTimeout { secs: u64 },

    /// Submitted program exited non-zero
    #[error("Program exited with code {exit_code}")]
    RuntimeFailure { exit_code: i64 },

    /// Output or exit status could not be read back
    #[error("Failed to collect result: {0}")]
    CollectionFailure(String),

    /// Anything else the engine reported
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Flat classification of [`SandboxError`], for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedLanguage,
    InvalidRequest,
    ProvisionFailure,
    InjectionFailure,
    ExecutionTimeout,
    RuntimeFailure,
    CollectionFailure,
    UnexpectedError,
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            SandboxError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            SandboxError::ProvisionFailure(_) => ErrorKind::ProvisionFailure,
            SandboxError::InjectionFailure(_) => ErrorKind::InjectionFailure,
            SandboxError::ExecutionTimeout { .. } => ErrorKind::ExecutionTimeout,
            SandboxError::RuntimeFailure { .. } => ErrorKind::RuntimeFailure,
            SandboxError::CollectionFailure(_) => ErrorKind::CollectionFailure,
            SandboxError::Unexpected(_) => ErrorKind::UnexpectedError,
        }
    }

    /// Whether the caller should see this as a rejected request rather than a
    /// failed execution
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SandboxError::UnsupportedLanguage(_) | SandboxError::InvalidRequest(_)
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::ProvisionFailure => "provision_failure",
            ErrorKind::InjectionFailure => "injection_failure",
            ErrorKind::ExecutionTimeout => "execution_timeout",
            ErrorKind::RuntimeFailure => "runtime_failure",
            ErrorKind::CollectionFailure => "collection_failure",
            ErrorKind::UnexpectedError => "unexpected_error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections() {
        assert!(SandboxError::UnsupportedLanguage("rust".into()).is_rejection());
        assert!(SandboxError::InvalidRequest("timeout".into()).is_rejection());
        assert!(!SandboxError::ProvisionFailure("no daemon".into()).is_rejection());
        assert!(!SandboxError::ExecutionTimeout { secs: 2 }.is_rejection());
    }

    #[test]
    fn test_kind_display() {
        let err = SandboxError::InjectionFailure("archive".into());
        assert_eq!(err.kind(), ErrorKind::InjectionFailure);
        assert_eq!(err.kind().to_string(), "injection_failure");
        assert_eq!(err.to_string(), "Failed to inject source: archive");
    }
}
