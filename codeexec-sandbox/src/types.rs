//! Request and result types for sandbox execution

use crate::error::{SandboxError, SandboxResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Literal error text reported when a program hits its deadline
pub const TIMEOUT_MESSAGE: &str = "Execution timeout";

/// Request to execute code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source text of the submission
    pub code: String,

    /// Language identifier, resolved against the registry
    pub language: String,

    /// Opaque test specs, passed through untouched
    #[serde(default, alias = "testCases")]
    pub test_cases: Option<Vec<serde_json::Value>>,

    /// Deadline in seconds (None = configured default)
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            test_cases: None,
            timeout: None,
        }
    }

    /// Set timeout in seconds
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn with_test_cases(mut self, cases: Vec<serde_json::Value>) -> Self {
        self.test_cases = Some(cases);
        self
    }

    /// Check request shape and return the effective deadline
    pub fn validate(
        &self,
        default_timeout: Duration,
        max_timeout: Duration,
    ) -> SandboxResult<Duration> {
        if self.language.trim().is_empty() {
            return Err(SandboxError::InvalidRequest(
                "language must not be empty".into(),
            ));
        }

        let timeout = match self.timeout {
            Some(0) => {
                return Err(SandboxError::InvalidRequest(
                    "timeout must be at least 1 second".into(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => default_timeout,
        };

        if timeout > max_timeout {
            return Err(SandboxError::InvalidRequest(format!(
                "timeout {}s exceeds maximum of {}s",
                timeout.as_secs(),
                max_timeout.as_secs()
            )));
        }

        Ok(timeout)
    }
}

/// Result of code execution. Exactly one of `output`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,

    /// Combined stdout/stderr of a program that exited 0
    pub output: Option<String>,

    /// Combined output of a failing program, or a description of what failed
    pub error: Option<String>,

    /// Wall time in seconds, from provisioning start to result
    pub execution_time: f64,

    pub passed_tests: Option<u32>,
    pub total_tests: Option<u32>,
}

impl ExecutionResult {
    pub fn success(output: String, elapsed: Duration) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            execution_time: elapsed.as_secs_f64(),
            passed_tests: None,
            total_tests: None,
        }
    }

    pub fn failure(error: String, elapsed: Duration) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error),
            execution_time: elapsed.as_secs_f64(),
            passed_tests: None,
            total_tests: None,
        }
    }

    pub fn timed_out(elapsed: Duration) -> Self {
        Self::failure(TIMEOUT_MESSAGE.to_string(), elapsed)
    }

    /// Whether the result has the timeout shape. Judged from the text alone,
    /// so a program that fails after printing the literal matches too.
    pub fn is_timeout(&self) -> bool {
        !self.success && self.error.as_deref() == Some(TIMEOUT_MESSAGE)
    }
}
