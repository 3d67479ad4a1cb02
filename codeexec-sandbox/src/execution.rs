//! Execution identity and phase tracking

use serde::{Deserialize, Serialize};

/// Unique execution identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Container name derived from this id
    pub fn sandbox_name(&self) -> String {
        format!("codeexec-{}", self.0)
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of a supervised execution.
///
/// ```text
/// Created -> Running -> Completed | TimedOut | InfrastructureFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPhase {
    Created,
    Running,
    Completed { exit_code: i64 },
    TimedOut,
    InfrastructureFailed,
}

impl ExecutionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionPhase::Completed { .. }
                | ExecutionPhase::TimedOut
                | ExecutionPhase::InfrastructureFailed
        )
    }

    /// Apply a transition, refusing anything the state machine does not allow
    pub fn advance(self, next: ExecutionPhase) -> Option<ExecutionPhase> {
        use ExecutionPhase::*;
        match (self, next) {
            (Created, Running) => Some(next),
            (Created, InfrastructureFailed) => Some(next),
            (Running, Completed { .. }) | (Running, TimedOut) | (Running, InfrastructureFailed) => {
                Some(next)
            }
            _ => None,
        }
    }
}
