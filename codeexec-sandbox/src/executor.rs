//! Supervised execution under a wall-clock deadline

use crate::error::{SandboxError, SandboxResult};
use crate::execution::ExecutionPhase;
use crate::sandbox::SandboxHandle;
use std::time::Duration;

/// How a started sandbox finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Process exited on its own with this code
    Exited(i64),
    /// Deadline elapsed and the process was killed
    TimedOut,
}

/// Start the sandbox and block until it exits or `timeout` elapses.
///
/// On expiry the process is force-killed and `TimedOut` is returned; a kill
/// failure is logged and does not change the outcome. Teardown is left to the
/// caller, which owns the handle.
pub async fn run(handle: &mut SandboxHandle, timeout: Duration) -> SandboxResult<ExitStatus> {
    let execution_id = handle.execution_id();

    if let Err(err) = handle.engine().start(handle.id()).await {
        handle.transition(ExecutionPhase::InfrastructureFailed)?;
        return Err(SandboxError::Unexpected(format!("failed to start sandbox: {:#}", err)));
    }
    handle.transition(ExecutionPhase::Running)?;
    tracing::debug!(execution_id = %execution_id, timeout_secs = timeout.as_secs(), "Sandbox started");

    let waited = tokio::time::timeout(timeout, handle.engine().wait(handle.id())).await;

    match waited {
        Ok(Ok(exit_code)) => {
            handle.transition(ExecutionPhase::Completed { exit_code })?;
            tracing::debug!(execution_id = %execution_id, exit_code, "Sandbox exited");
            Ok(ExitStatus::Exited(exit_code))
        }
        Ok(Err(err)) => {
            handle.transition(ExecutionPhase::InfrastructureFailed)?;
            Err(SandboxError::Unexpected(format!("failed waiting for sandbox: {:#}", err)))
        }
        Err(_) => {
            if let Err(err) = handle.engine().kill(handle.id()).await {
                tracing::warn!(
                    execution_id = %execution_id,
                    sandbox_id = %handle.id(),
                    error = %format!("{:#}", err),
                    "Failed to kill timed out sandbox"
                );
            }
            handle.transition(ExecutionPhase::TimedOut)?;
            Ok(ExitStatus::TimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, MockStep, ProgramBehavior};
    use crate::execution::ExecutionId;
    use crate::limits::ResourceLimits;
    use crate::provision::Provisioner;
    use crate::registry::LanguageRegistry;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Instant;

    async fn provisioned(engine: Arc<MockEngine>) -> SandboxHandle {
        let registry = LanguageRegistry::builtin();
        Provisioner::new(engine, ResourceLimits::default())
            .provision(ExecutionId::new(), registry.resolve("python").unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_exit_code_passthrough() {
        let engine = Arc::new(MockEngine::new(|_| ProgramBehavior::exit(3, "boom")));
        let mut handle = provisioned(engine).await;

        let status = run(&mut handle, Duration::from_secs(5)).await.unwrap();
        assert_eq!(status, ExitStatus::Exited(3));
        assert_eq!(handle.phase(), ExecutionPhase::Completed { exit_code: 3 });
        handle.release().await;
    }

    #[tokio::test]
    async fn test_deadline_kills() {
        let engine = Arc::new(MockEngine::new(|_| ProgramBehavior::Hang));
        let mut handle = provisioned(engine.clone()).await;

        let started = Instant::now();
        let status = run(&mut handle, Duration::from_secs(1)).await.unwrap();
        assert_eq!(status, ExitStatus::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(engine.kill_count(), 1);
        assert_eq!(handle.phase(), ExecutionPhase::TimedOut);
        handle.release().await;
    }

    #[tokio::test]
    async fn test_kill_failure_still_times_out() {
        let engine = Arc::new(MockEngine::new(|_| ProgramBehavior::Hang).fail_at(MockStep::Kill));
        let mut handle = provisioned(engine.clone()).await;

        let status = run(&mut handle, Duration::from_secs(1)).await.unwrap();
        assert_eq!(status, ExitStatus::TimedOut);
        handle.release().await;
        assert_eq!(engine.live_count(), 0);
    }

    #[tokio::test]
    async fn test_start_failure() {
        let engine = Arc::new(MockEngine::echo().fail_at(MockStep::Start));
        let mut handle = provisioned(engine).await;

        let err = run(&mut handle, Duration::from_secs(1)).await.unwrap_err();
        assert_matches!(err, SandboxError::Unexpected(_));
        assert_eq!(handle.phase(), ExecutionPhase::InfrastructureFailed);
        handle.release().await;
    }
}
