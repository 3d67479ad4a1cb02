//! Reads back output and classifies the outcome

use crate::error::{SandboxError, SandboxResult};
use crate::executor::ExitStatus;
use crate::sandbox::SandboxHandle;
use crate::types::ExecutionResult;
use std::time::Instant;

/// Turn an exit status into a result. Combined output goes to `output` on a
/// zero exit and to `error` otherwise; a timeout reports the fixed timeout
/// message without reading logs. `started` marks the beginning of
/// provisioning.
pub async fn collect(
    handle: &SandboxHandle,
    status: ExitStatus,
    started: Instant,
) -> SandboxResult<ExecutionResult> {
    let exit_code = match status {
        ExitStatus::TimedOut => return Ok(ExecutionResult::timed_out(started.elapsed())),
        ExitStatus::Exited(code) => code,
    };

    let logs = handle
        .engine()
        .logs(handle.id())
        .await
        .map_err(|e| SandboxError::CollectionFailure(format!("{:#}", e)))?;
    let elapsed = started.elapsed();

    if exit_code == 0 {
        Ok(ExecutionResult::success(logs, elapsed))
    } else {
        tracing::debug!(
            execution_id = %handle.execution_id(),
            error = %SandboxError::RuntimeFailure { exit_code },
            "Submitted program failed"
        );
        Ok(ExecutionResult::failure(logs, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, MockStep, ProgramBehavior};
    use crate::execution::ExecutionId;
    use crate::executor;
    use crate::limits::ResourceLimits;
    use crate::provision::Provisioner;
    use crate::registry::LanguageRegistry;
    use crate::types::TIMEOUT_MESSAGE;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;

    async fn finished(engine: Arc<MockEngine>) -> (SandboxHandle, ExitStatus) {
        let registry = LanguageRegistry::builtin();
        let mut handle = Provisioner::new(engine, ResourceLimits::default())
            .provision(ExecutionId::new(), registry.resolve("python").unwrap())
            .await
            .unwrap();
        let status = executor::run(&mut handle, Duration::from_secs(5)).await.unwrap();
        (handle, status)
    }

    #[tokio::test]
    async fn test_zero_exit_is_output() {
        let engine = Arc::new(MockEngine::new(|_| ProgramBehavior::exit(0, "hi\n")));
        let (handle, status) = finished(engine).await;

        let result = collect(&handle, status, Instant::now()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("hi\n"));
        assert!(result.error.is_none());
        handle.release().await;
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let engine = Arc::new(MockEngine::new(|_| {
            ProgramBehavior::exit(1, "Traceback (most recent call last):\nValueError\n")
        }));
        let (handle, status) = finished(engine).await;

        let result = collect(&handle, status, Instant::now()).await.unwrap();
        assert!(!result.success);
        assert!(result.output.is_none());
        assert!(result.error.unwrap().contains("ValueError"));
        handle.release().await;
    }

    #[tokio::test]
    async fn test_timeout_skips_logs() {
        let engine = Arc::new(MockEngine::echo().fail_at(MockStep::Logs));
        let (handle, _) = finished(engine).await;

        let started = Instant::now() - Duration::from_secs(3);
        let result = collect(&handle, ExitStatus::TimedOut, started).await.unwrap();
        assert_eq!(result.error.as_deref(), Some(TIMEOUT_MESSAGE));
        assert!(result.execution_time >= 3.0);
        handle.release().await;
    }

    #[tokio::test]
    async fn test_log_failure() {
        let engine = Arc::new(MockEngine::echo().fail_at(MockStep::Logs));
        let (handle, status) = finished(engine).await;

        let err = collect(&handle, status, Instant::now()).await.unwrap_err();
        assert_matches!(err, SandboxError::CollectionFailure(_));
        handle.release().await;
    }
}
