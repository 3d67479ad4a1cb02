//! Sandbox service - main entry point

use crate::collector;
use crate::engine::SandboxEngine;
use crate::error::{SandboxError, SandboxResult};
use crate::execution::{ExecutionId, ExecutionPhase};
use crate::executor;
use crate::inject;
use crate::limits::ResourceLimits;
use crate::provision::Provisioner;
use crate::registry::{LanguageProfile, LanguageRegistry};
use crate::sandbox::SandboxHandle;
use crate::types::{ExecutionRequest, ExecutionResult};
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Runs submissions through resolve -> provision -> inject -> run -> collect,
/// releasing the sandbox on every path.
///
/// Each call owns its own sandbox; nothing is shared between concurrent
/// executions except the engine client.
pub struct SandboxService {
    engine: Arc<dyn SandboxEngine>,
    registry: LanguageRegistry,
    provisioner: Provisioner,
}

impl SandboxService {
    /// Create a service with the built-in languages and default limits
    pub fn new(engine: impl SandboxEngine + 'static) -> Self {
        Self::with_config(Arc::new(engine), LanguageRegistry::builtin(), ResourceLimits::default())
    }

    pub fn with_config(
        engine: Arc<dyn SandboxEngine>,
        registry: LanguageRegistry,
        limits: ResourceLimits,
    ) -> Self {
        let provisioner = Provisioner::new(Arc::clone(&engine), limits);
        Self {
            engine,
            registry,
            provisioner,
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &ResourceLimits {
        self.provisioner.limits()
    }

    /// Get the engine name
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Check the engine is reachable
    pub async fn ping(&self) -> Result<()> {
        self.engine.ping().await
    }

    /// Execute one submission.
    ///
    /// Returns `Err` only when the request is rejected up front (invalid shape
    /// or unsupported language); no sandbox exists in that case. Every other
    /// failure is reported as an unsuccessful [`ExecutionResult`].
    pub async fn execute(&self, request: &ExecutionRequest) -> SandboxResult<ExecutionResult> {
        let limits = self.limits();
        let timeout = request.validate(limits.default_timeout, limits.max_timeout)?;
        let profile = self.registry.resolve(&request.language)?;

        let execution_id = ExecutionId::new();
        let span = tracing::info_span!(
            "execution",
            execution_id = %execution_id,
            language = %profile.id,
        );

        tracing::info!(
            parent: &span,
            engine = self.engine.name(),
            code_len = request.code.len(),
            timeout_secs = timeout.as_secs(),
            test_cases = request.test_cases.as_ref().map_or(0, Vec::len),
            "Executing code"
        );

        // Detached from the caller so a dropped request cannot interrupt
        // provisioning or teardown halfway.
        let started = Instant::now();
        let pipeline = run_pipeline(
            self.provisioner.clone(),
            execution_id,
            profile.clone(),
            request.code.clone(),
            timeout,
        );
        match tokio::spawn(pipeline.instrument(span.clone())).await {
            Ok((result, _)) => Ok(result),
            Err(err) => {
                let err = SandboxError::Unexpected(format!("execution task failed: {}", err));
                Ok(span.in_scope(|| infrastructure_failure(err, started)))
            }
        }
    }
}

/// How a pipeline run ended, as recorded by the sandbox phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    ProgramFailed { exit_code: i64 },
    TimedOut,
    InfrastructureFailed,
}

impl Outcome {
    fn from_phase(phase: ExecutionPhase) -> Self {
        match phase {
            ExecutionPhase::Completed { exit_code: 0 } => Outcome::Succeeded,
            ExecutionPhase::Completed { exit_code } => Outcome::ProgramFailed { exit_code },
            ExecutionPhase::TimedOut => Outcome::TimedOut,
            _ => Outcome::InfrastructureFailed,
        }
    }

    fn log(&self, elapsed_ms: u64, timeout: Duration) {
        match self {
            Outcome::Succeeded => tracing::info!(elapsed_ms, "Execution succeeded"),
            Outcome::ProgramFailed { exit_code } => {
                tracing::info!(elapsed_ms, exit_code, "Program exited with failure")
            }
            Outcome::TimedOut => tracing::warn!(
                error = %SandboxError::ExecutionTimeout { secs: timeout.as_secs() },
                elapsed_ms,
                "Execution timed out"
            ),
            Outcome::InfrastructureFailed => {
                tracing::error!(elapsed_ms, "Execution ended without a program outcome")
            }
        }
    }
}

async fn run_pipeline(
    provisioner: Provisioner,
    execution_id: ExecutionId,
    profile: LanguageProfile,
    code: String,
    timeout: Duration,
) -> (ExecutionResult, Outcome) {
    let started = Instant::now();

    let mut handle = match provisioner.provision(execution_id, &profile).await {
        Ok(handle) => handle,
        Err(err) => return (infrastructure_failure(err, started), Outcome::InfrastructureFailed),
    };

    let outcome = supervise(&mut handle, &profile, &code, timeout, started).await;
    let phase = handle.phase();
    handle.release().await;

    let result = match outcome {
        Ok(result) => result,
        Err(err) => return (infrastructure_failure(err, started), Outcome::InfrastructureFailed),
    };

    let outcome = Outcome::from_phase(phase);
    outcome.log(started.elapsed().as_millis() as u64, timeout);
    (result, outcome)
}

async fn supervise(
    handle: &mut SandboxHandle,
    profile: &LanguageProfile,
    code: &str,
    timeout: Duration,
    started: Instant,
) -> SandboxResult<ExecutionResult> {
    inject::inject(handle, profile, code).await?;
    let status = executor::run(handle, timeout).await?;
    collector::collect(handle, status, started).await
}

fn infrastructure_failure(err: SandboxError, started: Instant) -> ExecutionResult {
    tracing::error!(kind = %err.kind(), error = %err, "Execution error");
    ExecutionResult::failure(err.to_string(), started.elapsed())
}
