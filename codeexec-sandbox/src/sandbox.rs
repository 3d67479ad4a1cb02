//! Sandbox handle with guaranteed teardown

use crate::engine::{SandboxEngine, SandboxId};
use crate::error::{SandboxError, SandboxResult};
use crate::execution::{ExecutionId, ExecutionPhase};
use std::sync::Arc;

/// Exclusive reference to one provisioned sandbox.
///
/// Owned by the request that created it. [`SandboxHandle::release`] destroys
/// the sandbox; a handle dropped without being released (panic, cancelled
/// future) schedules the same destroy call from `Drop`. Either way the engine
/// sees exactly one `remove` per handle.
pub struct SandboxHandle {
    id: SandboxId,
    execution_id: ExecutionId,
    language: String,
    engine: Arc<dyn SandboxEngine>,
    phase: ExecutionPhase,
    released: bool,
}

impl SandboxHandle {
    pub(crate) fn new(
        id: SandboxId,
        execution_id: ExecutionId,
        language: impl Into<String>,
        engine: Arc<dyn SandboxEngine>,
    ) -> Self {
        Self {
            id,
            execution_id,
            language: language.into(),
            engine,
            phase: ExecutionPhase::Created,
            released: false,
        }
    }

    pub fn id(&self) -> &SandboxId {
        &self.id
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    pub(crate) fn engine(&self) -> &dyn SandboxEngine {
        self.engine.as_ref()
    }

    pub(crate) fn transition(&mut self, next: ExecutionPhase) -> SandboxResult<()> {
        match self.phase.advance(next) {
            Some(phase) => {
                tracing::debug!(
                    execution_id = %self.execution_id,
                    sandbox_id = %self.id,
                    from = ?self.phase,
                    to = ?phase,
                    "Sandbox phase change"
                );
                self.phase = phase;
                Ok(())
            }
            None => Err(SandboxError::Unexpected(format!(
                "illegal sandbox transition {:?} -> {:?}",
                self.phase, next
            ))),
        }
    }

    /// Destroy the sandbox. Failures are logged, never returned.
    ///
    /// The remove call runs on its own task, so cancelling this future does
    /// not abandon a removal that has already been issued.
    pub async fn release(mut self) {
        self.released = true;
        let removal = spawn_removal(Arc::clone(&self.engine), self.id.clone());
        match removal.await {
            Ok(Ok(())) => tracing::debug!(
                execution_id = %self.execution_id,
                sandbox_id = %self.id,
                "Sandbox released"
            ),
            Ok(Err(err)) => tracing::error!(
                execution_id = %self.execution_id,
                sandbox_id = %self.id,
                error = %format!("{:#}", err),
                "Failed to release sandbox"
            ),
            Err(err) => tracing::error!(
                execution_id = %self.execution_id,
                sandbox_id = %self.id,
                error = %err,
                "Sandbox removal task failed"
            ),
        }
    }
}

fn spawn_removal(
    engine: Arc<dyn SandboxEngine>,
    id: SandboxId,
) -> tokio::task::JoinHandle<crate::Result<()>> {
    tokio::spawn(async move { engine.remove(&id).await })
}

impl Drop for SandboxHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        tracing::warn!(
            execution_id = %self.execution_id,
            sandbox_id = %self.id,
            "Sandbox handle dropped without release, scheduling removal"
        );

        if tokio::runtime::Handle::try_current().is_err() {
            tracing::error!(sandbox_id = %self.id, "No async runtime available, sandbox leaked");
            return;
        }

        let id = self.id.clone();
        let removal = spawn_removal(Arc::clone(&self.engine), id.clone());
        tokio::spawn(async move {
            match removal.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::error!(
                    sandbox_id = %id,
                    error = %format!("{:#}", err),
                    "Deferred sandbox removal failed"
                ),
                Err(err) => tracing::error!(
                    sandbox_id = %id,
                    error = %err,
                    "Deferred sandbox removal task failed"
                ),
            }
        });
    }
}

impl std::fmt::Debug for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxHandle")
            .field("id", &self.id)
            .field("execution_id", &self.execution_id)
            .field("language", &self.language)
            .field("phase", &self.phase)
            .finish()
    }
}
