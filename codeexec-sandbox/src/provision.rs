//! Sandbox provisioning from a language profile

use crate::engine::{ContainerSpec, SandboxEngine, LABEL_EXECUTION_ID, LABEL_LANGUAGE};
use crate::error::{SandboxError, SandboxResult};
use crate::execution::ExecutionId;
use crate::limits::ResourceLimits;
use crate::registry::{LanguageProfile, WORKDIR};
use crate::sandbox::SandboxHandle;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates sandboxes with fixed resource ceilings and no network
#[derive(Clone)]
pub struct Provisioner {
    engine: Arc<dyn SandboxEngine>,
    limits: ResourceLimits,
}

impl Provisioner {
    pub fn new(engine: Arc<dyn SandboxEngine>, limits: ResourceLimits) -> Self {
        Self { engine, limits }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Engine-level description of the sandbox for one execution
    pub fn container_spec(
        &self,
        execution_id: ExecutionId,
        profile: &LanguageProfile,
    ) -> ContainerSpec {
        let mut labels = HashMap::new();
        labels.insert(LABEL_EXECUTION_ID.to_string(), execution_id.to_string());
        labels.insert(LABEL_LANGUAGE.to_string(), profile.id.clone());

        ContainerSpec {
            name: execution_id.sandbox_name(),
            image: profile.runtime_image.clone(),
            command: profile.entry_command.clone(),
            working_dir: WORKDIR.to_string(),
            memory_bytes: self.limits.memory_bytes,
            network_disabled: self.limits.network_disabled(),
            auto_remove: false,
            labels,
        }
    }

    /// Create (not start) a sandbox for `profile`. Not retried on failure.
    pub async fn provision(
        &self,
        execution_id: ExecutionId,
        profile: &LanguageProfile,
    ) -> SandboxResult<SandboxHandle> {
        self.engine
            .ensure_image(&profile.runtime_image)
            .await
            .map_err(|e| SandboxError::ProvisionFailure(format!("{:#}", e)))?;

        let spec = self.container_spec(execution_id, profile);
        let id = self
            .engine
            .create(&spec)
            .await
            .map_err(|e| SandboxError::ProvisionFailure(format!("{:#}", e)))?;

        tracing::debug!(
            execution_id = %execution_id,
            sandbox_id = %id,
            image = %profile.runtime_image,
            memory_mb = self.limits.memory_mb(),
            "Sandbox provisioned"
        );

        Ok(SandboxHandle::new(
            id,
            execution_id,
            profile.id.clone(),
            Arc::clone(&self.engine),
        ))
    }
}
