//! Runtime engine trait and implementations

#[cfg(feature = "docker")]
mod docker;
mod mock;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

#[cfg(feature = "docker")]
pub use docker::{DockerEngine, DockerSettings};
pub use mock::{MockEngine, MockProgram, MockStep, ProgramBehavior};

/// Label carrying the execution id on every created sandbox
pub const LABEL_EXECUTION_ID: &str = "codeexec.execution_id";
/// Label carrying the language id on every created sandbox
pub const LABEL_LANGUAGE: &str = "codeexec.language";

/// Engine-assigned identifier of a created sandbox
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxId(pub String);

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the engine needs to create one sandbox
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub working_dir: String,
    pub memory_bytes: u64,
    pub network_disabled: bool,
    /// Must stay false: output is read after exit, before removal
    pub auto_remove: bool,
    pub labels: HashMap<String, String>,
}

/// Isolation backend the pipeline delegates to. One instance is shared by
/// all requests; every method addresses a single sandbox by id.
#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Make sure the image is available locally
    async fn ensure_image(&self, image: &str) -> Result<()>;

    /// Create (but do not start) a sandbox
    async fn create(&self, spec: &ContainerSpec) -> Result<SandboxId>;

    /// Extract a tar archive into `dir` inside the sandbox
    async fn upload(&self, id: &SandboxId, dir: &str, archive: Bytes) -> Result<()>;

    async fn start(&self, id: &SandboxId) -> Result<()>;

    /// Block until the sandbox process exits and return its exit code
    async fn wait(&self, id: &SandboxId) -> Result<i64>;

    async fn kill(&self, id: &SandboxId) -> Result<()>;

    /// Combined stdout/stderr, in the order it was produced
    async fn logs(&self, id: &SandboxId) -> Result<String>;

    /// Destroy the sandbox, whatever state it is in
    async fn remove(&self, id: &SandboxId) -> Result<()>;

    /// Check the engine is reachable
    async fn ping(&self) -> Result<()>;

    /// Get engine name
    fn name(&self) -> &str;
}
