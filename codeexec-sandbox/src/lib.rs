//! Code execution sandbox - runs untrusted submissions in containers
//!
//! A submission goes through one pipeline per request:
//!
//! ```text
//! registry.resolve -> provision -> inject -> run (deadline) -> collect -> release
//! ```
//!
//! Isolation, memory capping and filesystem containment are delegated to a
//! [`SandboxEngine`] (Docker in production, [`MockEngine`] in tests). The
//! sandbox is released on every path out of the pipeline.

mod collector;
mod engine;
mod error;
mod execution;
mod executor;
mod inject;
mod limits;
mod provision;
mod registry;
mod sandbox;
mod service;
mod types;

pub use collector::collect;
#[cfg(feature = "docker")]
pub use engine::{DockerEngine, DockerSettings};
pub use engine::{
    ContainerSpec, MockEngine, MockProgram, MockStep, ProgramBehavior, SandboxEngine, SandboxId,
    LABEL_EXECUTION_ID, LABEL_LANGUAGE,
};
pub use error::{ErrorKind, SandboxError, SandboxResult};
pub use execution::{ExecutionId, ExecutionPhase};
pub use executor::{run, ExitStatus};
pub use inject::{build_payload, inject};
pub use limits::ResourceLimits;
pub use provision::Provisioner;
pub use registry::{LanguageProfile, LanguageRegistry, WORKDIR};
pub use sandbox::SandboxHandle;
pub use service::SandboxService;
pub use types::{ExecutionRequest, ExecutionResult, TIMEOUT_MESSAGE};

/// Result type for engine-level operations
pub type Result<T> = anyhow::Result<T>;
