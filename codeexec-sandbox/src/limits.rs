//! Resource ceilings applied to every sandbox

use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Resource limits for a sandboxed execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Hard memory ceiling in bytes
    pub memory_bytes: u64,

    /// Deadline used when a request does not carry one
    pub default_timeout: Duration,

    /// Longest deadline a request may ask for
    pub max_timeout: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 512 * MIB,
            default_timeout: Duration::from_secs(10),
            max_timeout: Duration::from_secs(60),
        }
    }
}

impl ResourceLimits {
    pub fn with_memory_mb(mut self, mb: u64) -> Self {
        self.memory_bytes = mb * MIB;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout = timeout;
        self
    }

    /// Sandboxes never get a network, whatever else is configured
    pub fn network_disabled(&self) -> bool {
        true
    }

    pub fn memory_mb(&self) -> u64 {
        self.memory_bytes / MIB
    }
}
