//! Configuration management for the execution server

use codeexec_sandbox::{DockerSettings, LanguageRegistry, ResourceLimits};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub docker: DockerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    #[serde(default = "ServerConfig::default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Self::default_bind_address(),
        }
    }
}

impl ServerConfig {
    fn default_bind_address() -> String {
        "0.0.0.0:8000".to_string()
    }
}

/// Sandbox limits. Network access is always disabled and not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "SandboxConfig::default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "SandboxConfig::default_timeout_secs")]
    pub default_timeout_secs: u64,
    #[serde(default = "SandboxConfig::default_max_timeout_secs")]
    pub max_timeout_secs: u64,
    #[serde(default = "SandboxConfig::default_pull_missing_images")]
    pub pull_missing_images: bool,
    /// Language id -> image reference; only existing languages can be overridden
    #[serde(default)]
    pub image_overrides: BTreeMap<String, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: Self::default_memory_limit_mb(),
            default_timeout_secs: Self::default_timeout_secs(),
            max_timeout_secs: Self::default_max_timeout_secs(),
            pull_missing_images: Self::default_pull_missing_images(),
            image_overrides: BTreeMap::new(),
        }
    }
}

impl SandboxConfig {
    fn default_memory_limit_mb() -> u64 {
        512
    }

    fn default_timeout_secs() -> u64 {
        10
    }

    fn default_max_timeout_secs() -> u64 {
        60
    }

    fn default_pull_missing_images() -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Unix socket path (unset = DOCKER_HOST or the platform default)
    #[serde(default)]
    pub socket: Option<String>,
    /// Per-call API timeout, e.g. "2m"
    #[serde(default = "DockerConfig::default_api_timeout", with = "humantime_serde")]
    pub api_timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: None,
            api_timeout: Self::default_api_timeout(),
        }
    }
}

impl DockerConfig {
    fn default_api_timeout() -> Duration {
        Duration::from_secs(120)
    }
}

/// Values from the command line or `CODEEXEC_*` variables, applied over the
/// file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub docker_socket: Option<String>,
    pub memory_limit_mb: Option<u64>,
    pub default_timeout_secs: Option<u64>,
    pub max_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load configuration from a TOML file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides and re-validate the merged configuration
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(socket) = overrides.docker_socket {
            self.docker.socket = Some(socket);
        }
        if let Some(mb) = overrides.memory_limit_mb {
            self.sandbox.memory_limit_mb = mb;
        }
        if let Some(secs) = overrides.default_timeout_secs {
            self.sandbox.default_timeout_secs = secs;
        }
        if let Some(secs) = overrides.max_timeout_secs {
            self.sandbox.max_timeout_secs = secs;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sandbox = &self.sandbox;
        if sandbox.memory_limit_mb == 0 {
            return Err(ConfigError::Invalid("memory_limit_mb must be positive".into()));
        }
        if sandbox.default_timeout_secs == 0
            || sandbox.default_timeout_secs > sandbox.max_timeout_secs
        {
            return Err(ConfigError::Invalid(format!(
                "default_timeout_secs must be within 1..={}",
                sandbox.max_timeout_secs
            )));
        }
        // the engine call that waits for the program must outlive its deadline
        if self.docker.api_timeout <= Duration::from_secs(sandbox.max_timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "docker.api_timeout ({}s) must exceed max_timeout_secs ({}s)",
                self.docker.api_timeout.as_secs(),
                sandbox.max_timeout_secs
            )));
        }
        self.registry().map(|_| ())
    }

    /// Built-in registry with configured image overrides applied
    pub fn registry(&self) -> Result<LanguageRegistry, ConfigError> {
        self.sandbox
            .image_overrides
            .iter()
            .try_fold(LanguageRegistry::builtin(), |registry, (language, image)| {
                registry
                    .with_image_override(language, image.clone())
                    .map_err(|e| ConfigError::Invalid(format!("image_overrides: {}", e)))
            })
    }

    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits::default()
            .with_memory_mb(self.sandbox.memory_limit_mb)
            .with_default_timeout(Duration::from_secs(self.sandbox.default_timeout_secs))
            .with_max_timeout(Duration::from_secs(self.sandbox.max_timeout_secs))
    }

    pub fn docker_settings(&self) -> DockerSettings {
        DockerSettings {
            socket: self.docker.socket.clone(),
            api_timeout: self.docker.api_timeout,
            pull_missing_images: self.sandbox.pull_missing_images,
        }
    }
}
