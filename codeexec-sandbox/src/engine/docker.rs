//! Docker engine over the Docker Engine API

use super::{ContainerSpec, SandboxEngine, SandboxId};
use crate::Result;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, UploadToContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::{StreamExt, TryStreamExt};
use std::time::Duration;

/// How to reach the Docker daemon
#[derive(Debug, Clone)]
pub struct DockerSettings {
    /// Unix socket path (None = platform default / DOCKER_HOST)
    pub socket: Option<String>,
    /// Per-call API timeout; must outlast the longest execution deadline
    pub api_timeout: Duration,
    /// Pull images that are not present locally
    pub pull_missing_images: bool,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            socket: None,
            api_timeout: Duration::from_secs(120),
            pull_missing_images: true,
        }
    }
}

/// Engine backed by a Docker daemon
pub struct DockerEngine {
    docker: Docker,
    pull_missing_images: bool,
}

impl DockerEngine {
    /// Connect lazily; nothing is sent to the daemon until the first call
    pub fn connect(settings: &DockerSettings) -> Result<Self> {
        let docker = match &settings.socket {
            Some(path) => {
                Docker::connect_with_socket(path, settings.api_timeout.as_secs(), API_DEFAULT_VERSION)
                    .with_context(|| format!("Failed to connect to Docker socket {}", path))?
            }
            None => Docker::connect_with_local_defaults()
                .context("Failed to connect to Docker")?
                .with_timeout(settings.api_timeout),
        };

        Ok(Self {
            docker,
            pull_missing_images: settings.pull_missing_images,
        })
    }

    async fn pull(&self, image: &str) -> Result<()> {
        tracing::info!(image, "Pulling image");
        self.docker
            .create_image(
                Some(CreateImageOptions {
                    from_image: image,
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_for_each(|progress| async move {
                if let Some(status) = progress.status {
                    tracing::trace!(status = %status, "pull progress");
                }
                Ok(())
            })
            .await
            .with_context(|| format!("Failed to pull image {}", image))
    }
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl SandboxEngine for DockerEngine {
    async fn ensure_image(&self, image: &str) -> Result<()> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) && self.pull_missing_images => self.pull(image).await,
            Err(err) if is_not_found(&err) => Err(anyhow!("Image {} is not available locally", image)),
            Err(err) => Err(anyhow!(err).context(format!("Failed to inspect image {}", image))),
        }
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<SandboxId> {
        let memory = i64::try_from(spec.memory_bytes).context("Memory limit out of range")?;

        let host_config = HostConfig {
            memory: Some(memory),
            // no swap on top of the memory ceiling
            memory_swap: Some(memory),
            network_mode: spec.network_disabled.then(|| "none".to_string()),
            auto_remove: Some(spec.auto_remove),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.working_dir.clone()),
            network_disabled: Some(spec.network_disabled),
            labels: Some(spec.labels.clone()),
            tty: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await
            .with_context(|| format!("Failed to create container from {}", spec.image))?;

        for warning in &response.warnings {
            tracing::warn!(container = %response.id, warning = %warning, "Docker warning on create");
        }

        Ok(SandboxId(response.id))
    }

    async fn upload(&self, id: &SandboxId, dir: &str, archive: bytes::Bytes) -> Result<()> {
        self.docker
            .upload_to_container(
                &id.0,
                Some(UploadToContainerOptions {
                    path: dir,
                    ..Default::default()
                }),
                archive,
            )
            .await
            .with_context(|| format!("Failed to upload archive to {}", dir))
    }

    async fn start(&self, id: &SandboxId) -> Result<()> {
        self.docker
            .start_container(&id.0, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start container")
    }

    async fn wait(&self, id: &SandboxId) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(&id.0, None::<WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(err)) => Err(anyhow!(err).context("Failed waiting for container")),
            None => Err(anyhow!("Wait stream ended without a status")),
        }
    }

    async fn kill(&self, id: &SandboxId) -> Result<()> {
        self.docker
            .kill_container(&id.0, Some(KillContainerOptions { signal: "SIGKILL" }))
            .await
            .context("Failed to kill container")
    }

    async fn logs(&self, id: &SandboxId) -> Result<String> {
        let chunks: Vec<_> = self
            .docker
            .logs(
                &id.0,
                Some(LogsOptions::<String> {
                    stdout: true,
                    stderr: true,
                    tail: "all".to_string(),
                    ..Default::default()
                }),
            )
            .try_collect()
            .await
            .context("Failed to read container logs")?;

        let mut combined = Vec::new();
        for chunk in chunks {
            combined.extend_from_slice(&chunk.into_bytes());
        }
        Ok(String::from_utf8_lossy(&combined).into_owned())
    }

    async fn remove(&self, id: &SandboxId) -> Result<()> {
        self.docker
            .remove_container(
                &id.0,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .context("Failed to remove container")
    }

    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .context("Docker daemon is not reachable")
    }

    fn name(&self) -> &str {
        "docker"
    }
}
