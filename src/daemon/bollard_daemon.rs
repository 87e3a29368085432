//! The one production implementation of [`ContainerDaemon`], backed by the
//! local Docker daemon via `bollard`. Patterned after the ambient stack's
//! own Docker environment: connect once, map 404s to the idempotent
//! "already gone" case, and convert every other daemon error verbatim.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config as BollardContainerConfig, CreateContainerOptions, KillContainerOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{BuildImageOptions, CreateImageOptions};
use bollard::models::{HostConfig, Mount, MountTypeEnum, PortBinding};
use bollard::network::CreateNetworkOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::{HealthCheckConfig, MountMode};
use crate::graph::ContainerSpec;

use super::types::{ContainerDaemon, ContainerHandle, DaemonError, HealthStatus, NetworkHandle, ProgressSink};

pub struct BollardDaemon {
    client: Docker,
}

impl BollardDaemon {
    pub fn connect() -> Result<Self, DaemonError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| DaemonError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    fn is_not_found(err: &bollard::errors::Error) -> bool {
        matches!(
            err,
            bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }
        )
    }
}

#[async_trait]
impl ContainerDaemon for BollardDaemon {
    async fn build(
        &self,
        project_name: &str,
        container: &ContainerSpec,
        progress: ProgressSink<'_>,
    ) -> Result<String, DaemonError> {
        let build_dir = container
            .image_source
            .build_dir()
            .ok_or_else(|| DaemonError::Other("container has no build directory".into()))?;

        let tarball = build_context_tarball(build_dir)
            .map_err(|e| DaemonError::Other(format!("failed to build image context: {e}")))?;

        let tag = format!("{project_name}-{}:latest", container.name);
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.clone(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self.client.build_image(options, None, Some(tarball.into()));
        let mut image_id = None;

        while let Some(chunk) = stream.next().await {
            let info = chunk.map_err(|e| DaemonError::Backend(e.to_string()))?;
            if let Some(stream_text) = info.stream {
                let text = stream_text.trim().to_string();
                if !text.is_empty() {
                    progress(text);
                }
            }
            if let Some(err) = info.error {
                return Err(DaemonError::Backend(err));
            }
            if let Some(aux) = info.aux {
                if let Some(id) = aux.id {
                    image_id = Some(id);
                }
            }
        }

        Ok(image_id.unwrap_or(tag))
    }

    async fn pull(&self, image_ref: &str) -> Result<String, DaemonError> {
        let options = CreateImageOptions {
            from_image: image_ref,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| DaemonError::Backend(e.to_string()))?;
            if let Some(status) = info.status {
                debug!("pull {}: {}", image_ref, status);
            }
        }

        Ok(image_ref.to_string())
    }

    async fn create_bridge_network(&self, project_name: &str) -> Result<NetworkHandle, DaemonError> {
        let name = format!("{project_name}-{}", uuid::Uuid::new_v4());
        let options = CreateNetworkOptions {
            name: name.as_str(),
            driver: "bridge",
            ..Default::default()
        };
        let response = self
            .client
            .create_network(options)
            .await
            .map_err(|e| DaemonError::Backend(e.to_string()))?;
        Ok(NetworkHandle::new(response.id.unwrap_or(name)))
    }

    async fn delete_network(&self, network: &NetworkHandle) -> Result<(), DaemonError> {
        match self
            .client
            .remove_network(&network.id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if Self::is_not_found(&e) => Ok(()),
            Err(e) => Err(DaemonError::Backend(e.to_string())),
        }
    }

    async fn create(
        &self,
        spec: &ContainerSpec,
        image_id: &str,
        network: &NetworkHandle,
    ) -> Result<ContainerHandle, DaemonError> {
        let container_name = format!("{}-{}", spec.name, uuid::Uuid::new_v4());

        let env_vars: Vec<String> = spec
            .environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let mut exposed_ports = HashMap::new();
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for port in &spec.ports {
            let key = format!("{}/tcp", port.container_port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(port.host_port.to_string()),
                }]),
            );
        }

        let mounts: Vec<Mount> = spec
            .volumes
            .iter()
            .map(|mount| Mount {
                source: Some(mount.host_path.clone()),
                target: Some(mount.container_path.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(mount.mode == MountMode::ReadOnly),
                ..Default::default()
            })
            .collect();

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            mounts: Some(mounts),
            network_mode: Some(network.id.clone()),
            ..Default::default()
        };

        let config = BollardContainerConfig {
            image: Some(image_id.to_string()),
            env: Some(env_vars),
            cmd: if spec.command.is_empty() {
                None
            } else {
                Some(spec.command.clone())
            },
            working_dir: spec.working_directory.clone(),
            exposed_ports: Some(exposed_ports),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(true),
            tty: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let response = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(|e| DaemonError::Backend(e.to_string()))?;

        for warning in response.warnings {
            warn!("container creation warning for {}: {}", spec.name, warning);
        }

        Ok(ContainerHandle::new(response.id))
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        self.client
            .start_container(&handle.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| DaemonError::Backend(e.to_string()))
    }

    async fn run(&self, handle: &ContainerHandle) -> Result<i64, DaemonError> {
        self.client
            .start_container(&handle.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| DaemonError::Backend(e.to_string()))?;

        let mut attach = self
            .client
            .attach_container(
                &handle.id,
                Some(bollard::container::AttachContainerOptions::<String> {
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    logs: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| DaemonError::Backend(e.to_string()))?;

        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(Ok(chunk)) = attach.output.next().await {
                let _ = stdout.write_all(chunk.into_bytes().as_ref()).await;
            }
        });

        let mut wait_stream = self.client.wait_container(&handle.id, None::<WaitContainerOptions<String>>);
        match wait_stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(e)) => Err(DaemonError::Backend(e.to_string())),
            None => Err(DaemonError::Other("container exited without a wait response".into())),
        }
    }

    async fn wait_for_health_status(
        &self,
        handle: &ContainerHandle,
        health_check: Option<&HealthCheckConfig>,
    ) -> Result<HealthStatus, DaemonError> {
        let Some(health_check) = health_check else {
            return Ok(HealthStatus::NoHealthCheck);
        };

        let mut consecutive_failures = 0u32;
        loop {
            let inspection = self
                .client
                .inspect_container(&handle.id, None)
                .await
                .map_err(|e| DaemonError::Backend(e.to_string()))?;

            let running = inspection
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false);
            if !running {
                return Ok(HealthStatus::Exited);
            }

            let exec = self
                .client
                .create_exec(
                    &handle.id,
                    CreateExecOptions {
                        cmd: shell_words::split(&health_check.command).ok(),
                        attach_stdout: Some(true),
                        attach_stderr: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| DaemonError::Backend(e.to_string()))?;

            let healthy = match self
                .client
                .start_exec(&exec.id, None)
                .await
                .map_err(|e| DaemonError::Backend(e.to_string()))?
            {
                StartExecResults::Attached { mut output, .. } => {
                    while output.next().await.is_some() {}
                    let inspect = self
                        .client
                        .inspect_exec(&exec.id)
                        .await
                        .map_err(|e| DaemonError::Backend(e.to_string()))?;
                    inspect.exit_code == Some(0)
                }
                StartExecResults::Detached => false,
            };

            if healthy {
                return Ok(HealthStatus::BecameHealthy);
            }

            consecutive_failures += 1;
            if consecutive_failures >= health_check.retries {
                return Ok(HealthStatus::BecameUnhealthy);
            }

            tokio::time::sleep(Duration::from_secs(health_check.interval_secs)).await;
        }
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        match self
            .client
            .stop_container(&handle.id, Some(StopContainerOptions { t: 30 }))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if Self::is_not_found(&e) => Ok(()),
            Err(e) => {
                let _ = self
                    .client
                    .kill_container(&handle.id, Some(KillContainerOptions { signal: "SIGKILL" }))
                    .await;
                Err(DaemonError::Backend(e.to_string()))
            }
        }
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        let options = RemoveContainerOptions {
            force: false,
            v: false,
            ..Default::default()
        };
        match self.client.remove_container(&handle.id, Some(options)).await {
            Ok(()) => {
                info!("removed container {}", handle.id);
                Ok(())
            }
            Err(e) if Self::is_not_found(&e) => Err(DaemonError::ContainerDoesNotExist),
            Err(e) => Err(DaemonError::Backend(e.to_string())),
        }
    }

    async fn forcibly_remove(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        let options = RemoveContainerOptions {
            force: true,
            v: false,
            ..Default::default()
        };
        match self.client.remove_container(&handle.id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if Self::is_not_found(&e) => Ok(()),
            Err(e) => Err(DaemonError::Backend(e.to_string())),
        }
    }
}

fn build_context_tarball(build_dir: &str) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut buffer);
        builder.append_dir_all(".", build_dir)?;
        builder.finish()?;
    }
    Ok(buffer)
}
