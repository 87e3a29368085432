//! Daemon-facing types shared by every implementation of [`ContainerDaemon`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::HealthCheckConfig;
use crate::graph::ContainerSpec;

/// Opaque handle to a created container, as returned by `create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Opaque handle to a created network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkHandle {
    pub id: String,
}

impl NetworkHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The result of polling a container's health status (§4.5 mapping table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The container has no health check configured; it is considered
    /// healthy as soon as it has started.
    NoHealthCheck,
    BecameHealthy,
    BecameUnhealthy,
    Exited,
}

/// A typed daemon failure. The engine never inspects the content of a
/// failure beyond forwarding its `Display` output as an event's `msg`
/// field (§7, propagation policy).
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("docker daemon error: {0}")]
    Backend(String),

    #[error("container does not exist")]
    ContainerDoesNotExist,

    #[error("network does not exist")]
    NetworkDoesNotExist,

    #[error("{0}")]
    Other(String),
}

impl From<bollard::errors::Error> for DaemonError {
    fn from(e: bollard::errors::Error) -> Self {
        DaemonError::Backend(e.to_string())
    }
}

/// Callback used by `build` to report incremental progress lines. Takes a
/// closure rather than a channel so fakes in tests can assert on calls
/// without standing up an async channel.
pub type ProgressSink<'a> = &'a (dyn Fn(String) + Send + Sync);

/// The container daemon abstraction (§6). The engine depends only on
/// this trait; `BollardDaemon` is the one production implementation, and
/// `fake::FakeDaemon` (test-only) backs planner/execution-manager
/// integration tests without a real Docker daemon.
#[async_trait]
pub trait ContainerDaemon: Send + Sync {
    /// Build an image from the given container's build directory.
    async fn build(
        &self,
        project_name: &str,
        container: &ContainerSpec,
        progress: ProgressSink<'_>,
    ) -> Result<String, DaemonError>;

    /// Pull a pre-built image by reference.
    async fn pull(&self, image_ref: &str) -> Result<String, DaemonError>;

    /// Create a bridge network scoped to this task run.
    async fn create_bridge_network(&self, project_name: &str) -> Result<NetworkHandle, DaemonError>;

    /// Delete a previously created network.
    async fn delete_network(&self, network: &NetworkHandle) -> Result<(), DaemonError>;

    /// Create (but do not start) a container.
    async fn create(
        &self,
        spec: &ContainerSpec,
        image_id: &str,
        network: &NetworkHandle,
    ) -> Result<ContainerHandle, DaemonError>;

    /// Start a dependency container in the background.
    async fn start(&self, handle: &ContainerHandle) -> Result<(), DaemonError>;

    /// Run the task container in the foreground, forwarding its stdio,
    /// suspending until it exits.
    async fn run(&self, handle: &ContainerHandle) -> Result<i64, DaemonError>;

    /// Poll a container's health, suspending until a definitive answer is
    /// available (or the configured retries are exhausted).
    async fn wait_for_health_status(
        &self,
        handle: &ContainerHandle,
        health_check: Option<&HealthCheckConfig>,
    ) -> Result<HealthStatus, DaemonError>;

    /// Stop a running container, using its configured stop mechanism.
    async fn stop(&self, handle: &ContainerHandle) -> Result<(), DaemonError>;

    /// Remove a container. Returns `Ok(())` even if the container does
    /// not exist (idempotent cleanup, per §7 propagation policy) — that
    /// translation happens in the step runner, not here, so that callers
    /// distinguishing `ContainerDoesNotExist` from other failures still
    /// can.
    async fn remove(&self, handle: &ContainerHandle) -> Result<(), DaemonError>;

    /// Forcibly remove a container, tolerant of it already being gone.
    async fn forcibly_remove(&self, handle: &ContainerHandle) -> Result<(), DaemonError>;
}
