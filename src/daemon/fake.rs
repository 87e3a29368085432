//! An in-memory fake of [`ContainerDaemon`] for planner and execution
//! manager tests, so those tests run without a real Docker daemon. Mirrors
//! the "trait + concrete impl" seam `BollardDaemon` fills in production.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::HealthCheckConfig;
use crate::graph::ContainerSpec;

use super::types::{ContainerDaemon, ContainerHandle, DaemonError, HealthStatus, NetworkHandle, ProgressSink};

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    image_build_failures: HashSet<String>,
    image_pull_failures: HashSet<String>,
    create_failures: HashSet<String>,
    start_failures: HashSet<String>,
    unhealthy_containers: HashSet<String>,
    never_healthy_containers: HashSet<String>,
    stop_failures: HashSet<String>,
    remove_failures: HashSet<String>,
    already_removed: HashSet<String>,
    exit_codes: HashMap<String, i64>,
    network_create_fails: bool,
    network_delete_fails: bool,
}

/// Scriptable fake container daemon.
pub struct FakeDaemon {
    state: Mutex<FakeState>,
    next_id: AtomicU64,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            next_id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> String {
        format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn fail_image_build(&self, container: &str) {
        self.state.lock().image_build_failures.insert(container.to_string());
    }

    pub fn fail_image_pull(&self, container: &str) {
        self.state.lock().image_pull_failures.insert(container.to_string());
    }

    pub fn fail_create(&self, container: &str) {
        self.state.lock().create_failures.insert(container.to_string());
    }

    pub fn fail_start(&self, container: &str) {
        self.state.lock().start_failures.insert(container.to_string());
    }

    pub fn report_unhealthy(&self, container: &str) {
        self.state.lock().unhealthy_containers.insert(container.to_string());
    }

    pub fn never_becomes_healthy(&self, container: &str) {
        self.state.lock().never_healthy_containers.insert(container.to_string());
    }

    pub fn fail_stop(&self, container: &str) {
        self.state.lock().stop_failures.insert(container.to_string());
    }

    pub fn fail_remove(&self, container: &str) {
        self.state.lock().remove_failures.insert(container.to_string());
    }

    pub fn already_removed(&self, container: &str) {
        self.state.lock().already_removed.insert(container.to_string());
    }

    pub fn set_exit_code(&self, container: &str, code: i64) {
        self.state.lock().exit_codes.insert(container.to_string(), code);
    }

    pub fn fail_network_create(&self) {
        self.state.lock().network_create_fails = true;
    }

    pub fn fail_network_delete(&self) {
        self.state.lock().network_delete_fails = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().calls.push(call.into());
    }
}

impl Default for FakeDaemon {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerDaemon for FakeDaemon {
    async fn build(
        &self,
        _project_name: &str,
        container: &ContainerSpec,
        progress: ProgressSink<'_>,
    ) -> Result<String, DaemonError> {
        self.record(format!("build:{}", container.name));
        progress(format!("building {}", container.name));
        if self.state.lock().image_build_failures.contains(&container.name) {
            return Err(DaemonError::Other("fake build failure".into()));
        }
        Ok(format!("image-{}", container.name))
    }

    async fn pull(&self, image_ref: &str) -> Result<String, DaemonError> {
        self.record(format!("pull:{image_ref}"));
        if self.state.lock().image_pull_failures.contains(image_ref) {
            return Err(DaemonError::Other("fake pull failure".into()));
        }
        Ok(format!("image-{image_ref}"))
    }

    async fn create_bridge_network(&self, _project_name: &str) -> Result<NetworkHandle, DaemonError> {
        self.record("create_network");
        if self.state.lock().network_create_fails {
            return Err(DaemonError::Other("fake network create failure".into()));
        }
        Ok(NetworkHandle::new(self.next_id()))
    }

    async fn delete_network(&self, _network: &NetworkHandle) -> Result<(), DaemonError> {
        self.record("delete_network");
        if self.state.lock().network_delete_fails {
            return Err(DaemonError::Other("fake network delete failure".into()));
        }
        Ok(())
    }

    async fn create(
        &self,
        spec: &ContainerSpec,
        _image_id: &str,
        _network: &NetworkHandle,
    ) -> Result<ContainerHandle, DaemonError> {
        self.record(format!("create:{}", spec.name));
        if self.state.lock().create_failures.contains(&spec.name) {
            return Err(DaemonError::Other("fake create failure".into()));
        }
        Ok(ContainerHandle::new(format!("{}-{}", spec.name, self.next_id())))
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        self.record(format!("start:{}", handle.id));
        let name = container_name(&handle.id);
        if self.state.lock().start_failures.contains(&name) {
            return Err(DaemonError::Other("fake start failure".into()));
        }
        Ok(())
    }

    async fn run(&self, handle: &ContainerHandle) -> Result<i64, DaemonError> {
        self.record(format!("run:{}", handle.id));
        let name = container_name(&handle.id);
        Ok(*self.state.lock().exit_codes.get(&name).unwrap_or(&0))
    }

    async fn wait_for_health_status(
        &self,
        handle: &ContainerHandle,
        health_check: Option<&HealthCheckConfig>,
    ) -> Result<HealthStatus, DaemonError> {
        self.record(format!("wait_healthy:{}", handle.id));
        if health_check.is_none() {
            return Ok(HealthStatus::NoHealthCheck);
        }
        let name = container_name(&handle.id);
        let state = self.state.lock();
        if state.never_healthy_containers.contains(&name) {
            Ok(HealthStatus::Exited)
        } else if state.unhealthy_containers.contains(&name) {
            Ok(HealthStatus::BecameUnhealthy)
        } else {
            Ok(HealthStatus::BecameHealthy)
        }
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        self.record(format!("stop:{}", handle.id));
        let name = container_name(&handle.id);
        if self.state.lock().stop_failures.contains(&name) {
            return Err(DaemonError::Other("fake stop failure".into()));
        }
        Ok(())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        self.record(format!("remove:{}", handle.id));
        let name = container_name(&handle.id);
        let state = self.state.lock();
        if state.already_removed.contains(&name) {
            return Err(DaemonError::ContainerDoesNotExist);
        }
        if state.remove_failures.contains(&name) {
            return Err(DaemonError::Other("fake remove failure".into()));
        }
        Ok(())
    }

    async fn forcibly_remove(&self, handle: &ContainerHandle) -> Result<(), DaemonError> {
        self.record(format!("forcibly_remove:{}", handle.id));
        let name = container_name(&handle.id);
        if self.state.lock().already_removed.contains(&name) {
            return Ok(());
        }
        if self.state.lock().remove_failures.contains(&name) {
            return Err(DaemonError::Other("fake forcible remove failure".into()));
        }
        Ok(())
    }
}

/// Handles minted by `create` are `"{container-name}-fake-{n}"`; recover
/// the container name so later calls can look up per-container scripting.
fn container_name(handle_id: &str) -> String {
    match handle_id.rfind("-fake-") {
        Some(idx) => handle_id[..idx].to_string(),
        None => handle_id.to_string(),
    }
}
