//! The task step taxonomy (§3): the atomic units of work the step runner
//! dispatches against a [`crate::daemon::ContainerDaemon`].

use crate::config::HealthCheckConfig;
use crate::daemon::{ContainerHandle, NetworkHandle};
use crate::graph::ContainerSpec;

/// One unit of work ready to be dispatched, as emitted by a stage planner.
#[derive(Debug, Clone)]
pub enum TaskStep {
    BeginTask,
    BuildImage {
        container: ContainerSpec,
    },
    PullImage {
        container: String,
        image_ref: String,
    },
    CreateTaskNetwork,
    CreateContainer {
        container: ContainerSpec,
        image_id: String,
        network: NetworkHandle,
    },
    /// The task container only.
    RunContainer {
        container: String,
        handle: ContainerHandle,
    },
    /// Dependency containers only.
    StartContainer {
        container: String,
        handle: ContainerHandle,
    },
    WaitForContainerToBecomeHealthy {
        container: String,
        handle: ContainerHandle,
        health_check: Option<HealthCheckConfig>,
    },
    StopContainer {
        container: String,
        handle: ContainerHandle,
    },
    RemoveContainer {
        container: String,
        handle: ContainerHandle,
    },
    /// Forcible removal, tolerant of the container already being gone.
    CleanUpContainer {
        container: String,
        handle: ContainerHandle,
    },
    DeleteTaskNetwork {
        network: NetworkHandle,
    },
    DisplayTaskFailure {
        instructions: Vec<String>,
    },
    FinishTask,
}

/// The identity the execution manager uses to suppress duplicate dispatch
/// of the same logical step (§4.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepIdentity {
    BeginTask,
    BuildImage(String),
    /// Keyed by image reference, not container: pulls for identical
    /// references are coalesced into a single dispatched step (§4.3).
    PullImage(String),
    CreateTaskNetwork,
    CreateContainer(String),
    RunContainer(String),
    StartContainer(String),
    WaitForHealthy(String),
    StopContainer(String),
    RemoveContainer(String),
    CleanUpContainer(String),
    DeleteTaskNetwork,
    DisplayTaskFailure,
    FinishTask,
}

impl TaskStep {
    pub fn identity(&self) -> StepIdentity {
        match self {
            TaskStep::BeginTask => StepIdentity::BeginTask,
            TaskStep::BuildImage { container } => StepIdentity::BuildImage(container.name.clone()),
            TaskStep::PullImage { image_ref, .. } => StepIdentity::PullImage(image_ref.clone()),
            TaskStep::CreateTaskNetwork => StepIdentity::CreateTaskNetwork,
            TaskStep::CreateContainer { container, .. } => StepIdentity::CreateContainer(container.name.clone()),
            TaskStep::RunContainer { container, .. } => StepIdentity::RunContainer(container.clone()),
            TaskStep::StartContainer { container, .. } => StepIdentity::StartContainer(container.clone()),
            TaskStep::WaitForContainerToBecomeHealthy { container, .. } => {
                StepIdentity::WaitForHealthy(container.clone())
            }
            TaskStep::StopContainer { container, .. } => StepIdentity::StopContainer(container.clone()),
            TaskStep::RemoveContainer { container, .. } => StepIdentity::RemoveContainer(container.clone()),
            TaskStep::CleanUpContainer { container, .. } => StepIdentity::CleanUpContainer(container.clone()),
            TaskStep::DeleteTaskNetwork { .. } => StepIdentity::DeleteTaskNetwork,
            TaskStep::DisplayTaskFailure { .. } => StepIdentity::DisplayTaskFailure,
            TaskStep::FinishTask => StepIdentity::FinishTask,
        }
    }

    /// A short human-readable label for the UI sink's "step starting" hook.
    pub fn label(&self) -> String {
        match self {
            TaskStep::BeginTask => "starting task".to_string(),
            TaskStep::BuildImage { container } => format!("building {}", container.name),
            TaskStep::PullImage { container, image_ref } => format!("pulling {image_ref} for {container}"),
            TaskStep::CreateTaskNetwork => "creating network".to_string(),
            TaskStep::CreateContainer { container, .. } => format!("creating {}", container.name),
            TaskStep::RunContainer { container, .. } => format!("running {container}"),
            TaskStep::StartContainer { container, .. } => format!("starting {container}"),
            TaskStep::WaitForContainerToBecomeHealthy { container, .. } => format!("waiting for {container} to be healthy"),
            TaskStep::StopContainer { container, .. } => format!("stopping {container}"),
            TaskStep::RemoveContainer { container, .. } => format!("removing {container}"),
            TaskStep::CleanUpContainer { container, .. } => format!("cleaning up {container}"),
            TaskStep::DeleteTaskNetwork { .. } => "deleting network".to_string(),
            TaskStep::DisplayTaskFailure { .. } => "task failed".to_string(),
            TaskStep::FinishTask => "finishing task".to_string(),
        }
    }
}
