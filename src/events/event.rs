//! The complete taxonomy of domain events produced while running a task.

use serde::{Deserialize, Serialize};

use crate::daemon::{ContainerHandle, NetworkHandle};

/// One observed outcome of a step, or an intermediate signal such as
/// build progress. Events are immutable once posted; the log that holds
/// them preserves posting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskStarted,

    TaskNetworkCreated { network: NetworkHandle },
    TaskNetworkCreationFailed { message: String },

    ImageBuildProgress { container: String, progress: String },
    ImageBuilt { container: String, image_id: String },
    ImageBuildFailed { container: String, message: String },

    ImagePulled { container: String, image_ref: String, image_id: String },
    ImagePullFailed { container: String, image_ref: String, message: String },

    ContainerCreated { container: String, handle: ContainerHandle },
    ContainerCreationFailed { container: String, message: String },

    ContainerStarted { container: String },
    ContainerStartFailed { container: String, message: String },

    ContainerBecameHealthy { container: String },
    ContainerDidNotBecomeHealthy { container: String, message: String },

    RunningContainerExited { container: String, exit_code: i64 },

    ContainerStopped { container: String },
    ContainerStopFailed { container: String, message: String },

    ContainerRemoved { container: String },
    ContainerRemovalFailed { container: String, message: String },

    TaskNetworkDeleted,
    TaskNetworkDeletionFailed { message: String },
}

impl TaskEvent {
    /// The container this event concerns, if any. Network- and
    /// task-scoped events (e.g. `TaskStarted`) return `None`.
    pub fn container(&self) -> Option<&str> {
        match self {
            TaskEvent::ImageBuildProgress { container, .. }
            | TaskEvent::ImageBuilt { container, .. }
            | TaskEvent::ImageBuildFailed { container, .. }
            | TaskEvent::ImagePulled { container, .. }
            | TaskEvent::ImagePullFailed { container, .. }
            | TaskEvent::ContainerCreated { container, .. }
            | TaskEvent::ContainerCreationFailed { container, .. }
            | TaskEvent::ContainerStarted { container }
            | TaskEvent::ContainerStartFailed { container, .. }
            | TaskEvent::ContainerBecameHealthy { container }
            | TaskEvent::ContainerDidNotBecomeHealthy { container, .. }
            | TaskEvent::RunningContainerExited { container, .. }
            | TaskEvent::ContainerStopped { container }
            | TaskEvent::ContainerStopFailed { container, .. }
            | TaskEvent::ContainerRemoved { container }
            | TaskEvent::ContainerRemovalFailed { container, .. } => Some(container),
            TaskEvent::TaskStarted
            | TaskEvent::TaskNetworkCreated { .. }
            | TaskEvent::TaskNetworkCreationFailed { .. }
            | TaskEvent::TaskNetworkDeleted
            | TaskEvent::TaskNetworkDeletionFailed { .. } => None,
        }
    }

    /// True for any `*Failed` variant, regardless of what it concerns.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskEvent::TaskNetworkCreationFailed { .. }
                | TaskEvent::ImageBuildFailed { .. }
                | TaskEvent::ImagePullFailed { .. }
                | TaskEvent::ContainerCreationFailed { .. }
                | TaskEvent::ContainerStartFailed { .. }
                | TaskEvent::ContainerDidNotBecomeHealthy { .. }
                | TaskEvent::ContainerStopFailed { .. }
                | TaskEvent::ContainerRemovalFailed { .. }
                | TaskEvent::TaskNetworkDeletionFailed { .. }
        )
    }

    /// A short human-readable description, used by the manual-cleanup
    /// instructions and the simple UI sink.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            TaskEvent::TaskNetworkCreationFailed { message }
            | TaskEvent::ImageBuildFailed { message, .. }
            | TaskEvent::ContainerCreationFailed { message, .. }
            | TaskEvent::ContainerStartFailed { message, .. }
            | TaskEvent::ContainerDidNotBecomeHealthy { message, .. }
            | TaskEvent::ContainerStopFailed { message, .. }
            | TaskEvent::ContainerRemovalFailed { message, .. }
            | TaskEvent::TaskNetworkDeletionFailed { message } => Some(message),
            TaskEvent::ImagePullFailed { message, .. } => Some(message),
            _ => None,
        }
    }
}
