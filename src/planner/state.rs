//! Per-container state derivation from an event log snapshot (§4.3).

use std::collections::HashSet;

use crate::events::TaskEvent;
use crate::graph::DependencyGraph;
use crate::steps::TaskStep;

/// The state of a single container node, derived purely from the events
/// observed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    NotStarted,
    ImageReady,
    Creatable,
    Created,
    Started,
    Healthy,
    Exited,
    Failed,
}

/// The outcome of a planning pass: the steps ready to dispatch now, plus a
/// terminal signal. Both planners (run-stage, cleanup-stage) produce this.
#[derive(Debug, Clone, Default)]
pub struct PlanResult {
    pub ready_steps: Vec<TaskStep>,
    pub terminal: Terminal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Terminal {
    #[default]
    None,
    Success,
    Failure(String),
}

/// Whether `container`'s image is ready: built (checked per-container) or
/// pulled (checked by image reference, since pulls for identical
/// references are coalesced — any container sharing the reference
/// observes the same pull's outcome, §4.3).
pub fn has_image_ready(graph: &DependencyGraph, events: &[TaskEvent], container: &str) -> bool {
    let Some(spec) = graph.spec(container) else { return false };
    match &spec.image_source {
        crate::config::ImageSource::Build { .. } => events
            .iter()
            .any(|e| matches!(e, TaskEvent::ImageBuilt { container: c, .. } if c == container)),
        crate::config::ImageSource::Pull { image } => events
            .iter()
            .any(|e| matches!(e, TaskEvent::ImagePulled { image_ref, .. } if image_ref == image)),
    }
}

pub fn has_network_created(events: &[TaskEvent]) -> bool {
    events.iter().any(|e| matches!(e, TaskEvent::TaskNetworkCreated { .. }))
}

pub fn network_handle(events: &[TaskEvent]) -> Option<crate::daemon::NetworkHandle> {
    events.iter().find_map(|e| match e {
        TaskEvent::TaskNetworkCreated { network } => Some(network.clone()),
        _ => None,
    })
}

pub fn image_id(graph: &DependencyGraph, events: &[TaskEvent], container: &str) -> Option<String> {
    let spec = graph.spec(container)?;
    match &spec.image_source {
        crate::config::ImageSource::Build { .. } => events.iter().find_map(|e| match e {
            TaskEvent::ImageBuilt { container: c, image_id } if c == container => Some(image_id.clone()),
            _ => None,
        }),
        crate::config::ImageSource::Pull { image } => events.iter().find_map(|e| match e {
            TaskEvent::ImagePulled { image_ref, image_id, .. } if image_ref == image => Some(image_id.clone()),
            _ => None,
        }),
    }
}

pub fn container_handle(events: &[TaskEvent], container: &str) -> Option<crate::daemon::ContainerHandle> {
    events.iter().find_map(|e| match e {
        TaskEvent::ContainerCreated { container: c, handle } if c == container => Some(handle.clone()),
        _ => None,
    })
}

fn has_failure_for(events: &[TaskEvent], container: &str) -> bool {
    events.iter().any(|e| e.is_failure() && e.container() == Some(container))
}

/// Derive the state of node `name` from an event snapshot, given the
/// graph for predecessor lookups.
pub fn derive_state(graph: &DependencyGraph, events: &[TaskEvent], name: &str) -> NodeState {
    if has_failure_for(events, name) {
        return NodeState::Failed;
    }

    let is_root = graph.root() == name;

    if is_root {
        if events
            .iter()
            .any(|e| matches!(e, TaskEvent::RunningContainerExited { container, .. } if container == name))
        {
            return NodeState::Exited;
        }
    } else if events
        .iter()
        .any(|e| matches!(e, TaskEvent::ContainerBecameHealthy { container } if container == name))
    {
        return NodeState::Healthy;
    }

    if events
        .iter()
        .any(|e| matches!(e, TaskEvent::ContainerStarted { container } if container == name))
    {
        return NodeState::Started;
    }

    if events
        .iter()
        .any(|e| matches!(e, TaskEvent::ContainerCreated { container, .. } if container == name))
    {
        return NodeState::Created;
    }

    let predecessors: HashSet<&str> = graph.predecessors(name);
    let predecessors_healthy = predecessors
        .iter()
        .all(|p| derive_state(graph, events, p) == NodeState::Healthy);

    if has_image_ready(graph, events, name) && has_network_created(events) && predecessors_healthy {
        return NodeState::Creatable;
    }

    if has_image_ready(graph, events, name) {
        return NodeState::ImageReady;
    }

    NodeState::NotStarted
}
