//! The run-stage planner (§4.3): a pure function from `(graph, events)` to
//! the set of steps now ready to dispatch, plus a terminal signal.

use std::collections::HashSet;

use crate::daemon::NetworkHandle;
use crate::events::TaskEvent;
use crate::graph::DependencyGraph;
use crate::steps::TaskStep;

use super::state::{self, NodeState, PlanResult, Terminal};

/// Plan the next batch of ready steps given the current event log snapshot.
/// Never mutates anything and never performs I/O; safe to call repeatedly
/// as the log grows.
pub fn plan(graph: &DependencyGraph, events: &[TaskEvent]) -> PlanResult {
    if let Some(reason) = failure_reason(events) {
        return PlanResult {
            ready_steps: Vec::new(),
            terminal: Terminal::Failure(reason),
        };
    }

    if events
        .iter()
        .any(|e| matches!(e, TaskEvent::RunningContainerExited { container, .. } if container == graph.root()))
    {
        return PlanResult {
            ready_steps: Vec::new(),
            terminal: Terminal::Success,
        };
    }

    let mut ready = Vec::new();

    if events.is_empty() {
        ready.push(TaskStep::BeginTask);
        return PlanResult { ready_steps: ready, terminal: Terminal::None };
    }

    let network_ready = state::has_network_created(events);
    if !network_ready {
        ready.push(TaskStep::CreateTaskNetwork);
    }

    let names: Vec<&str> = graph.node_names().collect();

    for &name in &names {
        if state::has_image_ready(graph, events, name) {
            continue;
        }
        if events.iter().any(|e| matches!(e,
            TaskEvent::ImageBuildFailed { container, .. } if container == name)
            || matches!(e, TaskEvent::ImagePullFailed { container, .. } if container == name))
        {
            continue;
        }
        let spec = graph.spec(name).expect("node name came from graph.node_names()");
        match &spec.image_source {
            crate::config::ImageSource::Build { .. } => {
                ready.push(TaskStep::BuildImage { container: spec.clone() });
            }
            crate::config::ImageSource::Pull { image } => {
                ready.push(TaskStep::PullImage { container: name.to_string(), image_ref: image.clone() });
            }
        }
    }

    let network: Option<NetworkHandle> = state::network_handle(events);

    for &name in &names {
        let st = state::derive_state(graph, events, name);
        if st == NodeState::Creatable {
            if let (Some(image_id), Some(network)) = (state::image_id(graph, events, name), network.clone()) {
                let spec = graph.spec(name).expect("node name came from graph.node_names()").clone();
                ready.push(TaskStep::CreateContainer { container: spec, image_id, network });
            }
        }
    }

    for &name in &names {
        if name == graph.root() {
            continue;
        }
        let st = state::derive_state(graph, events, name);
        if st == NodeState::Created {
            if let Some(handle) = state::container_handle(events, name) {
                ready.push(TaskStep::StartContainer { container: name.to_string(), handle });
            }
        }
    }

    for &name in &names {
        if name == graph.root() {
            continue;
        }
        let started = events
            .iter()
            .any(|e| matches!(e, TaskEvent::ContainerStarted { container } if container == name));
        let healthy = events
            .iter()
            .any(|e| matches!(e, TaskEvent::ContainerBecameHealthy { container } if container == name));
        if started && !healthy {
            if let Some(handle) = state::container_handle(events, name) {
                let health_check = graph.spec(name).and_then(|s| s.health_check.clone());
                ready.push(TaskStep::WaitForContainerToBecomeHealthy {
                    container: name.to_string(),
                    handle,
                    health_check,
                });
            }
        }
    }

    let root = graph.root();
    let root_created = events
        .iter()
        .any(|e| matches!(e, TaskEvent::ContainerCreated { container, .. } if container == root));
    if root_created {
        let predecessors: HashSet<&str> = graph.predecessors(root);
        let all_healthy = predecessors
            .iter()
            .all(|p| state::derive_state(graph, events, p) == NodeState::Healthy);
        let already_running = events
            .iter()
            .any(|e| matches!(e, TaskEvent::RunningContainerExited { container, .. } if container == root));
        if all_healthy && !already_running {
            if let Some(handle) = state::container_handle(events, root) {
                ready.push(TaskStep::RunContainer { container: root.to_string(), handle });
            }
        }
    }

    PlanResult { ready_steps: ready, terminal: Terminal::None }
}

fn failure_reason(events: &[TaskEvent]) -> Option<String> {
    events.iter().find(|e| e.is_failure()).map(|e| {
        let container = e.container().unwrap_or("<task>");
        let message = e.failure_message().unwrap_or("unknown failure");
        format!("{container}: {message}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_node_graph() -> DependencyGraph {
        let cfg = "project_name: p\ncontainers:\n  svc:\n    image: alpine\ntasks:\n  t:\n    run:\n      container: svc\n";
        let configuration = crate::config::load_str(cfg, "t.yml").unwrap();
        let task = configuration.tasks.get("t").unwrap();
        crate::graph::build(&configuration, task).unwrap()
    }

    #[test]
    fn empty_log_emits_begin_task() {
        let graph = single_node_graph();
        let result = plan(&graph, &[]);
        assert!(matches!(result.ready_steps.as_slice(), [TaskStep::BeginTask]));
        assert_eq!(result.terminal, Terminal::None);
    }

    #[test]
    fn task_started_emits_network_and_pull() {
        let graph = single_node_graph();
        let events = vec![TaskEvent::TaskStarted];
        let result = plan(&graph, &events);
        assert!(result.ready_steps.iter().any(|s| matches!(s, TaskStep::CreateTaskNetwork)));
        assert!(result.ready_steps.iter().any(|s| matches!(s, TaskStep::PullImage { .. })));
    }

    #[test]
    fn failure_event_yields_terminal_failure() {
        let graph = single_node_graph();
        let events = vec![
            TaskEvent::TaskStarted,
            TaskEvent::ImagePullFailed {
                container: "svc".into(),
                image_ref: "alpine".into(),
                message: "boom".into(),
            },
        ];
        let result = plan(&graph, &events);
        assert!(matches!(result.terminal, Terminal::Failure(_)));
        assert!(result.ready_steps.is_empty());
    }

    #[test]
    fn exit_event_yields_terminal_success() {
        let graph = single_node_graph();
        let events = vec![TaskEvent::RunningContainerExited { container: "svc".into(), exit_code: 0 }];
        let result = plan(&graph, &events);
        assert_eq!(result.terminal, Terminal::Success);
    }

    #[test]
    fn creatable_container_is_created_once_image_and_network_ready() {
        let graph = single_node_graph();
        let events = vec![
            TaskEvent::TaskStarted,
            TaskEvent::TaskNetworkCreated { network: crate::daemon::NetworkHandle::new("net-1") },
            TaskEvent::ImagePulled { container: "svc".into(), image_ref: "alpine".into(), image_id: "alpine".into() },
        ];
        let result = plan(&graph, &events);
        assert!(result.ready_steps.iter().any(|s| matches!(s, TaskStep::CreateContainer { .. })));
    }
}
