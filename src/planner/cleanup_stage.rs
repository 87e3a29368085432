//! The cleanup-stage planner (§4.4): undoes whatever the run stage did,
//! driven by the same event log now carrying the run stage's outcome.

use crate::events::TaskEvent;
use crate::graph::DependencyGraph;
use crate::steps::TaskStep;

use super::state::{self, PlanResult, Terminal};

/// Whether the run stage that preceded this cleanup ended in failure.
/// Determines whether container removal is "polite" (`RemoveContainer`,
/// success branch) or forcible (`CleanUpContainer`, failure branch).
pub fn plan(graph: &DependencyGraph, events: &[TaskEvent], run_failed: bool) -> PlanResult {
    let mut ready = Vec::new();
    let root = graph.root();
    let names: Vec<&str> = graph.node_names().collect();

    for &name in &names {
        let started = events.iter().any(|e| matches!(e, TaskEvent::ContainerStarted { container } if container == name));
        let exited = events.iter().any(|e| matches!(e, TaskEvent::RunningContainerExited { container, .. } if container == name));
        let stopped = events.iter().any(|e| matches!(e, TaskEvent::ContainerStopped { container } if container == name));
        let stop_failed = events.iter().any(|e| matches!(e, TaskEvent::ContainerStopFailed { container, .. } if container == name));

        if started && !exited && !stopped && !stop_failed {
            if let Some(handle) = state::container_handle(events, name) {
                ready.push(TaskStep::StopContainer { container: name.to_string(), handle });
            }
        }
    }

    let stop_phase_done = names.iter().all(|&name| {
        if name == root {
            return true;
        }
        let started = events.iter().any(|e| matches!(e, TaskEvent::ContainerStarted { container } if container == name));
        if !started {
            return true;
        }
        events.iter().any(|e| matches!(e, TaskEvent::ContainerStopped { container } if container == name))
            || events.iter().any(|e| matches!(e, TaskEvent::ContainerStopFailed { container, .. } if container == name))
    });

    if stop_phase_done {
        for &name in &names {
            let created = events.iter().any(|e| matches!(e, TaskEvent::ContainerCreated { container, .. } if container == name));
            let removed = events.iter().any(|e| matches!(e, TaskEvent::ContainerRemoved { container } if container == name));
            let removal_failed = events.iter().any(|e| matches!(e, TaskEvent::ContainerRemovalFailed { container, .. } if container == name));

            if created && !removed && !removal_failed {
                if let Some(handle) = state::container_handle(events, name) {
                    if run_failed {
                        ready.push(TaskStep::CleanUpContainer { container: name.to_string(), handle });
                    } else {
                        ready.push(TaskStep::RemoveContainer { container: name.to_string(), handle });
                    }
                }
            }
        }
    }

    let all_containers_accounted_for = names.iter().all(|&name| {
        let created = events.iter().any(|e| matches!(e, TaskEvent::ContainerCreated { container, .. } if container == name));
        if !created {
            return true;
        }
        events.iter().any(|e| matches!(e, TaskEvent::ContainerRemoved { container } if container == name))
            || events.iter().any(|e| matches!(e, TaskEvent::ContainerRemovalFailed { container, .. } if container == name))
    });

    let network_created = state::has_network_created(events);
    let network_deleted = events.iter().any(|e| matches!(e, TaskEvent::TaskNetworkDeleted));
    let network_delete_failed = events.iter().any(|e| matches!(e, TaskEvent::TaskNetworkDeletionFailed { .. }));

    if all_containers_accounted_for && network_created && !network_deleted && !network_delete_failed {
        if let Some(network) = state::network_handle(events) {
            ready.push(TaskStep::DeleteTaskNetwork { network });
        }
    }

    let network_accounted_for = !network_created || network_deleted || network_delete_failed;

    if all_containers_accounted_for && network_accounted_for {
        let instructions = manual_cleanup_instructions(events);
        if !instructions.is_empty() {
            ready.push(TaskStep::DisplayTaskFailure { instructions });
        }
        ready.push(TaskStep::FinishTask);
        return PlanResult {
            ready_steps: ready,
            terminal: if run_failed { Terminal::Failure("task failed; cleanup complete".to_string()) } else { Terminal::Success },
        };
    }

    PlanResult { ready_steps: ready, terminal: Terminal::None }
}

/// Human-readable daemon commands the user can run by hand, for whatever
/// cleanup steps failed.
fn manual_cleanup_instructions(events: &[TaskEvent]) -> Vec<String> {
    let mut instructions = Vec::new();
    for event in events {
        match event {
            TaskEvent::ContainerStopFailed { container, .. } => {
                instructions.push(format!("docker stop {container}"));
            }
            TaskEvent::ContainerRemovalFailed { container, .. } => {
                instructions.push(format!("docker rm -f {container}"));
            }
            TaskEvent::TaskNetworkDeletionFailed { .. } => {
                instructions.push("docker network prune".to_string());
            }
            _ => {}
        }
    }
    instructions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::ContainerHandle;

    fn single_node_graph() -> DependencyGraph {
        let cfg = "project_name: p\ncontainers:\n  svc:\n    image: alpine\ntasks:\n  t:\n    run:\n      container: svc\n";
        let configuration = crate::config::load_str(cfg, "t.yml").unwrap();
        let task = configuration.tasks.get("t").unwrap();
        crate::graph::build(&configuration, task).unwrap()
    }

    #[test]
    fn success_path_removes_container_and_deletes_network() {
        let graph = single_node_graph();
        let events = vec![
            TaskEvent::TaskStarted,
            TaskEvent::TaskNetworkCreated { network: crate::daemon::NetworkHandle::new("net-1") },
            TaskEvent::ImagePulled { container: "svc".into(), image_ref: "alpine".into(), image_id: "alpine".into() },
            TaskEvent::ContainerCreated { container: "svc".into(), handle: ContainerHandle::new("c-1") },
            TaskEvent::RunningContainerExited { container: "svc".into(), exit_code: 0 },
        ];
        let result = plan(&graph, &events, false);
        assert!(result.ready_steps.iter().any(|s| matches!(s, TaskStep::RemoveContainer { .. })));
    }

    #[test]
    fn failure_path_forcibly_cleans_up() {
        let graph = single_node_graph();
        let events = vec![
            TaskEvent::TaskStarted,
            TaskEvent::TaskNetworkCreated { network: crate::daemon::NetworkHandle::new("net-1") },
            TaskEvent::ImagePullFailed { container: "svc".into(), image_ref: "alpine".into(), message: "boom".into() },
        ];
        let result = plan(&graph, &events, true);
        assert!(result.ready_steps.iter().any(|s| matches!(s, TaskStep::DeleteTaskNetwork { .. })));
    }

    #[test]
    fn terminal_once_everything_accounted_for() {
        let graph = single_node_graph();
        let events = vec![
            TaskEvent::TaskStarted,
            TaskEvent::TaskNetworkCreated { network: crate::daemon::NetworkHandle::new("net-1") },
            TaskEvent::ImagePulled { container: "svc".into(), image_ref: "alpine".into(), image_id: "alpine".into() },
            TaskEvent::ContainerCreated { container: "svc".into(), handle: ContainerHandle::new("c-1") },
            TaskEvent::RunningContainerExited { container: "svc".into(), exit_code: 0 },
            TaskEvent::ContainerRemoved { container: "svc".into() },
            TaskEvent::TaskNetworkDeleted,
        ];
        let result = plan(&graph, &events, false);
        assert_eq!(result.terminal, Terminal::Success);
        assert!(result.ready_steps.iter().any(|s| matches!(s, TaskStep::FinishTask)));
    }
}
