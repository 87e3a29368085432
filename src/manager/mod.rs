//! The parallel execution manager (§4.6, §5): owns the event log, drives
//! both stage planners, and dispatches ready steps onto a bounded pool of
//! `tokio` tasks (REDESIGN FLAGS: a semaphore-bounded task pool rather than
//! OS threads, since the one concrete daemon client is asynchronous).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::daemon::ContainerDaemon;
use crate::events::{EventLog, TaskEvent};
use crate::graph::DependencyGraph;
use crate::planner::{self, Terminal};
use crate::steps::{StepIdentity, TaskStep};
use crate::ui::EventSink;

/// Platform parallelism, floored at 2 (§4.6, §5).
fn worker_capacity() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2).max(2)
}

/// Run a task to completion: run stage, then cleanup stage, regardless of
/// how the run stage ended. Returns the task container's exit code if one
/// was observed, or `-1` if the task failed before reaching it (the
/// caller is responsible for the unsigned-8-bit-safe mapping to `1`).
pub async fn run_task(
    graph: &DependencyGraph,
    daemon: Arc<dyn ContainerDaemon>,
    project_name: &str,
    sink: Arc<dyn EventSink>,
    cancellation: CancellationToken,
) -> i64 {
    let events = Arc::new(EventLog::new());
    let semaphore = Arc::new(Semaphore::new(worker_capacity()));
    let (tx, mut rx) = mpsc::unbounded_channel::<TaskEvent>();

    let mut in_flight: HashSet<StepIdentity> = HashSet::new();
    let mut completed: HashSet<StepIdentity> = HashSet::new();

    let mut run_failed = false;

    loop {
        let snapshot = events.snapshot();
        let plan = planner::plan_run_stage(graph, &snapshot);

        match &plan.terminal {
            Terminal::Success => break,
            Terminal::Failure(_) => {
                run_failed = true;
                break;
            }
            Terminal::None => {}
        }

        if cancellation.is_cancelled() {
            // Stop dispatching new run-stage steps; drain whatever is
            // already in flight before moving to cleanup (§5, cancellation
            // semantics). In-flight steps are never cancelled.
            if in_flight.is_empty() {
                run_failed = true;
                break;
            }
        } else {
            dispatch_ready_steps(
                plan.ready_steps,
                &mut in_flight,
                &completed,
                &daemon,
                project_name,
                &events,
                &tx,
                &semaphore,
                &sink,
            );

            if in_flight.is_empty() {
                // Nothing dispatched and nothing outstanding: the planner
                // has nothing left to offer but hasn't reported terminal
                // either. Treated as an invariant violation (§7, taxonomy 5).
                panic!("run-stage planner stalled with no in-flight steps and no terminal signal");
            }
        }

        if let Some(event) = rx.recv().await {
            sink.on_event_posted(&event);
            record_completion(&event, &mut in_flight, &mut completed);
        }
    }

    in_flight.clear();
    completed.clear();

    loop {
        let snapshot = events.snapshot();
        let plan = planner::plan_cleanup_stage(graph, &snapshot, run_failed);

        for step in &plan.ready_steps {
            if let TaskStep::DisplayTaskFailure { instructions } = step {
                sink.on_task_failed("", instructions);
            }
        }

        if matches!(plan.terminal, Terminal::Success | Terminal::Failure(_)) {
            break;
        }

        dispatch_ready_steps(
            plan.ready_steps,
            &mut in_flight,
            &completed,
            &daemon,
            project_name,
            &events,
            &tx,
            &semaphore,
            &sink,
        );

        if let Some(event) = rx.recv().await {
            sink.on_event_posted(&event);
            record_completion(&event, &mut in_flight, &mut completed);
        }
    }

    exit_code(&events.snapshot(), graph.root())
}

#[allow(clippy::too_many_arguments)]
fn dispatch_ready_steps(
    ready_steps: Vec<TaskStep>,
    in_flight: &mut HashSet<StepIdentity>,
    completed: &HashSet<StepIdentity>,
    daemon: &Arc<dyn ContainerDaemon>,
    project_name: &str,
    events: &Arc<EventLog>,
    tx: &mpsc::UnboundedSender<TaskEvent>,
    semaphore: &Arc<Semaphore>,
    sink: &Arc<dyn EventSink>,
) {
    for step in ready_steps {
        let identity = step.identity();
        if in_flight.contains(&identity) || completed.contains(&identity) {
            continue;
        }

        if matches!(step, TaskStep::DisplayTaskFailure { .. } | TaskStep::FinishTask) {
            continue;
        }

        in_flight.insert(identity);

        let daemon = daemon.clone();
        let project_name = project_name.to_string();
        let tx = tx.clone();
        let semaphore = semaphore.clone();
        let events = events.clone();
        let sink = sink.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            let produced = crate::runner::run_step(step, daemon.as_ref(), &project_name, &events, sink.as_ref()).await;
            for event in produced {
                let _ = tx.send(event);
            }
        });
    }
}

fn record_completion(event: &TaskEvent, in_flight: &mut HashSet<StepIdentity>, completed: &mut HashSet<StepIdentity>) {
    if let Some(identity) = identity_for_event(event) {
        in_flight.remove(&identity);
        completed.insert(identity);
    }
}

/// Map a posted event back to the step identity that produced it, so the
/// manager can release its in-flight marker.
fn identity_for_event(event: &TaskEvent) -> Option<StepIdentity> {
    match event {
        TaskEvent::TaskStarted => Some(StepIdentity::BeginTask),
        TaskEvent::TaskNetworkCreated { .. } | TaskEvent::TaskNetworkCreationFailed { .. } => {
            Some(StepIdentity::CreateTaskNetwork)
        }
        TaskEvent::ImageBuildProgress { .. } => None,
        TaskEvent::ImageBuilt { container, .. } | TaskEvent::ImageBuildFailed { container, .. } => {
            Some(StepIdentity::BuildImage(container.clone()))
        }
        TaskEvent::ImagePulled { image_ref, .. } | TaskEvent::ImagePullFailed { image_ref, .. } => {
            Some(StepIdentity::PullImage(image_ref.clone()))
        }
        TaskEvent::ContainerCreated { container, .. } | TaskEvent::ContainerCreationFailed { container, .. } => {
            Some(StepIdentity::CreateContainer(container.clone()))
        }
        TaskEvent::ContainerStarted { container } | TaskEvent::ContainerStartFailed { container, .. } => {
            Some(StepIdentity::StartContainer(container.clone()))
        }
        TaskEvent::ContainerBecameHealthy { container } | TaskEvent::ContainerDidNotBecomeHealthy { container, .. } => {
            Some(StepIdentity::WaitForHealthy(container.clone()))
        }
        TaskEvent::RunningContainerExited { container, .. } => Some(StepIdentity::RunContainer(container.clone())),
        TaskEvent::ContainerStopped { container } | TaskEvent::ContainerStopFailed { container, .. } => {
            Some(StepIdentity::StopContainer(container.clone()))
        }
        TaskEvent::ContainerRemoved { container } | TaskEvent::ContainerRemovalFailed { container, .. } => {
            Some(StepIdentity::RemoveContainer(container.clone()))
        }
        TaskEvent::TaskNetworkDeleted | TaskEvent::TaskNetworkDeletionFailed { .. } => Some(StepIdentity::DeleteTaskNetwork),
    }
}

fn exit_code(events: &[TaskEvent], root: &str) -> i64 {
    events
        .iter()
        .find_map(|e| match e {
            TaskEvent::RunningContainerExited { container, exit_code } if container == root => Some(*exit_code),
            _ => None,
        })
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::fake::FakeDaemon;
    use crate::ui::SimpleEventSink;

    fn single_node_graph() -> DependencyGraph {
        let cfg = r#"
project_name: demo
containers:
  svc:
    image: alpine
tasks:
  t:
    run:
      container: svc
"#;
        let configuration = crate::config::load_str(cfg, "t.yml").unwrap();
        let task = configuration.tasks.get("t").unwrap();
        crate::graph::build(&configuration, task).unwrap()
    }

    #[tokio::test]
    async fn happy_path_runs_to_completion_and_tears_down() {
        let graph = single_node_graph();
        let fake = Arc::new(FakeDaemon::new());
        let daemon: Arc<dyn ContainerDaemon> = fake.clone();
        let sink: Arc<dyn EventSink> = Arc::new(SimpleEventSink::new(true));

        let exit_code = run_task(&graph, daemon, "demo", sink, CancellationToken::new()).await;

        assert_eq!(exit_code, 0);
        let calls = fake.calls();
        assert!(calls.iter().any(|c| c.starts_with("create_network")));
        assert!(calls.iter().any(|c| c.starts_with("remove:")));
        assert!(calls.iter().any(|c| c.starts_with("delete_network")));
    }

    fn two_containers_sharing_an_image() -> DependencyGraph {
        let cfg = r#"
project_name: demo
containers:
  cache:
    image: alpine
  svc:
    image: alpine
    dependencies: [cache]
tasks:
  t:
    run:
      container: svc
"#;
        let configuration = crate::config::load_str(cfg, "t.yml").unwrap();
        let task = configuration.tasks.get("t").unwrap();
        crate::graph::build(&configuration, task).unwrap()
    }

    #[tokio::test]
    async fn pulls_for_identical_image_references_are_coalesced() {
        let graph = two_containers_sharing_an_image();
        let fake = Arc::new(FakeDaemon::new());
        let daemon: Arc<dyn ContainerDaemon> = fake.clone();
        let sink: Arc<dyn EventSink> = Arc::new(SimpleEventSink::new(true));

        let exit_code = run_task(&graph, daemon, "demo", sink, CancellationToken::new()).await;

        assert_eq!(exit_code, 0);
        let pulls = fake.calls().iter().filter(|c| c.starts_with("pull:alpine")).count();
        assert_eq!(pulls, 1, "both containers reference the same image; only one pull should be dispatched");
    }

    #[tokio::test]
    async fn failed_pull_still_runs_cleanup_and_reports_failure_exit_code() {
        let graph = single_node_graph();
        let fake = FakeDaemon::new();
        fake.fail_image_pull("alpine");
        let daemon: Arc<dyn ContainerDaemon> = Arc::new(fake);
        let sink: Arc<dyn EventSink> = Arc::new(SimpleEventSink::new(true));

        let exit_code = run_task(&graph, daemon, "demo", sink, CancellationToken::new()).await;

        assert_eq!(exit_code, -1);
    }
}
