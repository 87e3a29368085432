//! The step runner (§4.5): executes one [`TaskStep`] against a
//! [`ContainerDaemon`] and posts exactly the event(s) each step's contract
//! promises. Never lets a daemon error escape; every `Result::Err` is
//! converted to the step's defined failure event (§7 propagation policy).

use crate::daemon::{ContainerDaemon, DaemonError, HealthStatus};
use crate::events::{EventLog, TaskEvent};
use crate::steps::TaskStep;
use crate::ui::EventSink;

/// Execute one step, appending its outcome event(s) to `events` and
/// returning exactly those events (in the order they were posted) so the
/// caller can forward them onward without re-reading the shared log —
/// reading back a length-delimited slice of a log that other concurrently
/// running steps are also appending to would risk picking up events that
/// belong to them.
pub async fn run_step(
    step: TaskStep,
    daemon: &dyn ContainerDaemon,
    project_name: &str,
    events: &EventLog,
    sink: &dyn EventSink,
) -> Vec<TaskEvent> {
    sink.on_step_starting(&step);

    let mut produced = Vec::new();

    match step {
        TaskStep::BeginTask => {
            post(events, &mut produced, TaskEvent::TaskStarted);
        }

        TaskStep::BuildImage { container } => {
            let progress_sink: &(dyn Fn(String) + Send + Sync) = &|line: String| {
                events.post(TaskEvent::ImageBuildProgress { container: container.name.clone(), progress: line });
            };
            match daemon.build(project_name, &container, progress_sink).await {
                Ok(image_id) => post(
                    events,
                    &mut produced,
                    TaskEvent::ImageBuilt { container: container.name.clone(), image_id },
                ),
                Err(e) => post(
                    events,
                    &mut produced,
                    TaskEvent::ImageBuildFailed { container: container.name.clone(), message: e.to_string() },
                ),
            }
        }

        TaskStep::PullImage { container, image_ref } => match daemon.pull(&image_ref).await {
            Ok(image_id) => post(
                events,
                &mut produced,
                TaskEvent::ImagePulled { container, image_ref, image_id },
            ),
            Err(e) => post(
                events,
                &mut produced,
                TaskEvent::ImagePullFailed { container, image_ref, message: e.to_string() },
            ),
        },

        TaskStep::CreateTaskNetwork => match daemon.create_bridge_network(project_name).await {
            Ok(network) => post(events, &mut produced, TaskEvent::TaskNetworkCreated { network }),
            Err(e) => post(events, &mut produced, TaskEvent::TaskNetworkCreationFailed { message: e.to_string() }),
        },

        TaskStep::CreateContainer { container, image_id, network } => {
            match daemon.create(&container, &image_id, &network).await {
                Ok(handle) => post(
                    events,
                    &mut produced,
                    TaskEvent::ContainerCreated { container: container.name.clone(), handle },
                ),
                Err(e) => post(
                    events,
                    &mut produced,
                    TaskEvent::ContainerCreationFailed { container: container.name.clone(), message: e.to_string() },
                ),
            }
        }

        TaskStep::StartContainer { container, handle } => match daemon.start(&handle).await {
            Ok(()) => post(events, &mut produced, TaskEvent::ContainerStarted { container }),
            Err(e) => post(events, &mut produced, TaskEvent::ContainerStartFailed { container, message: e.to_string() }),
        },

        TaskStep::RunContainer { container, handle } => match daemon.run(&handle).await {
            Ok(exit_code) => post(events, &mut produced, TaskEvent::RunningContainerExited { container, exit_code }),
            Err(e) => {
                // No distinct failure event exists for this step (§4.5); a
                // daemon failure while running the task container is
                // modeled as the abstract exit code redesigned in
                // REDESIGN FLAGS, which the CLI maps to the process exit
                // status 1.
                tracing::error!(container = %container, error = %e, "task container run failed");
                post(events, &mut produced, TaskEvent::RunningContainerExited { container, exit_code: -1 })
            }
        },

        TaskStep::WaitForContainerToBecomeHealthy { container, handle, health_check } => {
            match daemon.wait_for_health_status(&handle, health_check.as_ref()).await {
                Ok(HealthStatus::BecameHealthy) | Ok(HealthStatus::NoHealthCheck) => {
                    post(events, &mut produced, TaskEvent::ContainerBecameHealthy { container })
                }
                Ok(HealthStatus::BecameUnhealthy) => post(
                    events,
                    &mut produced,
                    TaskEvent::ContainerDidNotBecomeHealthy { container, message: "health check reported unhealthy".to_string() },
                ),
                Ok(HealthStatus::Exited) => post(
                    events,
                    &mut produced,
                    TaskEvent::ContainerDidNotBecomeHealthy {
                        container,
                        message: "container exited before becoming healthy".to_string(),
                    },
                ),
                Err(e) => post(
                    events,
                    &mut produced,
                    TaskEvent::ContainerDidNotBecomeHealthy { container, message: e.to_string() },
                ),
            }
        }

        TaskStep::StopContainer { container, handle } => match daemon.stop(&handle).await {
            Ok(()) => post(events, &mut produced, TaskEvent::ContainerStopped { container }),
            Err(e) => post(events, &mut produced, TaskEvent::ContainerStopFailed { container, message: e.to_string() }),
        },

        TaskStep::RemoveContainer { container, handle } => match daemon.remove(&handle).await {
            Ok(()) => post(events, &mut produced, TaskEvent::ContainerRemoved { container }),
            Err(DaemonError::ContainerDoesNotExist) => {
                post(events, &mut produced, TaskEvent::ContainerRemoved { container })
            }
            Err(e) => post(events, &mut produced, TaskEvent::ContainerRemovalFailed { container, message: e.to_string() }),
        },

        TaskStep::CleanUpContainer { container, handle } => match daemon.forcibly_remove(&handle).await {
            Ok(()) => post(events, &mut produced, TaskEvent::ContainerRemoved { container }),
            Err(e) => post(events, &mut produced, TaskEvent::ContainerRemovalFailed { container, message: e.to_string() }),
        },

        TaskStep::DeleteTaskNetwork { network } => match daemon.delete_network(&network).await {
            Ok(()) => post(events, &mut produced, TaskEvent::TaskNetworkDeleted),
            Err(e) => post(events, &mut produced, TaskEvent::TaskNetworkDeletionFailed { message: e.to_string() }),
        },

        TaskStep::DisplayTaskFailure { instructions } => {
            sink.on_task_failed("", &instructions);
        }

        TaskStep::FinishTask => {}
    }

    produced
}

/// Appends `event` to the log and records it as one this call produced.
/// `ImageBuildProgress` events are posted directly to the log by the
/// build step's progress callback instead, since there may be any number
/// of them and the manager does not need to track them as step output.
fn post(events: &EventLog, produced: &mut Vec<TaskEvent>, event: TaskEvent) {
    events.post(event.clone());
    produced.push(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::fake::FakeDaemon;
    use crate::ui::SimpleEventSink;

    #[tokio::test]
    async fn begin_task_posts_task_started() {
        let daemon = FakeDaemon::new();
        let events = EventLog::new();
        let sink = SimpleEventSink::new(true);
        let produced = run_step(TaskStep::BeginTask, &daemon, "proj", &events, &sink).await;
        assert!(matches!(events.snapshot().as_slice(), [TaskEvent::TaskStarted]));
        assert!(matches!(produced.as_slice(), [TaskEvent::TaskStarted]));
    }

    #[tokio::test]
    async fn pull_image_failure_posts_failure_event() {
        let daemon = FakeDaemon::new();
        daemon.fail_image_pull("alpine");
        let events = EventLog::new();
        let sink = SimpleEventSink::new(true);
        let produced = run_step(
            TaskStep::PullImage { container: "svc".into(), image_ref: "alpine".into() },
            &daemon,
            "proj",
            &events,
            &sink,
        )
        .await;
        assert!(matches!(events.snapshot().as_slice(), [TaskEvent::ImagePullFailed { .. }]));
        assert!(matches!(produced.as_slice(), [TaskEvent::ImagePullFailed { .. }]));
    }

    #[tokio::test]
    async fn remove_already_gone_container_is_idempotent() {
        let daemon = FakeDaemon::new();
        daemon.already_removed("svc");
        let events = EventLog::new();
        let sink = SimpleEventSink::new(true);
        let handle = crate::daemon::ContainerHandle::new("svc-fake-0");
        let produced = run_step(
            TaskStep::RemoveContainer { container: "svc".into(), handle },
            &daemon,
            "proj",
            &events,
            &sink,
        )
        .await;
        assert!(matches!(events.snapshot().as_slice(), [TaskEvent::ContainerRemoved { .. }]));
        assert!(matches!(produced.as_slice(), [TaskEvent::ContainerRemoved { .. }]));
    }
}
