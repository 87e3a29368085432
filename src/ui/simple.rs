//! A plain, line-at-a-time event sink. Used for `--simple-output`,
//! `--quiet`, and whenever stdout is not a terminal.

use tracing::info;

use crate::events::TaskEvent;
use crate::steps::TaskStep;

use super::EventSink;

pub struct SimpleEventSink {
    quiet: bool,
}

impl SimpleEventSink {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl EventSink for SimpleEventSink {
    fn on_task_starting(&self, task_name: &str) {
        if !self.quiet {
            println!("Running task '{task_name}'...");
        }
    }

    fn on_event_posted(&self, event: &TaskEvent) {
        if self.quiet {
            return;
        }
        if let Some(line) = describe(event) {
            println!("{line}");
        }
    }

    fn on_step_starting(&self, step: &TaskStep) {
        info!(step = %step.label(), "dispatching step");
    }

    fn on_task_failed(&self, task_name: &str, manual_cleanup_instructions: &[String]) {
        eprintln!("Task '{task_name}' failed.");
        if !manual_cleanup_instructions.is_empty() {
            eprintln!("The following resources may need manual cleanup:");
            for instruction in manual_cleanup_instructions {
                eprintln!("  {instruction}");
            }
        }
    }
}

fn describe(event: &TaskEvent) -> Option<String> {
    let line = match event {
        TaskEvent::TaskStarted => "Task started.".to_string(),
        TaskEvent::TaskNetworkCreated { .. } => "Network created.".to_string(),
        TaskEvent::TaskNetworkCreationFailed { message } => format!("Failed to create network: {message}"),
        TaskEvent::ImageBuildProgress { container, progress } => format!("[{container}] {progress}"),
        TaskEvent::ImageBuilt { container, .. } => format!("[{container}] image built."),
        TaskEvent::ImageBuildFailed { container, message } => format!("[{container}] image build failed: {message}"),
        TaskEvent::ImagePulled { container, .. } => format!("[{container}] image pulled."),
        TaskEvent::ImagePullFailed { container, message, .. } => format!("[{container}] image pull failed: {message}"),
        TaskEvent::ContainerCreated { container, .. } => format!("[{container}] created."),
        TaskEvent::ContainerCreationFailed { container, message } => format!("[{container}] creation failed: {message}"),
        TaskEvent::ContainerStarted { container } => format!("[{container}] started."),
        TaskEvent::ContainerStartFailed { container, message } => format!("[{container}] failed to start: {message}"),
        TaskEvent::ContainerBecameHealthy { container } => format!("[{container}] healthy."),
        TaskEvent::ContainerDidNotBecomeHealthy { container, message } => format!("[{container}] did not become healthy: {message}"),
        TaskEvent::RunningContainerExited { container, exit_code } => format!("[{container}] exited with code {exit_code}."),
        TaskEvent::ContainerStopped { container } => format!("[{container}] stopped."),
        TaskEvent::ContainerStopFailed { container, message } => format!("[{container}] failed to stop: {message}"),
        TaskEvent::ContainerRemoved { container } => format!("[{container}] removed."),
        TaskEvent::ContainerRemovalFailed { container, message } => format!("[{container}] failed to remove: {message}"),
        TaskEvent::TaskNetworkDeleted => "Network deleted.".to_string(),
        TaskEvent::TaskNetworkDeletionFailed { message } => format!("Failed to delete network: {message}"),
    };
    Some(line)
}
