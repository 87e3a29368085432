//! A progress renderer that derives a per-container status line from the
//! event stream and redraws it in place. Falls back to plain text when
//! `--no-color` is set.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::events::TaskEvent;
use crate::steps::TaskStep;

use super::EventSink;

const CONTAINER_STATES: &[&str] = &[
    "ready-to-build/pull",
    "building",
    "pulling",
    "image-ready-waiting-network",
    "creating",
    "waiting-for-dependencies",
    "starting",
    "started-waiting-healthy",
    "running",
];

struct Render {
    lines: BTreeMap<String, String>,
    last_line_count: usize,
}

pub struct FancyEventSink {
    color: bool,
    render: Mutex<Render>,
}

impl FancyEventSink {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            render: Mutex::new(Render { lines: BTreeMap::new(), last_line_count: 0 }),
        }
    }

    fn set_status(&self, container: &str, status: &str) {
        let mut render = self.render.lock();
        render.lines.insert(container.to_string(), status.to_string());
        self.redraw(&mut render);
    }

    fn redraw(&self, render: &mut Render) {
        if render.last_line_count > 0 {
            print!("\x1b[{}A", render.last_line_count);
        }
        for (container, status) in &render.lines {
            if self.color {
                println!("\x1b[2K\x1b[1m{container}\x1b[0m: {status}");
            } else {
                println!("\x1b[2K{container}: {status}");
            }
        }
        render.last_line_count = render.lines.len();
    }
}

impl EventSink for FancyEventSink {
    fn on_task_starting(&self, task_name: &str) {
        if self.color {
            println!("\x1b[1mRunning task '{task_name}'\x1b[0m");
        } else {
            println!("Running task '{task_name}'");
        }
    }

    fn on_event_posted(&self, event: &TaskEvent) {
        match event {
            TaskEvent::ImageBuildProgress { container, .. } => self.set_status(container, CONTAINER_STATES[1]),
            TaskEvent::ImageBuilt { container, .. } | TaskEvent::ImagePulled { container, .. } => {
                self.set_status(container, CONTAINER_STATES[3])
            }
            TaskEvent::ImageBuildFailed { container, message } => self.set_status(container, &format!("build failed: {message}")),
            TaskEvent::ImagePullFailed { container, message, .. } => self.set_status(container, &format!("pull failed: {message}")),
            TaskEvent::ContainerCreated { container, .. } => self.set_status(container, CONTAINER_STATES[5]),
            TaskEvent::ContainerCreationFailed { container, message } => self.set_status(container, &format!("creation failed: {message}")),
            TaskEvent::ContainerStarted { container } => self.set_status(container, CONTAINER_STATES[7]),
            TaskEvent::ContainerStartFailed { container, message } => self.set_status(container, &format!("start failed: {message}")),
            TaskEvent::ContainerBecameHealthy { container } => self.set_status(container, "healthy"),
            TaskEvent::ContainerDidNotBecomeHealthy { container, message } => self.set_status(container, &format!("unhealthy: {message}")),
            TaskEvent::RunningContainerExited { container, exit_code } => {
                self.set_status(container, &format!("exited ({exit_code})"))
            }
            TaskEvent::ContainerStopped { container } => self.set_status(container, "stopped"),
            TaskEvent::ContainerRemoved { container } => self.set_status(container, "removed"),
            _ => {}
        }
    }

    fn on_step_starting(&self, step: &TaskStep) {
        match step {
            TaskStep::BuildImage { container } => self.set_status(&container.name, CONTAINER_STATES[1]),
            TaskStep::PullImage { container, .. } => self.set_status(container, CONTAINER_STATES[2]),
            TaskStep::CreateContainer { container, .. } => self.set_status(&container.name, CONTAINER_STATES[4]),
            TaskStep::StartContainer { container, .. } => self.set_status(container, CONTAINER_STATES[6]),
            TaskStep::RunContainer { container, .. } => self.set_status(container, CONTAINER_STATES[8]),
            _ => {}
        }
    }

    fn on_task_failed(&self, task_name: &str, manual_cleanup_instructions: &[String]) {
        println!("\nTask '{task_name}' failed.");
        if !manual_cleanup_instructions.is_empty() {
            println!("The following resources may need manual cleanup:");
            for instruction in manual_cleanup_instructions {
                println!("  {instruction}");
            }
        }
    }
}
