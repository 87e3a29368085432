//! UI event sinks (§6): consumers of the task run's event stream. Two
//! variants are provided; both are selected from the CLI.

mod fancy;
mod simple;

pub use fancy::FancyEventSink;
pub use simple::SimpleEventSink;

use crate::events::TaskEvent;
use crate::steps::TaskStep;

/// Receives task lifecycle notifications in the order the execution
/// manager observes them. Each task run owns its own sink instance;
/// there is no process-wide singleton (§9).
pub trait EventSink: Send + Sync {
    fn on_task_starting(&self, task_name: &str);
    fn on_event_posted(&self, event: &TaskEvent);
    fn on_step_starting(&self, step: &TaskStep);
    fn on_task_failed(&self, task_name: &str, manual_cleanup_instructions: &[String]);
}
