//! The container daemon abstraction (§6): the only operations the engine
//! requires, with one concrete implementation backed by `bollard`.

mod bollard_daemon;
mod types;

#[cfg(test)]
pub mod fake;

pub use bollard_daemon::BollardDaemon;
pub use types::{ContainerDaemon, ContainerHandle, DaemonError, HealthStatus, NetworkHandle, ProgressSink};
