//! The container dependency graph (§4.1): an immutable DAG rooted at the
//! task container, built once per task invocation.

mod build;
mod types;

pub use build::build;
pub use types::{ContainerSpec, DependencyGraph};
