//! Graph node and graph container types.

use std::collections::{HashMap, HashSet};

use crate::config::{HealthCheckConfig, ImageSource, PortMapping, VolumeMount};

/// A container definition resolved in the context of a task: its image
/// source plus the effective command, environment, and ports once task
/// overrides have been applied and environment interpolation has run.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image_source: ImageSource,
    pub command: Vec<String>,
    pub environment: HashMap<String, String>,
    pub working_directory: Option<String>,
    pub volumes: Vec<VolumeMount>,
    pub ports: Vec<PortMapping>,
    pub health_check: Option<HealthCheckConfig>,
}

/// An immutable DAG rooted at the task container. Edges point from a
/// container to the dependencies it requires to be healthy before it may
/// start: `successors(a)` are the containers `a` depends on, and
/// `predecessors(a)` are the containers that depend on `a`.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub(super) root: String,
    pub(super) nodes: HashMap<String, ContainerSpec>,
    /// container -> set of containers it depends on
    pub(super) dependencies: HashMap<String, HashSet<String>>,
    /// container -> set of containers that depend on it
    pub(super) dependents: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn spec(&self, name: &str) -> Option<&ContainerSpec> {
        self.nodes.get(name)
    }

    /// The containers `name` depends on (must be healthy before `name`
    /// may start).
    pub fn predecessors(&self, name: &str) -> HashSet<&str> {
        self.dependencies
            .get(name)
            .map(|s| s.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// The containers that depend on `name`.
    pub fn successors(&self, name: &str) -> HashSet<&str> {
        self.dependents
            .get(name)
            .map(|s| s.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
