//! The immutable configuration data model (§3).

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

/// Where a container's image comes from: either `build_directory` (a path
/// containing a Dockerfile) or `image` (a pre-built reference to pull).
/// Exactly one of the two must be present; `ContainerDefinition::image_source`
/// enforces this after deserialization since serde cannot express an
/// exclusive-or over flattened top-level keys directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Build { build_directory: String },
    Pull { image: String },
}

impl ImageSource {
    pub fn build_dir(&self) -> Option<&str> {
        match self {
            ImageSource::Build { build_directory } => Some(build_directory),
            ImageSource::Pull { .. } => None,
        }
    }

    pub fn image_reference(&self) -> Option<&str> {
        match self {
            ImageSource::Pull { image } => Some(image),
            ImageSource::Build { .. } => None,
        }
    }
}

/// Host-to-container port mapping.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
}

/// Mount mode for a volume mount.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MountMode {
    ReadWrite,
    ReadOnly,
}

impl Default for MountMode {
    fn default() -> Self {
        MountMode::ReadWrite
    }
}

/// A single volume mount.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub mode: MountMode,
}

/// How the engine decides a container without an explicit health check is
/// healthy (immediately after start), versus one that must be polled.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthCheckConfig {
    /// Command to run inside the container to test health.
    pub command: String,
    /// Seconds between health check attempts.
    #[serde(default = "default_health_interval_secs")]
    pub interval_secs: u64,
    /// Seconds to wait for a single attempt before considering it failed.
    #[serde(default = "default_health_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of consecutive failures before the container is unhealthy.
    #[serde(default = "default_health_retries")]
    pub retries: u32,
}

fn default_health_interval_secs() -> u64 {
    2
}
fn default_health_timeout_secs() -> u64 {
    5
}
fn default_health_retries() -> u32 {
    3
}

/// A single host-environment-variable reference or literal value.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
}

impl EnvValue {
    pub fn raw(&self) -> &str {
        match self {
            EnvValue::Literal(s) => s,
        }
    }
}

/// A container definition, as it appears under `containers:` in the
/// configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerDefinition {
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub build_directory: Option<String>,

    /// Optional command, given as a single shell-style string and parsed
    /// into argv with `shell-words`.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub environment: HashMap<String, EnvValue>,

    #[serde(default)]
    pub working_directory: Option<String>,

    #[serde(default)]
    pub volumes: Vec<VolumeMount>,

    #[serde(default)]
    pub ports: Vec<PortMapping>,

    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,

    /// The current key for declaring dependencies.
    #[serde(default)]
    pub dependencies: HashSet<String>,

    /// Deprecated alias for `dependencies`. If both are present the
    /// loader takes the union and logs a warning (§9).
    #[serde(default)]
    pub start: HashSet<String>,
}

impl ContainerDefinition {
    /// The effective dependency set: the union of `dependencies` and the
    /// deprecated `start` alias.
    pub fn effective_dependencies(&self) -> HashSet<String> {
        self.dependencies.union(&self.start).cloned().collect()
    }

    pub fn has_alias_conflict(&self) -> bool {
        !self.dependencies.is_empty() && !self.start.is_empty()
    }

    pub fn image_source(&self) -> Result<ImageSource, super::error::ConfigurationError> {
        match (&self.image, &self.build_directory) {
            (Some(image), None) => Ok(ImageSource::Pull { image: image.clone() }),
            (None, Some(dir)) => Ok(ImageSource::Build { build_directory: dir.clone() }),
            _ => Err(super::error::ConfigurationError::AmbiguousImageSource {
                container: self.name.clone(),
            }),
        }
    }
}

/// The run configuration embedded in a task definition.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub container: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, EnvValue>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

/// A task definition, as it appears under `tasks:`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDefinition {
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub run: RunConfig,

    #[serde(default)]
    pub dependencies: HashSet<String>,

    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// The top-level, immutable configuration produced by loading a YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    pub project_name: String,
    #[serde(default)]
    pub containers: HashMap<String, ContainerDefinition>,
    #[serde(default)]
    pub tasks: HashMap<String, TaskDefinition>,
}
