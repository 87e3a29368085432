//! The project-local YAML configuration: data model, loading, validation,
//! and host-environment interpolation (§3, §6, §10).

mod error;
mod interpolate;
mod load;
mod model;

pub use error::ConfigurationError;
pub use interpolate::{interpolate, interpolate_map};
pub use load::{load, load_str};
pub use model::{
    Configuration, ContainerDefinition, EnvValue, HealthCheckConfig, ImageSource, MountMode,
    PortMapping, RunConfig, TaskDefinition, VolumeMount,
};
