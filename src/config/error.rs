//! Configuration errors: malformed files, unresolved references, cycles,
//! invalid commands, and missing host environment variables (§7, taxonomy 1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("task '{task}' references unknown container '{container}'")]
    UnknownContainer { task: String, container: String },

    #[error("container '{container}' depends on unknown container '{dependency}'")]
    UnknownDependency { container: String, dependency: String },

    #[error("container '{container}' depends on itself")]
    SelfDependency { container: String },

    #[error("task '{task}' references unknown prerequisite task '{prerequisite}'")]
    UnknownPrerequisite { task: String, prerequisite: String },

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("container '{container}' has an invalid command: {message}")]
    InvalidCommand { container: String, message: String },

    #[error("container '{container}' must declare exactly one of 'image' or 'build_directory'")]
    AmbiguousImageSource { container: String },

    #[error("host environment variable '{name}' referenced by {context} is not set")]
    MissingHostVariable { name: String, context: String },

    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },
}
