//! YAML configuration loading and post-parse validation.

use std::path::Path;

use tracing::warn;

use super::error::ConfigurationError;
use super::model::Configuration;

/// Load and validate a configuration file.
///
/// Validation here covers everything that does not require walking the
/// dependency graph: unresolved references, self-dependencies, and the
/// deprecated `start`/`dependencies` alias conflict. Cycle detection is
/// the dependency graph's job (§4.1) and the prerequisite order
/// resolver's job (§4.7), since both require a graph walk this module
/// does not otherwise need to perform.
pub fn load(path: &Path) -> Result<Configuration, ConfigurationError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_str(&content, &path.display().to_string())
}

/// Parse and validate a configuration document already read into memory.
pub fn load_str(content: &str, path: &str) -> Result<Configuration, ConfigurationError> {
    let mut config: Configuration =
        serde_yaml::from_str(content).map_err(|source| ConfigurationError::Parse {
            path: path.to_string(),
            source,
        })?;

    for (name, container) in config.containers.iter_mut() {
        container.name = name.clone();
    }
    for (name, task) in config.tasks.iter_mut() {
        task.name = name.clone();
    }

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Configuration) -> Result<(), ConfigurationError> {
    for container in config.containers.values() {
        container.image_source()?;

        if container.has_alias_conflict() {
            warn!(
                container = %container.name,
                "container declares both 'dependencies' and the deprecated 'start' alias; taking the union of both"
            );
        }

        for dependency in container.effective_dependencies() {
            if dependency == container.name {
                return Err(ConfigurationError::SelfDependency {
                    container: container.name.clone(),
                });
            }
            if !config.containers.contains_key(&dependency) {
                return Err(ConfigurationError::UnknownDependency {
                    container: container.name.clone(),
                    dependency,
                });
            }
        }

        if let Some(command) = &container.command {
            shell_words::split(command).map_err(|e| ConfigurationError::InvalidCommand {
                container: container.name.clone(),
                message: e.to_string(),
            })?;
        }
    }

    for task in config.tasks.values() {
        if !config.containers.contains_key(&task.run.container) {
            return Err(ConfigurationError::UnknownContainer {
                task: task.name.clone(),
                container: task.run.container.clone(),
            });
        }

        for dependency in &task.dependencies {
            if !config.containers.contains_key(dependency) {
                return Err(ConfigurationError::UnknownDependency {
                    container: task.run.container.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        for prerequisite in &task.prerequisites {
            if !config.tasks.contains_key(prerequisite) {
                return Err(ConfigurationError::UnknownPrerequisite {
                    task: task.name.clone(),
                    prerequisite: prerequisite.clone(),
                });
            }
        }

        if let Some(command) = &task.run.command {
            shell_words::split(command).map_err(|e| ConfigurationError::InvalidCommand {
                container: task.run.container.clone(),
                message: e.to_string(),
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
project_name: demo
containers:
  svc:
    image: alpine
tasks:
  t:
    run:
      container: svc
"#;

    #[test]
    fn loads_a_minimal_configuration() {
        let config = load_str(MINIMAL, "test.yml").unwrap();
        assert_eq!(config.project_name, "demo");
        assert_eq!(config.containers["svc"].name, "svc");
        assert_eq!(config.tasks["t"].name, "t");
    }

    #[test]
    fn rejects_unknown_container_reference() {
        let yaml = r#"
project_name: demo
containers:
  svc:
    image: alpine
tasks:
  t:
    run:
      container: missing
"#;
        let err = load_str(yaml, "test.yml").unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownContainer { .. }));
    }

    #[test]
    fn rejects_self_dependency() {
        let yaml = r#"
project_name: demo
containers:
  svc:
    image: alpine
    dependencies: [svc]
tasks:
  t:
    run:
      container: svc
"#;
        let err = load_str(yaml, "test.yml").unwrap_err();
        assert!(matches!(err, ConfigurationError::SelfDependency { .. }));
    }

    #[test]
    fn rejects_unresolved_dependency() {
        let yaml = r#"
project_name: demo
containers:
  svc:
    image: alpine
    dependencies: [db]
tasks:
  t:
    run:
      container: svc
"#;
        let err = load_str(yaml, "test.yml").unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownDependency { .. }));
    }

    #[test]
    fn unions_deprecated_start_alias_with_dependencies() {
        let yaml = r#"
project_name: demo
containers:
  db:
    image: postgres
  cache:
    image: redis
  svc:
    image: alpine
    dependencies: [db]
    start: [cache]
tasks:
  t:
    run:
      container: svc
"#;
        let config = load_str(yaml, "test.yml").unwrap();
        let deps = config.containers["svc"].effective_dependencies();
        assert!(deps.contains("db"));
        assert!(deps.contains("cache"));
    }

    #[test]
    fn rejects_invalid_command_syntax() {
        let yaml = r#"
project_name: demo
containers:
  svc:
    image: alpine
    command: "echo 'unterminated"
tasks:
  t:
    run:
      container: svc
"#;
        let err = load_str(yaml, "test.yml").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidCommand { .. }));
    }

    #[test]
    fn load_from_file_reads_yaml_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, MINIMAL.as_bytes()).unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.project_name, "demo");
    }

    #[test]
    fn load_reports_io_error_for_missing_file() {
        let err = load(Path::new("/nonexistent/corral/does-not-exist.yml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Io { .. }));
    }
}
