//! Graph construction (§4.1): resolve the root, breadth-first walk over
//! `dependencies`, verify acyclicity with a coloring DFS, and compute each
//! node's effective command/environment/ports.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::{interpolate_map, Configuration, ConfigurationError, TaskDefinition};

use super::types::{ContainerSpec, DependencyGraph};

/// Build the dependency graph for `task` within `config`.
///
/// Fails with [`ConfigurationError`] when a referenced container is
/// absent, when the dependency relation contains a cycle, or when the
/// effective command is syntactically invalid.
pub fn build(config: &Configuration, task: &TaskDefinition) -> Result<DependencyGraph, ConfigurationError> {
    let root = task.run.container.clone();

    let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(root.clone());

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(root.clone());

    while let Some(name) = queue.pop_front() {
        let container =
            config
                .containers
                .get(&name)
                .ok_or_else(|| ConfigurationError::UnknownContainer {
                    task: task.name.clone(),
                    container: name.clone(),
                })?;

        let mut deps = container.effective_dependencies();
        if name == root {
            deps.extend(task.dependencies.iter().cloned());
        }

        for dep in &deps {
            if !seen.contains(dep) {
                seen.insert(dep.clone());
                queue.push_back(dep.clone());
            }
        }

        dependencies.insert(name, deps);
    }

    detect_cycle(&root, &dependencies)?;

    let mut dependents: HashMap<String, HashSet<String>> = HashMap::new();
    for (name, deps) in &dependencies {
        dependents.entry(name.clone()).or_default();
        for dep in deps {
            dependents.entry(dep.clone()).or_default().insert(name.clone());
        }
    }

    let mut nodes = HashMap::new();
    for name in seen.iter() {
        let container = config.containers.get(name).expect("resolved above");
        let image_source = container.image_source()?;

        let is_root = *name == root;

        let command = if is_root {
            task.run
                .command
                .clone()
                .or_else(|| container.command.clone())
        } else {
            container.command.clone()
        };
        let command = match command {
            Some(cmd) => shell_words::split(&cmd).map_err(|e| ConfigurationError::InvalidCommand {
                container: name.clone(),
                message: e.to_string(),
            })?,
            None => Vec::new(),
        };

        let mut raw_env: HashMap<String, String> = container
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), v.raw().to_string()))
            .collect();
        if is_root {
            for (k, v) in &task.run.environment {
                raw_env.insert(k.clone(), v.raw().to_string());
            }
        }
        let environment = interpolate_map(&raw_env, &format!("container '{name}'"))?;

        let mut ports = container.ports.clone();
        if is_root {
            ports.extend(task.run.ports.iter().cloned());
        }

        nodes.insert(
            name.clone(),
            ContainerSpec {
                name: name.clone(),
                image_source,
                command,
                environment,
                working_directory: container.working_directory.clone(),
                volumes: container.volumes.clone(),
                ports,
                health_check: container.health_check.clone(),
            },
        );
    }

    Ok(DependencyGraph {
        root,
        nodes,
        dependencies,
        dependents,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

fn detect_cycle(
    root: &str,
    dependencies: &HashMap<String, HashSet<String>>,
) -> Result<(), ConfigurationError> {
    let mut colors: HashMap<&str, Color> = dependencies.keys().map(|k| (k.as_str(), Color::White)).collect();
    let mut path: Vec<String> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        dependencies: &'a HashMap<String, HashSet<String>>,
        colors: &mut HashMap<&'a str, Color>,
        path: &mut Vec<String>,
    ) -> Result<(), ConfigurationError> {
        colors.insert(node, Color::Grey);
        path.push(node.to_string());

        if let Some(deps) = dependencies.get(node) {
            let mut sorted: Vec<&String> = deps.iter().collect();
            sorted.sort();
            for dep in sorted {
                match colors.get(dep.as_str()) {
                    Some(Color::Grey) => {
                        let mut cycle_path = path.clone();
                        cycle_path.push(dep.clone());
                        return Err(ConfigurationError::DependencyCycle { path: cycle_path });
                    }
                    Some(Color::Black) => {}
                    _ => visit(dep.as_str(), dependencies, colors, path)?,
                }
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        Ok(())
    }

    visit(root, dependencies, &mut colors, &mut path)
}
