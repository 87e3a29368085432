//! The task execution order resolver (§4.7): expands a target task's
//! `prerequisites` into a linear run order, outside the per-task engine.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::Configuration;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("prerequisite cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Resolve the ordered list `[p1, p2, ..., pn, target]`: the recursive,
/// left-to-right, depth-first expansion of `target`'s prerequisites,
/// deduplicated on first encounter, followed by `target` itself.
pub fn resolve(config: &Configuration, target: &str) -> Result<Vec<String>, OrderError> {
    if !config.tasks.contains_key(target) {
        return Err(OrderError::UnknownTask(target.to_string()));
    }

    let mut colors: std::collections::HashMap<String, Color> = std::collections::HashMap::new();
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut path = Vec::new();

    visit(config, target, &mut colors, &mut order, &mut seen, &mut path)?;

    Ok(order)
}

fn visit(
    config: &Configuration,
    name: &str,
    colors: &mut std::collections::HashMap<String, Color>,
    order: &mut Vec<String>,
    seen: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Result<(), OrderError> {
    match colors.get(name) {
        Some(Color::Black) => return Ok(()),
        Some(Color::Grey) => {
            let mut cycle_path = path.clone();
            cycle_path.push(name.to_string());
            return Err(OrderError::Cycle { path: cycle_path });
        }
        _ => {}
    }

    colors.insert(name.to_string(), Color::Grey);
    path.push(name.to_string());

    let task = config.tasks.get(name).ok_or_else(|| OrderError::UnknownTask(name.to_string()))?;
    for prerequisite in &task.prerequisites {
        visit(config, prerequisite, colors, order, seen, path)?;
    }

    path.pop();
    colors.insert(name.to_string(), Color::Black);

    if seen.insert(name.to_string()) {
        order.push(name.to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> Configuration {
        crate::config::load_str(yaml, "t.yml").unwrap()
    }

    #[test]
    fn single_task_has_no_prerequisites() {
        let config = config(
            "project_name: p\ncontainers:\n  svc:\n    image: alpine\ntasks:\n  t:\n    run:\n      container: svc\n",
        );
        assert_eq!(resolve(&config, "t").unwrap(), vec!["t".to_string()]);
    }

    #[test]
    fn expands_prerequisite_chain() {
        let yaml = r#"
project_name: p
containers:
  svc:
    image: alpine
tasks:
  build:
    run:
      container: svc
  test:
    run:
      container: svc
    prerequisites: [build]
  deploy:
    run:
      container: svc
    prerequisites: [test]
"#;
        let config = config(yaml);
        assert_eq!(
            resolve(&config, "deploy").unwrap(),
            vec!["build".to_string(), "test".to_string(), "deploy".to_string()]
        );
    }

    #[test]
    fn deduplicates_diamond_prerequisites() {
        let yaml = r#"
project_name: p
containers:
  svc:
    image: alpine
tasks:
  base:
    run:
      container: svc
  left:
    run:
      container: svc
    prerequisites: [base]
  right:
    run:
      container: svc
    prerequisites: [base]
  top:
    run:
      container: svc
    prerequisites: [left, right]
"#;
        let config = config(yaml);
        let order = resolve(&config, "top").unwrap();
        assert_eq!(order, vec!["base".to_string(), "left".to_string(), "right".to_string(), "top".to_string()]);
    }

    #[test]
    fn rejects_prerequisite_cycle() {
        let yaml = r#"
project_name: p
containers:
  svc:
    image: alpine
tasks:
  a:
    run:
      container: svc
    prerequisites: [b]
  b:
    run:
      container: svc
    prerequisites: [a]
"#;
        let config = config(yaml);
        let err = resolve(&config, "a").unwrap_err();
        assert!(matches!(err, OrderError::Cycle { .. }));
    }

    #[test]
    fn rejects_unknown_target_task() {
        let config = config(
            "project_name: p\ncontainers:\n  svc:\n    image: alpine\ntasks:\n  t:\n    run:\n      container: svc\n",
        );
        let err = resolve(&config, "missing").unwrap_err();
        assert!(matches!(err, OrderError::UnknownTask(_)));
    }
}
