//! Host-environment interpolation for `$NAME` and `${NAME}` references.
//!
//! Resolution happens once, at task-start time, against the process's own
//! environment; a missing variable is a fatal configuration error raised
//! before any step runs (§6, §8 scenario 5).

use std::collections::HashMap;

use super::error::ConfigurationError;

/// Expand `$NAME`/`${NAME}` references in `value` using `lookup`.
/// `context` is used only to produce a readable error message.
pub fn interpolate(
    value: &str,
    context: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, ConfigurationError> {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'{' {
                let end = value[i + 2..]
                    .find('}')
                    .map(|p| i + 2 + p)
                    .ok_or_else(|| ConfigurationError::MissingHostVariable {
                        name: value[i..].to_string(),
                        context: context.to_string(),
                    })?;
                let name = &value[i + 2..end];
                out.push_str(&resolve(name, context, lookup)?);
                i = end + 1;
                continue;
            } else if is_ident_start(bytes[i + 1]) {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                let name = &value[start..end];
                out.push_str(&resolve(name, context, lookup)?);
                i = end;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }

    Ok(out)
}

fn resolve(
    name: &str,
    context: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, ConfigurationError> {
    lookup(name).ok_or_else(|| ConfigurationError::MissingHostVariable {
        name: name.to_string(),
        context: context.to_string(),
    })
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Resolve an interpolated map of environment bindings against the host
/// process environment.
pub fn interpolate_map(
    bindings: &HashMap<String, String>,
    context: &str,
) -> Result<HashMap<String, String>, ConfigurationError> {
    let lookup = |name: &str| std::env::var(name).ok();
    bindings
        .iter()
        .map(|(k, v)| Ok((k.clone(), interpolate(v, context, &lookup)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn expands_bare_and_braced_forms() {
        let lookup = env(&[("FOO", "bar")]);
        assert_eq!(interpolate("$FOO", "t", &lookup).unwrap(), "bar");
        assert_eq!(interpolate("${FOO}", "t", &lookup).unwrap(), "bar");
        assert_eq!(interpolate("x-${FOO}-y", "t", &lookup).unwrap(), "x-bar-y");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let lookup = env(&[]);
        let err = interpolate("$MISSING", "task 'deploy'", &lookup).unwrap_err();
        match err {
            ConfigurationError::MissingHostVariable { name, .. } => assert_eq!(name, "MISSING"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn literal_text_is_left_untouched() {
        let lookup = env(&[]);
        assert_eq!(interpolate("no vars here", "t", &lookup).unwrap(), "no vars here");
    }
}
