//! Environment composition for tool invocations.
//!
//! Path-like variables are extended (prefix or suffix); scalar variables are replaced.
//! Composition always works on a copy, never on the driver's own environment.

use crate::models::{EnvOverride, HostOs};
use std::collections::BTreeMap;

/// A complete process environment. Ordered, so composed environments compare and log stably.
pub type Environment = BTreeMap<String, String>;

/// Snapshot the driver's environment. Non-UTF-8 entries are converted lossily.
pub fn ambient_environment() -> Environment {
    std::env::vars_os()
        .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
        .collect()
}

/// Apply `overrides` in order on top of a copy of `ambient`.
///
/// Variable names are matched case-insensitively on Windows, where `Path` and `PATH` are
/// the same variable.
pub fn compose_environment(
    ambient: &Environment,
    overrides: &[(String, EnvOverride)],
    host: HostOs,
) -> Environment {
    let mut env = ambient.clone();
    let separator = host.path_list_separator();

    for (name, change) in overrides {
        let key = existing_key(&env, name, host).unwrap_or_else(|| name.clone());
        let current = env.get(&key).filter(|v| !v.is_empty()).cloned();
        let value = match (change, current) {
            (EnvOverride::Set(value), _) => value.clone(),
            (EnvOverride::Prepend(value), Some(current)) => format!("{}{}{}", value, separator, current),
            (EnvOverride::Append(value), Some(current)) => format!("{}{}{}", current, separator, value),
            (EnvOverride::Prepend(value), None) | (EnvOverride::Append(value), None) => value.clone(),
        };
        env.insert(key, value);
    }
    env
}

fn existing_key(env: &Environment, name: &str, host: HostOs) -> Option<String> {
    if host == HostOs::Windows {
        env.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned()
    } else {
        env.contains_key(name).then(|| name.to_string())
    }
}
