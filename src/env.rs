//! Environment composition for function containers.

use crate::constants::FPROCESS_ENV_KEY;
use std::collections::HashMap;

/// Builds the container environment as `KEY=VALUE` entries.
///
/// `env_process` is the legacy way to set `fprocess`. An explicit
/// `fprocess` entry in `env_vars` takes precedence over it. Whichever wins is
/// emitted once, as the last entry; if neither supplies a value the key is
/// left out entirely.
///
/// Other entries are emitted in key order.
pub fn prepare_env(env_process: &str, env_vars: &HashMap<String, String>) -> Vec<String> {
    let mut fprocess = (!env_process.is_empty()).then(|| env_process.to_string());

    let mut keys: Vec<&String> = env_vars.keys().collect();
    keys.sort();

    let mut envs = Vec::with_capacity(env_vars.len() + 1);
    for key in keys {
        let value = &env_vars[key];
        if key == FPROCESS_ENV_KEY {
            fprocess = Some(value.clone());
        } else {
            envs.push(format!("{}={}", key, value));
        }
    }

    if let Some(fprocess) = fprocess {
        envs.push(format!("{}={}", FPROCESS_ENV_KEY, fprocess));
    }

    envs
}
