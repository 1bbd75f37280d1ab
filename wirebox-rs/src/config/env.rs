//! Environment overrides.

use std::collections::{BTreeMap, HashSet};

use tracing::warn;
use wirebox_core::Properties;

use super::source::PropertySource;
use crate::error::AppError;
use crate::logging::LOG_ENV;

pub const DEFAULT_ENV_PREFIX: &str = "WIREBOX_";

/// Reads overrides from environment variables.
///
/// A key already loaded, say `db.hosts[0].name`, is overridden by `WIREBOX_DB_HOSTS_0_NAME`:
/// the prefix, then the key upper-cased with `.`, `[` and `-` turned into `_` and `]` dropped.
/// Any other variable carrying the prefix is imported as `lower(rest)` with `_` read as `.`,
/// so `WIREBOX_CACHE_TTL` sets `cache.ttl`. An imported variable that doesn't form a valid
/// key, or clashes with a loaded map or array, is skipped with a warning. An empty prefix
/// disables the import.
#[derive(Clone, Debug)]
pub struct EnvSource {
    prefix: String,
    vars: Option<BTreeMap<String, String>>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_ENV_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: None,
        }
    }

    /// Reads from `vars` instead of the process environment.
    pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Variable that overrides `key`.
    pub fn var_name(&self, key: &str) -> String {
        let mut name = self.prefix.clone();
        for c in key.chars() {
            match c {
                '.' | '[' | '-' => name.push('_'),
                ']' => {}
                c => name.extend(c.to_uppercase()),
            }
        }
        name
    }

    fn vars(&self) -> BTreeMap<String, String> {
        match &self.vars {
            Some(vars) => vars.clone(),
            // Variables that are not valid unicode can't name keys; skip them.
            None => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertySource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn load(&self, loaded: &Properties) -> Result<Vec<(String, String)>, AppError> {
        let vars = self.vars();
        let mut out = Vec::new();
        let mut used = HashSet::new();
        for key in loaded.keys() {
            let name = self.var_name(&key);
            if let Some(value) = vars.get(&name) {
                out.push((key, value.clone()));
                used.insert(name);
            }
        }
        if self.prefix.is_empty() {
            return Ok(out);
        }
        let mut scratch = loaded.clone();
        for (name, value) in &vars {
            if used.contains(name) || name == LOG_ENV {
                continue;
            }
            let Some(rest) = name.strip_prefix(&self.prefix).filter(|r| !r.is_empty()) else {
                continue;
            };
            let key = rest.to_lowercase().replace('_', ".");
            match scratch.set(&key, value) {
                Ok(()) => out.push((key, value.clone())),
                Err(e) => warn!(var = %name, error = %e, "skipping environment variable"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_keys_to_variable_names() {
        let env = EnvSource::new();
        assert_eq!(env.var_name("db.hosts[0].name"), "WIREBOX_DB_HOSTS_0_NAME");
        assert_eq!(env.var_name("http-client.timeout"), "WIREBOX_HTTP_CLIENT_TIMEOUT");
        assert_eq!(EnvSource::with_prefix("").var_name("a.b"), "A_B");
    }

    #[test]
    fn import_skips_clashing_and_invalid_names() {
        let loaded = Properties::from_pairs([("db.host", "a")]).unwrap();
        let env = EnvSource::new().with_vars([
            ("WIREBOX_DB", "x"),
            ("WIREBOX_DB_HOST", "b"),
            ("WIREBOX__", "x"),
            ("WIREBOX_LOG", "debug"),
            ("WIREBOX_POOL_SIZE", "4"),
        ]);
        let pairs = env.load(&loaded).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("db.host".to_owned(), "b".to_owned()),
                ("pool.size".to_owned(), "4".to_owned()),
            ]
        );
    }
}
