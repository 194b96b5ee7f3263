use std::env;
use std::ffi::{OsStr, OsString};

/// Enables experimental buildx behavior in composed commands.
pub const EXPERIMENTAL_ENV: &str = "TEST_BUILDX_EXPERIMENTAL";

/// Ordered copy of a process environment.
///
/// Entries keep their capture order and are never deduplicated; lookups
/// resolve to the last matching entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: Vec<(OsString, OsString)>,
}

impl EnvSnapshot {
    /// Copies the current process environment, including non-UTF-8 entries.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars_os().collect(),
        }
    }

    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn var_os(&self, key: &str) -> Option<&OsStr> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    /// Returns `None` when the key is absent or its value is not UTF-8.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.var_os(key).and_then(OsStr::to_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.var_os(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub(crate) fn to_vec(&self) -> Vec<(OsString, OsString)> {
        self.vars.clone()
    }
}

/// Parses the conventional boolean spellings.
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`; anything
/// else is `None`.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Settings the command builders read from the ambient environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarnessConfig {
    pub experimental: bool,
}

impl HarnessConfig {
    #[must_use]
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            experimental: experimental_enabled(snapshot),
        }
    }
}

/// Absent or malformed values leave experimental mode off.
fn experimental_enabled(snapshot: &EnvSnapshot) -> bool {
    let Some(raw) = snapshot.var_os(EXPERIMENTAL_ENV) else {
        return false;
    };
    match raw.to_str().and_then(parse_bool) {
        Some(enabled) => enabled,
        None => {
            tracing::debug!(
                var = EXPERIMENTAL_ENV,
                value = %raw.to_string_lossy(),
                "ignoring unparseable boolean"
            );
            false
        }
    }
}
