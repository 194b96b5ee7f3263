use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A running build-engine instance handed out by the test orchestration.
///
/// Attributes are fixed for the lifetime of a test. An empty address means the
/// sandbox does not expose that endpoint.
pub trait Sandbox {
    /// Driver identifier, `<driver-kind>` or `<driver-kind>+<feature>`.
    fn name(&self) -> &str;

    /// Builder instance name the orchestrator CLI should target.
    fn address(&self) -> &str;

    /// Container-runtime context the sandbox runs against.
    fn docker_address(&self) -> &str;
}

impl<S: Sandbox + ?Sized> Sandbox for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn address(&self) -> &str {
        (**self).address()
    }

    fn docker_address(&self) -> &str {
        (**self).docker_address()
    }
}

/// Plain-data sandbox description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxInfo {
    pub name: String,
    pub address: String,
    pub docker_address: String,
}

impl SandboxInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    #[must_use]
    pub fn with_docker_address(mut self, docker_address: impl Into<String>) -> Self {
        self.docker_address = docker_address.into();
        self
    }

    /// Reads a sandbox description from a JSON document.
    ///
    /// Missing fields default to empty strings.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read sandbox file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid sandbox description in {}", path.display()))
    }
}

impl Sandbox for SandboxInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn docker_address(&self) -> &str {
        &self.docker_address
    }
}
