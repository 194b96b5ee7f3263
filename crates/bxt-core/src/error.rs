use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while materializing a fixture tree.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to create temporary directory")]
    TempDir(#[source] io::Error),

    #[error("fixture path {} must be relative and stay inside the fixture root", path.display())]
    EscapesRoot { path: PathBuf },

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FixtureError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
