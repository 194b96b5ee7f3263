//! Temporary directory trees for test cases.
//!
//! An [`Applier`] materializes part of a tree below a root directory.
//! [`tmpdir`] creates a fresh directory, applies every applier in order and
//! hands the directory back; dropping the returned [`TempDir`] removes it.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use crate::error::FixtureError;

const TMPDIR_PREFIX: &str = "bxt-fixture-";

pub trait Applier {
    /// Applies this change below `root`.
    ///
    /// # Errors
    /// Returns an error if the filesystem change cannot be made.
    fn apply(&self, root: &Path) -> Result<(), FixtureError>;
}

impl<F> Applier for F
where
    F: Fn(&Path) -> Result<(), FixtureError>,
{
    fn apply(&self, root: &Path) -> Result<(), FixtureError> {
        self(root)
    }
}

/// Writes a file. Its parent directory must already exist.
#[derive(Debug, Clone)]
pub struct CreateFile {
    name: PathBuf,
    content: Vec<u8>,
    mode: u32,
}

#[derive(Debug, Clone)]
pub struct CreateDir {
    name: PathBuf,
    mode: u32,
}

/// Creates `link` pointing at `target`; the target is written verbatim.
#[derive(Debug, Clone)]
pub struct Symlink {
    target: PathBuf,
    link: PathBuf,
}

/// Applies a sequence of appliers, stopping at the first failure.
pub struct Chain {
    appliers: Vec<Box<dyn Applier>>,
}

pub fn create_file(name: impl Into<PathBuf>, content: impl Into<Vec<u8>>, mode: u32) -> CreateFile {
    CreateFile {
        name: name.into(),
        content: content.into(),
        mode,
    }
}

pub fn create_dir(name: impl Into<PathBuf>, mode: u32) -> CreateDir {
    CreateDir {
        name: name.into(),
        mode,
    }
}

pub fn symlink(target: impl Into<PathBuf>, link: impl Into<PathBuf>) -> Symlink {
    Symlink {
        target: target.into(),
        link: link.into(),
    }
}

pub fn chain(appliers: Vec<Box<dyn Applier>>) -> Chain {
    Chain { appliers }
}

impl Applier for CreateFile {
    fn apply(&self, root: &Path) -> Result<(), FixtureError> {
        let path = resolve(root, &self.name)?;
        fs::write(&path, &self.content).map_err(|err| FixtureError::io("write", &path, err))?;
        set_mode(&path, self.mode)
    }
}

impl Applier for CreateDir {
    fn apply(&self, root: &Path) -> Result<(), FixtureError> {
        let path = resolve(root, &self.name)?;
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(err) => return Err(FixtureError::io("create directory", &path, err)),
        }
        set_mode(&path, self.mode)
    }
}

impl Applier for Symlink {
    fn apply(&self, root: &Path) -> Result<(), FixtureError> {
        let link = resolve(root, &self.link)?;
        make_symlink(&self.target, &link).map_err(|err| FixtureError::io("symlink", &link, err))
    }
}

impl Applier for Chain {
    fn apply(&self, root: &Path) -> Result<(), FixtureError> {
        self.appliers
            .iter()
            .try_for_each(|applier| applier.apply(root))
    }
}

/// Creates a temporary directory and materializes `appliers` inside it.
///
/// # Errors
/// Returns an error if the directory cannot be created or any applier fails.
/// The partially built directory is removed in that case.
pub fn try_tmpdir(appliers: &[&dyn Applier]) -> Result<TempDir, FixtureError> {
    let dir = tempfile::Builder::new()
        .prefix(TMPDIR_PREFIX)
        .tempdir()
        .map_err(FixtureError::TempDir)?;
    for applier in appliers {
        applier.apply(dir.path())?;
    }
    tracing::debug!(path = %dir.path().display(), count = appliers.len(), "fixture applied");
    Ok(dir)
}

/// Test helper around [`try_tmpdir`].
///
/// The directory lives as long as the returned guard, normally the rest of
/// the test.
///
/// # Panics
/// Panics, failing the calling test, if the fixture cannot be materialized.
#[track_caller]
#[must_use]
pub fn tmpdir(appliers: &[&dyn Applier]) -> TempDir {
    match try_tmpdir(appliers) {
        Ok(dir) => dir,
        Err(err) => panic!("fixture setup failed: {}", error_chain(&err)),
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn resolve(root: &Path, name: &Path) -> Result<PathBuf, FixtureError> {
    let escapes = name.as_os_str().is_empty()
        || name
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(FixtureError::EscapesRoot {
            path: name.to_path_buf(),
        });
    }
    Ok(root.join(name))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), FixtureError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|err| FixtureError::io("set permissions on", path, err))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), FixtureError> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
