#![deny(clippy::all)]

//! Helpers for driving the `buildx` and `docker` CLIs against integration
//! sandboxes.
//!
//! A sandbox is supplied by the surrounding test orchestration; this crate only
//! interprets its identifiers and composes ready-to-run command descriptors.

pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod process;
pub mod sandbox;

pub use crate::command::{
    with_args, with_dir, with_env, CmdOpt, CommandSpec, Harness, BUILDX_PROGRAM, DOCKER_PROGRAM,
};
pub use crate::config::{parse_bool, EnvSnapshot, HarnessConfig, EXPERIMENTAL_ENV};
pub use crate::driver::{
    driver_name, is_docker_container_worker, is_docker_worker, is_moby_worker, DriverName,
};
pub use crate::error::FixtureError;
pub use crate::fixture::{tmpdir, try_tmpdir, Applier};
pub use crate::process::RunOutput;
pub use crate::sandbox::{Sandbox, SandboxInfo};
