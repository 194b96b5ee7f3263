use std::io::Read;
use std::process::{ChildStderr, ChildStdout, Stdio};
use std::thread;

use anyhow::{anyhow, Context, Result};

use crate::command::CommandSpec;

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Execute a composed command and capture stdout/stderr.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or its output streams
/// cannot be read.
pub fn run_capture(spec: &CommandSpec) -> Result<RunOutput> {
    let program = spec.program().to_string_lossy().into_owned();
    let mut command = spec.to_command();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(%spec, "spawning");
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start {program}"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout missing for {program}"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr missing for {program}"))?;
    // Drain both pipes while waiting; a full pipe would stall the child.
    let stdout_handle = thread::spawn(move || read_stdout(stdout));
    let stderr_handle = thread::spawn(move || read_stderr(stderr));

    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {program}"))?;
    let stdout = stdout_handle
        .join()
        .map_err(|_| anyhow!("stdout thread panicked"))??;
    let stderr = stderr_handle
        .join()
        .map_err(|_| anyhow!("stderr thread panicked"))??;
    Ok(RunOutput {
        code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// Execute a composed command with inherited stdio and return its exit code.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or waited on.
pub fn run_passthrough(spec: &CommandSpec) -> Result<i32> {
    let program = spec.program().to_string_lossy().into_owned();
    tracing::debug!(%spec, "spawning with inherited stdio");
    let status = spec
        .to_command()
        .status()
        .with_context(|| format!("failed to start {program}"))?;
    Ok(status.code().unwrap_or(-1))
}

fn read_stdout(mut stream: ChildStdout) -> Result<String> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .context("failed to read stdout")?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_stderr(mut stream: ChildStderr) -> Result<String> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .context("failed to read stderr")?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::EnvSnapshot;

    fn sh(script: &str, env: &[(&str, &str)]) -> CommandSpec {
        let mut spec = CommandSpec::new("/bin/sh", &EnvSnapshot::from_pairs(env.iter().copied()));
        for arg in ["-c", script] {
            spec.push_arg(arg);
        }
        spec
    }

    #[test]
    fn capture_sees_last_wins_environment() {
        let mut spec = sh("printf '%s' \"$GREETING\"", &[("GREETING", "ambient")]);
        spec.push_env("GREETING", "sandbox");

        let output = run_capture(&spec).expect("run sh");
        assert!(output.success(), "stderr: {}", output.stderr);
        assert_eq!(output.stdout, "sandbox");
    }

    #[test]
    fn capture_reports_exit_code_and_stderr() {
        let spec = sh("echo oops >&2; exit 3", &[]);
        let output = run_capture(&spec).expect("run sh");
        assert_eq!(output.code, 3);
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn capture_honors_working_directory() {
        let temp = tempfile::tempdir().unwrap();
        let mut spec = sh("pwd", &[]);
        spec.set_dir(temp.path());

        let output = run_capture(&spec).expect("run sh");
        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn missing_program_is_an_error() {
        let spec = CommandSpec::new("bxt-definitely-missing-program", &EnvSnapshot::default());
        let err = run_capture(&spec).unwrap_err();
        assert!(
            err.to_string().contains("failed to start"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn passthrough_returns_exit_code() {
        assert_eq!(run_passthrough(&sh("exit 0", &[])).expect("run sh"), 0);
        assert_eq!(run_passthrough(&sh("exit 7", &[])).expect("run sh"), 7);
    }
}
