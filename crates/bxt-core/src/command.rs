use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::{EnvSnapshot, HarnessConfig};
use crate::sandbox::Sandbox;

pub const BUILDX_PROGRAM: &str = "buildx";
pub const DOCKER_PROGRAM: &str = "docker";

const BUILDX_CONFIG_PREFIX: &str = "/tmp/buildx-";
const BUILDX_CONFIG_ENV: &str = "BUILDX_CONFIG";
const BUILDX_BUILDER_ENV: &str = "BUILDX_BUILDER";
const BUILDX_EXPERIMENTAL_ENV: &str = "BUILDX_EXPERIMENTAL";
const DOCKER_CONTEXT_ENV: &str = "DOCKER_CONTEXT";

/// An external process invocation that has not been started.
///
/// The environment is a list, not a map: the inherited copy comes first and
/// every later entry shadows earlier ones with the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    inherited: usize,
    dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Starts a descriptor for `program` seeded with a copy of `ambient`.
    #[must_use]
    pub fn new(program: impl Into<OsString>, ambient: &EnvSnapshot) -> Self {
        let env = ambient.to_vec();
        Self {
            program: program.into(),
            args: Vec::new(),
            inherited: env.len(),
            env,
            dir: None,
        }
    }

    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    #[must_use]
    pub fn env(&self) -> &[(OsString, OsString)] {
        &self.env
    }

    /// Entries appended on top of the inherited environment, in order.
    #[must_use]
    pub fn added_env(&self) -> &[(OsString, OsString)] {
        &self.env[self.inherited..]
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Value the started process would observe for `key`.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    pub fn push_env(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.env.push((key.into(), value.into()));
    }

    pub fn push_arg(&mut self, arg: impl Into<OsString>) {
        self.args.push(arg.into());
    }

    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dir = Some(dir.into());
    }

    /// Converts into a `std::process::Command` without starting it.
    ///
    /// The child environment is cleared first, then every entry is applied in
    /// order.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.env_clear();
        for (key, value) in &self.env {
            command.env(key, value);
        }
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::with_capacity(self.added_env().len() + self.args.len() + 1);
        for (key, value) in self.added_env() {
            words.push(format!(
                "{}={}",
                key.to_string_lossy(),
                shell_quote(&value.to_string_lossy())
            ));
        }
        words.push(shell_quote(&self.program.to_string_lossy()).into_owned());
        for arg in &self.args {
            words.push(shell_quote(&arg.to_string_lossy()).into_owned());
        }
        f.write_str(&words.join(" "))
    }
}

fn shell_quote(word: &str) -> Cow<'_, str> {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if plain {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

/// Mutation applied to a [`CommandSpec`] while it is being built.
pub enum CmdOpt {
    Env(Vec<(OsString, OsString)>),
    Args(Vec<OsString>),
    Dir(PathBuf),
    Custom(Box<dyn FnOnce(&mut CommandSpec)>),
}

impl CmdOpt {
    pub fn custom(f: impl FnOnce(&mut CommandSpec) + 'static) -> Self {
        Self::Custom(Box::new(f))
    }

    fn apply(self, spec: &mut CommandSpec) {
        match self {
            Self::Env(vars) => spec.env.extend(vars),
            Self::Args(args) => spec.args.extend(args),
            Self::Dir(dir) => spec.dir = Some(dir),
            Self::Custom(f) => f(spec),
        }
    }
}

impl fmt::Debug for CmdOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(vars) => f.debug_tuple("Env").field(vars).finish(),
            Self::Args(args) => f.debug_tuple("Args").field(args).finish(),
            Self::Dir(dir) => f.debug_tuple("Dir").field(dir).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

pub fn with_env<I, K, V>(vars: I) -> CmdOpt
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    CmdOpt::Env(
        vars.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    )
}

pub fn with_args<I, S>(args: I) -> CmdOpt
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    CmdOpt::Args(args.into_iter().map(Into::into).collect())
}

pub fn with_dir(dir: impl Into<PathBuf>) -> CmdOpt {
    CmdOpt::Dir(dir.into())
}

/// Composes `buildx` and `docker` invocations for sandboxes.
///
/// Holds the environment snapshot every descriptor is seeded from and the
/// configuration resolved from that same snapshot.
#[derive(Debug, Clone)]
pub struct Harness {
    env: EnvSnapshot,
    config: HarnessConfig,
}

impl Harness {
    /// Captures the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(EnvSnapshot::capture())
    }

    #[must_use]
    pub fn from_snapshot(env: EnvSnapshot) -> Self {
        let config = HarnessConfig::from_snapshot(&env);
        Self { env, config }
    }

    #[must_use]
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    #[must_use]
    pub fn config(&self) -> HarnessConfig {
        self.config
    }

    /// Builds a `buildx` invocation targeting the sandbox's builder.
    ///
    /// Caller options run first; sandbox-derived entries are appended after
    /// them and therefore win on key collisions.
    pub fn buildx_cmd<S, I>(&self, sb: &S, opts: I) -> CommandSpec
    where
        S: Sandbox + ?Sized,
        I: IntoIterator<Item = CmdOpt>,
    {
        let mut spec = self.start(BUILDX_PROGRAM, opts);
        let builder = sb.address();
        if !builder.is_empty() {
            spec.push_env(BUILDX_CONFIG_ENV, format!("{BUILDX_CONFIG_PREFIX}{builder}"));
            spec.push_env(BUILDX_BUILDER_ENV, builder);
        }
        push_docker_context(&mut spec, sb);
        if self.config.experimental {
            spec.push_env(BUILDX_EXPERIMENTAL_ENV, "1");
        }
        debug!(
            program = BUILDX_PROGRAM,
            sandbox = sb.name(),
            builder,
            experimental = self.config.experimental,
            "composed command"
        );
        spec
    }

    /// Builds a `docker` invocation against the sandbox's context.
    pub fn docker_cmd<S, I>(&self, sb: &S, opts: I) -> CommandSpec
    where
        S: Sandbox + ?Sized,
        I: IntoIterator<Item = CmdOpt>,
    {
        let mut spec = self.start(DOCKER_PROGRAM, opts);
        push_docker_context(&mut spec, sb);
        debug!(
            program = DOCKER_PROGRAM,
            sandbox = sb.name(),
            context = sb.docker_address(),
            "composed command"
        );
        spec
    }

    fn start<I>(&self, program: &str, opts: I) -> CommandSpec
    where
        I: IntoIterator<Item = CmdOpt>,
    {
        let mut spec = CommandSpec::new(program, &self.env);
        for opt in opts {
            tracing::trace!(?opt, program, "applying option");
            opt.apply(&mut spec);
        }
        spec
    }
}

fn push_docker_context<S: Sandbox + ?Sized>(spec: &mut CommandSpec, sb: &S) {
    let context = sb.docker_address();
    if !context.is_empty() {
        spec.push_env(DOCKER_CONTEXT_ENV, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXPERIMENTAL_ENV;
    use crate::sandbox::SandboxInfo;

    fn harness(pairs: &[(&str, &str)]) -> Harness {
        Harness::from_snapshot(EnvSnapshot::from_pairs(pairs.iter().copied()))
    }

    fn added(spec: &CommandSpec) -> Vec<(String, String)> {
        spec.added_env()
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn buildx_binds_builder_address() {
        let sb = SandboxInfo::new("docker-container").with_address("mysb");
        let spec = harness(&[]).buildx_cmd(&sb, []);

        assert_eq!(spec.program(), BUILDX_PROGRAM);
        assert_eq!(
            added(&spec),
            vec![
                pair("BUILDX_CONFIG", "/tmp/buildx-mysb"),
                pair("BUILDX_BUILDER", "mysb"),
            ]
        );
    }

    #[test]
    fn buildx_without_address_adds_nothing() {
        let sb = SandboxInfo::new("docker");
        let spec = harness(&[("PATH", "/usr/bin")]).buildx_cmd(&sb, []);

        assert!(spec.added_env().is_empty());
        assert_eq!(spec.env_value("BUILDX_CONFIG"), None);
        assert_eq!(spec.env_value("BUILDX_BUILDER"), None);
        assert_eq!(spec.env_value("PATH"), Some(OsStr::new("/usr/bin")));
    }

    #[test]
    fn both_builders_select_docker_context() {
        let sb = SandboxInfo::new("docker").with_docker_address("ctx1");
        let h = harness(&[]);

        let docker = h.docker_cmd(&sb, []);
        assert_eq!(docker.program(), DOCKER_PROGRAM);
        assert_eq!(docker.env_value("DOCKER_CONTEXT"), Some(OsStr::new("ctx1")));

        let buildx = h.buildx_cmd(&sb, []);
        assert_eq!(buildx.env_value("DOCKER_CONTEXT"), Some(OsStr::new("ctx1")));
    }

    #[test]
    fn empty_docker_address_leaves_context_unset() {
        let sb = SandboxInfo::new("docker-container").with_address("sb");
        let docker = harness(&[]).docker_cmd(&sb, []);
        assert_eq!(docker.env_value("DOCKER_CONTEXT"), None);
        assert!(docker.added_env().is_empty());
    }

    #[test]
    fn docker_ignores_builder_address_and_experimental() {
        let sb = SandboxInfo::new("docker-container").with_address("mysb");
        let docker = harness(&[(EXPERIMENTAL_ENV, "1")]).docker_cmd(&sb, []);
        assert_eq!(docker.env_value("BUILDX_BUILDER"), None);
        assert_eq!(docker.env_value("BUILDX_EXPERIMENTAL"), None);
    }

    #[test]
    fn experimental_toggle_follows_snapshot() {
        let sb = SandboxInfo::new("docker");

        let on = harness(&[(EXPERIMENTAL_ENV, "true")]).buildx_cmd(&sb, []);
        assert_eq!(added(&on), vec![pair("BUILDX_EXPERIMENTAL", "1")]);

        let off = harness(&[(EXPERIMENTAL_ENV, "notabool")]).buildx_cmd(&sb, []);
        assert!(off.added_env().is_empty());
    }

    #[test]
    fn sandbox_entries_follow_caller_entries() {
        let sb = SandboxInfo::new("docker-container")
            .with_address("mysb")
            .with_docker_address("ctx1");
        let spec = harness(&[(EXPERIMENTAL_ENV, "1")]).buildx_cmd(
            &sb,
            [with_env([
                ("BUILDX_BUILDER", "caller"),
                ("DOCKER_CONTEXT", "caller-ctx"),
                ("EXTRA", "x"),
            ])],
        );

        assert_eq!(
            added(&spec),
            vec![
                pair("BUILDX_BUILDER", "caller"),
                pair("DOCKER_CONTEXT", "caller-ctx"),
                pair("EXTRA", "x"),
                pair("BUILDX_CONFIG", "/tmp/buildx-mysb"),
                pair("BUILDX_BUILDER", "mysb"),
                pair("DOCKER_CONTEXT", "ctx1"),
                pair("BUILDX_EXPERIMENTAL", "1"),
            ]
        );
        assert_eq!(spec.env_value("BUILDX_BUILDER"), Some(OsStr::new("mysb")));
        assert_eq!(spec.env_value("DOCKER_CONTEXT"), Some(OsStr::new("ctx1")));
        assert_eq!(spec.env_value("EXTRA"), Some(OsStr::new("x")));
    }

    #[test]
    fn inherited_environment_comes_first() {
        let sb = SandboxInfo::new("docker");
        let spec = harness(&[("HOME", "/root"), ("FOO", "ambient")])
            .buildx_cmd(&sb, [with_env([("FOO", "caller")])]);

        assert_eq!(spec.env().len(), 3);
        assert_eq!(spec.env()[0].0, "HOME");
        assert_eq!(spec.env_value("FOO"), Some(OsStr::new("caller")));
        assert_eq!(added(&spec), vec![pair("FOO", "caller")]);
    }

    #[test]
    fn options_apply_in_order() {
        let sb = SandboxInfo::new("docker");
        let spec = harness(&[]).docker_cmd(
            &sb,
            [
                with_args(["buildx", "ls"]),
                with_dir("/first"),
                with_args(["--format", "json"]),
                with_dir("/second"),
                CmdOpt::custom(|spec| spec.push_arg("--no-trunc")),
            ],
        );

        let args: Vec<_> = spec.args().iter().map(|a| a.to_string_lossy()).collect();
        assert_eq!(args, ["buildx", "ls", "--format", "json", "--no-trunc"]);
        assert_eq!(spec.dir(), Some(Path::new("/second")));
    }

    #[test]
    fn descriptors_do_not_share_environment() {
        let sb = SandboxInfo::new("docker").with_docker_address("ctx");
        let h = harness(&[("A", "1")]);
        let mut first = h.docker_cmd(&sb, []);
        let second = h.docker_cmd(&sb, []);
        first.push_env("A", "2");

        assert_eq!(first.env_value("A"), Some(OsStr::new("2")));
        assert_eq!(second.env_value("A"), Some(OsStr::new("1")));
        assert_eq!(h.env().var("A"), Some("1"));
    }

    #[test]
    fn to_command_applies_last_wins_environment() {
        let sb = SandboxInfo::new("docker").with_docker_address("ctx1");
        let spec = harness(&[("DOCKER_CONTEXT", "ambient")]).docker_cmd(
            &sb,
            [with_args(["version"]), with_dir("/tmp")],
        );
        let command = spec.to_command();

        assert_eq!(command.get_program(), "docker");
        assert_eq!(command.get_args().collect::<Vec<_>>(), ["version"]);
        assert_eq!(command.get_current_dir(), Some(Path::new("/tmp")));
        let context = command
            .get_envs()
            .find(|(k, _)| *k == "DOCKER_CONTEXT")
            .and_then(|(_, v)| v);
        assert_eq!(context, Some(OsStr::new("ctx1")));
    }

    #[test]
    fn display_shows_added_env_and_quotes_arguments() {
        let sb = SandboxInfo::new("docker-container").with_address("mysb");
        let spec = harness(&[("PATH", "/bin")]).buildx_cmd(
            &sb,
            [with_args(["build", "--build-arg", "MSG=hello world", "."])],
        );

        assert_eq!(
            spec.to_string(),
            "BUILDX_CONFIG=/tmp/buildx-mysb BUILDX_BUILDER=mysb buildx build --build-arg 'MSG=hello world' ."
        );
    }

    #[test]
    fn with_config_overrides_snapshot_resolution() {
        let sb = SandboxInfo::new("docker");
        let h = harness(&[]).with_config(HarnessConfig { experimental: true });
        assert!(h.config().experimental);
        let spec = h.buildx_cmd(&sb, []);
        assert_eq!(spec.env_value("BUILDX_EXPERIMENTAL"), Some(OsStr::new("1")));
    }
}
