use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

pub const BXT_BEFORE_HELP: &str = concat!(
    "bxt ",
    env!("CARGO_PKG_VERSION"),
    " – buildx sandbox command composer\n\n",
    "  classify         Decode a sandbox name into its driver and worker kind.\n",
    "  show             Print the buildx/docker invocation a sandbox would use.\n",
    "  run              Compose the invocation and execute it.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = BXT_BEFORE_HELP
)]
pub struct BxtCli {
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v", global = true)]
    pub trace: bool,
    #[arg(long, help = "Emit JSON instead of human output", global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(
        about = "Report the driver kind and worker predicates for a sandbox.",
        override_usage = "bxt classify --name NAME"
    )]
    Classify(SandboxArgs),
    #[command(
        about = "Print the composed invocation without running it.",
        override_usage = "bxt show <buildx|docker> [--env KEY=VALUE]... [--dir DIR] [-- <ARG>...]"
    )]
    Show(InvokeArgs),
    #[command(
        about = "Compose the invocation, run it with inherited stdio, forward its exit code.",
        override_usage = "bxt run <buildx|docker> [--env KEY=VALUE]... [--dir DIR] [-- <ARG>...]"
    )]
    Run(InvokeArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Tool {
    Buildx,
    Docker,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SandboxArgs {
    #[arg(
        long,
        env = "BXT_SANDBOX_NAME",
        value_name = "NAME",
        help = "Sandbox name, <driver> or <driver>+<feature>"
    )]
    pub name: Option<String>,
    #[arg(
        long,
        env = "BXT_SANDBOX_ADDRESS",
        value_name = "BUILDER",
        help = "Builder instance the sandbox exposes"
    )]
    pub address: Option<String>,
    #[arg(
        long,
        env = "BXT_SANDBOX_DOCKER_ADDRESS",
        value_name = "CONTEXT",
        help = "Docker context the sandbox runs against"
    )]
    pub docker_address: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "JSON file with {name,address,docker_address}; flags override its fields"
    )]
    pub sandbox_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InvokeArgs {
    #[arg(value_enum, help = "CLI to compose an invocation for")]
    pub tool: Tool,
    #[command(flatten)]
    pub sandbox: SandboxArgs,
    #[arg(long, value_name = "DIR", help = "Working directory for the command")]
    pub dir: Option<PathBuf>,
    #[arg(
        long = "env",
        value_name = "KEY=VALUE",
        value_parser = parse_env_pair,
        help = "Extra environment entry; sandbox-derived entries still win"
    )]
    pub env: Vec<(String, String)>,
    #[arg(last = true, value_name = "ARG", help = "Arguments passed to the tool")]
    pub args: Vec<String>,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty key in `{raw}`")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
