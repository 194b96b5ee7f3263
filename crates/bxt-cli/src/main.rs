use bxt_core::process::run_passthrough;
use bxt_core::{with_args, with_dir, with_env, CmdOpt, CommandSpec, Harness, SandboxInfo};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};

mod cli;
mod output;

use cli::{BxtCli, CommandGroupCli, InvokeArgs, SandboxArgs, Tool};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = BxtCli::parse();
    init_tracing(cli.trace, cli.verbose);

    match &cli.command {
        CommandGroupCli::Classify(args) => {
            let sandbox = resolve_sandbox(args)?;
            output::emit_classification(&sandbox, cli.json)?;
        }
        CommandGroupCli::Show(args) => {
            let spec = compose(args)?;
            output::emit_command(&spec, cli.json)?;
        }
        CommandGroupCli::Run(args) => {
            let spec = compose(args)?;
            let code = run_passthrough(&spec).map_err(|err| eyre!("{err:?}"))?;
            if code != 0 {
                std::process::exit(code);
            }
        }
    }
    Ok(())
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("bxt={level},bxt_cli={level},bxt_core={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn resolve_sandbox(args: &SandboxArgs) -> Result<SandboxInfo> {
    let mut sandbox = match &args.sandbox_file {
        Some(path) => SandboxInfo::load(path).map_err(|err| eyre!("{err:?}"))?,
        None => SandboxInfo::default(),
    };
    if let Some(name) = &args.name {
        sandbox.name.clone_from(name);
    }
    if let Some(address) = &args.address {
        sandbox.address.clone_from(address);
    }
    if let Some(docker_address) = &args.docker_address {
        sandbox.docker_address.clone_from(docker_address);
    }
    tracing::debug!(?sandbox, "resolved sandbox");
    Ok(sandbox)
}

fn compose(args: &InvokeArgs) -> Result<CommandSpec> {
    let sandbox = resolve_sandbox(&args.sandbox)?;
    let mut opts: Vec<CmdOpt> = Vec::new();
    if !args.env.is_empty() {
        opts.push(with_env(args.env.iter().cloned()));
    }
    if !args.args.is_empty() {
        opts.push(with_args(args.args.iter()));
    }
    if let Some(dir) = &args.dir {
        opts.push(with_dir(dir));
    }

    let harness = Harness::from_env();
    Ok(match args.tool {
        Tool::Buildx => harness.buildx_cmd(&sandbox, opts),
        Tool::Docker => harness.docker_cmd(&sandbox, opts),
    })
}
