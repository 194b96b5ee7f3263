use std::path::Path;

use bxt_core::{
    is_docker_container_worker, is_docker_worker, is_moby_worker, CommandSpec, DriverName,
    Sandbox,
};
use color_eyre::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Classification<'a> {
    name: &'a str,
    driver: &'a str,
    has_feature: bool,
    moby_worker: bool,
    docker_worker: bool,
    docker_container_worker: bool,
}

#[derive(Debug, Serialize)]
struct EnvEntry {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct CommandReport {
    program: String,
    args: Vec<String>,
    dir: Option<String>,
    env: Vec<EnvEntry>,
}

pub(crate) fn emit_classification(sandbox: &dyn Sandbox, json: bool) -> Result<()> {
    let driver = DriverName::parse(sandbox.name());
    let report = Classification {
        name: sandbox.name(),
        driver: driver.kind,
        has_feature: driver.has_feature,
        moby_worker: is_moby_worker(sandbox),
        docker_worker: is_docker_worker(sandbox),
        docker_container_worker: is_docker_container_worker(sandbox),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("driver: {}", report.driver);
        println!("feature suffix: {}", yes_no(report.has_feature));
        println!("moby worker: {}", yes_no(report.moby_worker));
        println!("docker worker: {}", yes_no(report.docker_worker));
        println!(
            "docker-container worker: {}",
            yes_no(report.docker_container_worker)
        );
    }
    Ok(())
}

pub(crate) fn emit_command(spec: &CommandSpec, json: bool) -> Result<()> {
    if json {
        let report = CommandReport {
            program: spec.program().to_string_lossy().into_owned(),
            args: spec
                .args()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            dir: spec.dir().map(|dir| dir.display().to_string()),
            env: spec
                .added_env()
                .iter()
                .map(|(key, value)| EnvEntry {
                    key: key.to_string_lossy().into_owned(),
                    value: value.to_string_lossy().into_owned(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", with_dir_prefix(spec.dir(), &spec.to_string()));
    }
    Ok(())
}

fn with_dir_prefix(dir: Option<&Path>, line: &str) -> String {
    match dir {
        Some(dir) => format!("cd {} && {line}", dir.display()),
        None => line.to_string(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
