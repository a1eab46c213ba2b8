//! Deployment phase domain types
//!
//! Defines the fixed pull → build → up → logs sequence and derives, from a
//! branch's deployment config, exactly which compose invocations it needs.

use std::time::Duration;

use crate::config::DeploymentConfig;

/// Individual steps of a compose deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Pull updated images
    Pull,
    /// (Re)build local images
    Build,
    /// (Re)create and start containers, detached
    Up,
    /// Capture container logs for a bounded time
    Logs,
}

impl Phase {
    /// Execution order
    pub const ALL: [Phase; 4] = [Phase::Pull, Phase::Build, Phase::Up, Phase::Logs];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Build => "build",
            Self::Up => "up",
            Self::Logs => "logs",
        }
    }
}

/// One compose invocation belonging to a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCommand {
    pub phase: Phase,
    /// Arguments passed to the compose binary
    pub args: Vec<String>,
    /// Variables added on top of the compose override variables
    pub extra_env: Vec<(String, String)>,
    /// Bounded run; `None` waits for exit
    pub timeout: Option<Duration>,
}

impl PhaseCommand {
    fn new(phase: Phase, args: &[&str]) -> Self {
        Self {
            phase,
            args: args.iter().map(|a| a.to_string()).collect(),
            extra_env: Vec::new(),
            timeout: None,
        }
    }
}

/// `COMPOSE_FILE` / `COMPOSE_PROJECT_NAME` overrides for a config
pub fn compose_env(config: &DeploymentConfig) -> Vec<(String, String)> {
    let mut env = Vec::new();
    if let Some(file) = config.compose_file.as_deref().filter(|f| !f.is_empty()) {
        env.push(("COMPOSE_FILE".to_string(), file.to_string()));
    }
    if !config.project_name.is_empty() {
        env.push((
            "COMPOSE_PROJECT_NAME".to_string(),
            config.project_name.clone(),
        ));
    }
    env
}

/// Phases to run for a config, in execution order, skipped ones omitted
pub fn plan(config: &DeploymentConfig) -> Vec<PhaseCommand> {
    Phase::ALL
        .iter()
        .filter_map(|phase| match phase {
            Phase::Pull if !config.skip_pull => Some(PhaseCommand::new(Phase::Pull, &["pull"])),
            Phase::Build if !config.skip_build => {
                Some(PhaseCommand::new(Phase::Build, &["build"]))
            }
            Phase::Up if !config.skip_up => {
                let mut cmd = PhaseCommand::new(Phase::Up, &["up", "-d"]);
                if config.smart_recreate {
                    cmd.args.push("--x-smart-recreate".to_string());
                }
                Some(cmd)
            }
            Phase::Logs if !config.tail_log.is_zero() => {
                let mut cmd = PhaseCommand::new(Phase::Logs, &["logs", "--no-color"]);
                // compose is python; without this logs arrive only at exit
                cmd.extra_env
                    .push(("PYTHONUNBUFFERED".to_string(), "1".to_string()));
                cmd.timeout = Some(config.tail_log);
                Some(cmd)
            }
            _ => None,
        })
        .collect()
}
