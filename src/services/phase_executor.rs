//! Phase executor - runs the compose phases for one branch config
//!
//! Phases run in order and stop at the first failure; nothing that
//! already ran is undone.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::DeploymentConfig;
use crate::domain::phase;
use crate::domain::{PhaseCommand, RefUpdate};
use crate::error::HookError;
use crate::infrastructure::{CommandRunner, CommandSpec, Workspace};

/// Drives docker-compose inside a workspace
#[derive(Debug, Clone)]
pub struct PhaseExecutor {
    compose_bin: String,
}

impl PhaseExecutor {
    pub fn new(compose_bin: impl Into<String>) -> Self {
        Self {
            compose_bin: compose_bin.into(),
        }
    }

    /// Run every enabled phase of `config` for `update` in `workspace`
    pub async fn execute<R: CommandRunner>(
        &self,
        runner: &R,
        workspace: &Workspace,
        update: &RefUpdate,
        config: &DeploymentConfig,
    ) -> Result<(), HookError> {
        let compose_env = phase::compose_env(config);
        info!(
            "{} {}",
            update.branch_name().unwrap_or(&update.ref_name),
            compose_env
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ")
        );

        for step in phase::plan(config) {
            let cmd = self.command(workspace, &compose_env, &step);
            let start = Instant::now();
            runner.run(&cmd, step.timeout).await?;
            debug!(
                "{} finished in {:.1}s",
                step.phase.name(),
                start.elapsed().as_secs_f64()
            );
        }

        Ok(())
    }

    fn command(
        &self,
        workspace: &Workspace,
        compose_env: &[(String, String)],
        step: &PhaseCommand,
    ) -> CommandSpec {
        CommandSpec::new(self.compose_bin.as_str(), workspace.path.as_path())
            .args(step.args.iter().cloned())
            .envs(compose_env.iter().cloned())
            .envs(step.extra_env.iter().cloned())
    }
}
