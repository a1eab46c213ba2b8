//! CLI definitions for compose-hook
//!
//! This module contains all CLI argument parsing structures using clap.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::services::HookSettings;

#[derive(Parser, Debug)]
#[command(
    name = "compose-hook",
    version,
    about = "Deploy pushed branches with docker-compose",
    long_about = "Git pre-receive/post-receive hook.\n\
                  Reads `<old> <new> <ref>` lines from stdin (or one update as arguments), \
                  checks out each pushed branch and runs docker-compose as configured in the \
                  hook config committed with it."
)]
pub struct Cli {
    /// Hook config filename inside the repository
    #[arg(long = "config", env = "COMPOSE_HOOK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,

    /// Repository to check out from (defaults to the current directory)
    #[arg(long)]
    pub git_dir: Option<PathBuf>,

    /// git executable
    #[arg(long, env = "GIT_BIN", default_value = "git")]
    pub git_bin: String,

    /// docker-compose executable
    #[arg(long, env = "DOCKER_COMPOSE_BIN", default_value = "docker-compose")]
    pub compose_bin: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// `<old> <new> <ref>`; read updates from stdin when omitted
    #[arg(value_name = "UPDATE")]
    pub update: Vec<String>,
}

impl Cli {
    /// Hook settings, with `cwd` as the fallback source repository
    pub fn settings(&self, cwd: PathBuf) -> HookSettings {
        let mut settings = HookSettings::new(self.git_dir.clone().unwrap_or(cwd));
        settings.config_file = self.config_file.clone();
        settings.git_bin = self.git_bin.clone();
        settings.compose_bin = self.compose_bin.clone();
        settings
    }
}
