use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error};

mod cli;
mod config;
mod domain;
mod error;
mod infrastructure;
mod services;

use cli::Cli;
use infrastructure::ProcessRunner;
use services::ComposeHook;

async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let hook = ComposeHook::create(ProcessRunner, cli.settings(cwd))?;
    debug!("workspaces in {}", hook.temp_root().display());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let processed = hook.run(&cli.update, stdin).await?;
    debug!("{} update(s) processed", processed);

    hook.close();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    // the hook (and its temp root) is dropped inside run() before exiting
    if let Err(e) = run(cli).await {
        error!("compose-hook: {:#}", e);
        std::process::exit(1);
    }
}
