//! Hook service - processes the ref updates of one push
//!
//! For each update: materialize the pushed commit, load the hook config
//! committed with it, and run the phases of every config entry for the
//! updated branch. Updates are handled strictly in order and the first
//! error ends the run.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use super::PhaseExecutor;
use crate::config::{self, DEFAULT_CONFIG_FILE};
use crate::domain::RefUpdate;
use crate::error::{HookError, RefUpdateError, WorkspaceError};
use crate::infrastructure::{CommandRunner, WorkspaceMaterializer};

/// Settings of one hook run
#[derive(Debug, Clone)]
pub struct HookSettings {
    /// Hook config filename looked up at the workspace root
    pub config_file: String,
    /// Repository receiving the push
    pub source_repo: PathBuf,
    pub git_bin: String,
    pub compose_bin: String,
}

impl HookSettings {
    pub fn new(source_repo: impl Into<PathBuf>) -> Self {
        Self {
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            source_repo: source_repo.into(),
            git_bin: "git".to_string(),
            compose_bin: "docker-compose".to_string(),
        }
    }
}

/// One hook run. Owns the temp root holding every workspace; dropping
/// the hook removes them all.
pub struct ComposeHook<R> {
    runner: R,
    config_file: String,
    materializer: WorkspaceMaterializer,
    executor: PhaseExecutor,
    // declared last so workspaces are gone only after everything using them
    temp_root: TempDir,
}

impl<R: CommandRunner> ComposeHook<R> {
    /// Create a hook run with a fresh temp root
    pub fn create(runner: R, settings: HookSettings) -> Result<Self, HookError> {
        let temp_root = tempfile::Builder::new()
            .prefix("compose-hook")
            .tempdir()
            .map_err(WorkspaceError::TempRoot)?;
        Ok(Self::with_temp_root(temp_root, runner, settings))
    }

    pub fn with_temp_root(temp_root: TempDir, runner: R, settings: HookSettings) -> Self {
        let materializer =
            WorkspaceMaterializer::new(temp_root.path(), settings.source_repo, settings.git_bin);
        Self {
            runner,
            config_file: settings.config_file,
            materializer,
            executor: PhaseExecutor::new(settings.compose_bin),
            temp_root,
        }
    }

    pub fn temp_root(&self) -> &Path {
        self.temp_root.path()
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Remove the temp root. Leftovers (e.g. root-owned files from bind
    /// mounts) are logged; they never fail a run whose updates succeeded.
    pub fn close(self) {
        let path = self.temp_root.path().to_path_buf();
        if let Err(e) = self.temp_root.close() {
            warn!("failed to remove workspaces in {}: {}", path.display(), e);
        }
    }

    /// Process the update given on the command line, or read updates from
    /// `stdin` when there is none.
    ///
    /// Anything but zero or three arguments is rejected before a workspace
    /// is created. Returns the number of updates processed.
    pub async fn run<B>(&self, args: &[String], stdin: B) -> Result<usize, HookError>
    where
        B: AsyncBufRead + Unpin,
    {
        let processed = match args.len() {
            0 => self.process_lines(stdin).await?,
            3 => {
                self.process(&RefUpdate::from_args(args)?).await?;
                1
            }
            _ => return Err(RefUpdateError::InvalidArgs.into()),
        };
        Ok(processed)
    }

    /// Deploy a single ref update
    pub async fn process(&self, update: &RefUpdate) -> Result<(), HookError> {
        // ignore non-branch refs (tags) and deleted branches
        let branch = match update.branch_name() {
            Some(branch) if update.is_branch() => branch,
            _ => {
                debug!("{}: not a branch, ignoring", update.ref_name);
                return Ok(());
            }
        };
        if update.is_delete() {
            debug!("{}: branch deleted, ignoring", branch);
            return Ok(());
        }

        let workspace = self
            .materializer
            .materialize(&self.runner, &update.new_hash)
            .await?;
        debug!("{}: {}..{} checked out", branch, update.old_hash, workspace.hash);

        let Some(configs) = config::resolve(&workspace.path, &self.config_file)? else {
            info!("{}: {} not found", branch, self.config_file);
            return Ok(());
        };
        if configs.is_empty() {
            debug!("{}: {} is empty", branch, self.config_file);
        } else {
            debug!("{}: {} branch config(s) in {}", branch, configs.len(), self.config_file);
        }

        for config in configs.for_branch(branch) {
            self.executor
                .execute(&self.runner, &workspace, update, config)
                .await?;
        }

        Ok(())
    }

    /// Deploy newline-separated updates in order, stopping at the first
    /// malformed line or failed update. Returns the number processed.
    pub async fn process_lines<B>(&self, reader: B) -> Result<usize, HookError>
    where
        B: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut processed = 0;

        while let Some(line) = lines.next_line().await.map_err(RefUpdateError::Read)? {
            let update = RefUpdate::parse(&line)?;
            self.process(&update).await?;
            processed += 1;
        }

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ref_update::DELETE_BRANCH_HASH;
    use crate::error::ConfigError;
    use crate::infrastructure::process::testing::RecordingRunner;

    const OLD: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const NEW: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const OTHER: &str = "cccccccccccccccccccccccccccccccccccccccc";

    fn hook(runner: RecordingRunner) -> ComposeHook<RecordingRunner> {
        ComposeHook::create(runner, HookSettings::new("/srv/git/shop.git")).unwrap()
    }

    fn with_config(content: &str) -> RecordingRunner {
        RecordingRunner::new().with_clone_file(DEFAULT_CONFIG_FILE, content)
    }

    #[tokio::test]
    async fn test_end_to_end_main() {
        let hook = hook(with_config("main:\n  project: demo\n"));
        let update = RefUpdate::parse(&format!("{} {} refs/heads/main", OLD, NEW)).unwrap();

        hook.process(&update).await.unwrap();

        let runner = hook.runner();
        assert_eq!(
            runner.subcommands(),
            vec!["clone", "checkout", "submodule", "pull", "build", "up"]
        );
        let calls = runner.invocations();
        let compose: Vec<_> = calls[3..].iter().map(|c| c.args()).collect();
        assert_eq!(compose, vec![vec!["pull"], vec!["build"], vec!["up", "-d"]]);
        for call in &calls[3..] {
            assert_eq!(call.cmd.program, "docker-compose");
            assert_eq!(call.cmd.current_dir, hook.temp_root().join(NEW));
            assert_eq!(call.env("COMPOSE_PROJECT_NAME"), Some("demo"));
        }
    }

    #[tokio::test]
    async fn test_deleted_branch_is_ignored() {
        let hook = hook(with_config("main:\n  project: demo\n"));
        let update = RefUpdate::new(OLD, DELETE_BRANCH_HASH, "refs/heads/main");

        tokio_test::assert_ok!(hook.process(&update).await);
        assert!(hook.runner().invocations().is_empty());
    }

    #[tokio::test]
    async fn test_tags_are_ignored() {
        let hook = hook(with_config("v1.0:\n  project: demo\n"));
        let update = RefUpdate::new(OLD, NEW, "refs/tags/v1.0");

        tokio_test::assert_ok!(hook.process(&update).await);
        assert!(hook.runner().invocations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_only_materializes() {
        let hook = hook(RecordingRunner::new());
        let update = RefUpdate::new(OLD, NEW, "refs/heads/main");

        tokio_test::assert_ok!(hook.process(&update).await);
        assert_eq!(hook.runner().subcommands(), vec!["clone", "checkout", "submodule"]);
    }

    #[tokio::test]
    async fn test_only_matching_branch_deploys() {
        let hook = hook(with_config(
            "staging:\n  project: shop-staging\nfeature/x:\n  project: shop-x\n  skip_build: true\n",
        ));

        hook.process(&RefUpdate::new(OLD, NEW, "refs/heads/main"))
            .await
            .unwrap();
        assert_eq!(hook.runner().invocations().len(), 3);

        hook.process(&RefUpdate::new(OLD, NEW, "refs/heads/feature/x"))
            .await
            .unwrap();
        let calls = hook.runner().invocations();
        // workspace reused, so no second clone
        assert_eq!(
            hook.runner().subcommands(),
            vec!["clone", "checkout", "submodule", "pull", "up"]
        );
        assert_eq!(calls[3].env("COMPOSE_PROJECT_NAME"), Some("shop-x"));
    }

    #[tokio::test]
    async fn test_invalid_config_runs_no_phases() {
        let hook = hook(with_config("main:\n  project: demo\nstaging:\n  file: x.yml\n"));
        let err = hook
            .process(&RefUpdate::new(OLD, NEW, "refs/heads/main"))
            .await
            .unwrap_err();

        match err {
            HookError::Config(ConfigError::MissingProject { branch }) => {
                assert_eq!(branch, "staging")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hook.runner().invocations().len(), 3);
    }

    #[tokio::test]
    async fn test_custom_config_file() {
        let runner = RecordingRunner::new().with_clone_file("deploy.yml", "main:\n  project: demo\n");
        let mut settings = HookSettings::new("/srv/git/shop.git");
        settings.config_file = "deploy.yml".to_string();
        settings.compose_bin = "/usr/local/bin/docker-compose".to_string();
        let hook = ComposeHook::create(runner, settings).unwrap();

        hook.process(&RefUpdate::new(OLD, NEW, "refs/heads/main"))
            .await
            .unwrap();
        let calls = hook.runner().invocations();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[5].cmd.program, "/usr/local/bin/docker-compose");
    }

    #[tokio::test]
    async fn test_process_lines_in_order() {
        let hook = hook(with_config(
            "main:\n  project: shop\nstaging:\n  project: shop-staging\n  skip_pull: true\n",
        ));
        let input = format!(
            "{old} {new} refs/heads/main\n{old} {new} refs/tags/v2\n{old} {new} refs/heads/staging\n",
            old = OLD,
            new = NEW
        );

        let processed = hook.process_lines(input.as_bytes()).await.unwrap();
        assert_eq!(processed, 3);

        let calls = hook.runner().invocations();
        assert_eq!(
            hook.runner().subcommands(),
            vec!["clone", "checkout", "submodule", "pull", "build", "up", "build", "up"]
        );
        assert_eq!(calls[5].env("COMPOSE_PROJECT_NAME"), Some("shop"));
        assert_eq!(calls[7].env("COMPOSE_PROJECT_NAME"), Some("shop-staging"));
    }

    #[tokio::test]
    async fn test_malformed_line_stops_batch() {
        let hook = hook(with_config("main:\n  project: shop\n"));
        let input = format!(
            "{old} {new} refs/heads/main\n{old} {new}\n{old} {other} refs/heads/main\n",
            old = OLD,
            new = NEW,
            other = OTHER
        );

        let err = hook.process_lines(input.as_bytes()).await.unwrap_err();
        assert!(matches!(err, HookError::RefUpdate(RefUpdateError::InvalidLine { fields: 2 })));
        // first update deployed, third never materialized
        assert_eq!(hook.runner().invocations().len(), 6);
        assert!(!hook.temp_root().join(OTHER).exists());
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_updates() {
        let runner = RecordingRunner::failing_on("pull").with_clone_file(
            DEFAULT_CONFIG_FILE,
            "main:\n  project: shop\n",
        );
        let hook = hook(runner);
        let input = format!(
            "{old} {new} refs/heads/main\n{old} {other} refs/heads/main\n",
            old = OLD,
            new = NEW,
            other = OTHER
        );

        let err = hook.process_lines(input.as_bytes()).await.unwrap_err();
        assert!(matches!(err, HookError::Process(_)));
        assert_eq!(
            hook.runner().subcommands(),
            vec!["clone", "checkout", "submodule", "pull"]
        );
    }

    #[tokio::test]
    async fn test_temp_root_removed_on_drop() {
        let hook = hook(with_config("main:\n  project: demo\n"));
        hook.process(&RefUpdate::new(OLD, NEW, "refs/heads/main"))
            .await
            .unwrap();

        let root = hook.temp_root().to_path_buf();
        assert!(root.join(NEW).join(DEFAULT_CONFIG_FILE).exists());
        drop(hook);
        assert!(!root.exists());
    }

    fn args(update: &str) -> Vec<String> {
        update.split(' ').map(String::from).collect()
    }

    #[tokio::test]
    async fn test_run_from_args() {
        let hook = hook(with_config("main:\n  project: demo\n"));

        let update = args(&format!("{} {} refs/heads/main", OLD, NEW));
        let processed = hook.run(&update, tokio::io::empty()).await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(hook.runner().invocations().len(), 6);
    }

    #[tokio::test]
    async fn test_run_from_stdin() {
        let hook = hook(with_config("main:\n  project: demo\n"));
        let input = format!("{} {} refs/heads/main\n{} {} refs/tags/v1\n", OLD, NEW, OLD, NEW);

        let processed = hook.run(&[], input.as_bytes()).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(hook.runner().invocations().len(), 6);
    }

    #[tokio::test]
    async fn test_run_rejects_wrong_arg_count() {
        let hook = hook(with_config("main:\n  project: demo\n"));
        // stdin is not consulted once arguments are given
        let stdin = format!("{} {} refs/heads/main\n", OLD, NEW);

        for update in [vec![NEW.to_string()], args(&format!("{} {}", OLD, NEW))] {
            let err = hook.run(&update, stdin.as_bytes()).await.unwrap_err();
            assert!(matches!(err, HookError::RefUpdate(RefUpdateError::InvalidArgs)));
        }
        assert!(hook.runner().invocations().is_empty());
        assert_eq!(std::fs::read_dir(hook.temp_root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_close_failure_is_not_fatal() {
        let hook = hook(with_config("main:\n  project: demo\n"));
        let update = args(&format!("{} {} refs/heads/main", OLD, NEW));
        tokio_test::assert_ok!(hook.run(&update, tokio::io::empty()).await);

        // a root that can no longer be removed only produces a warning
        let root = hook.temp_root().to_path_buf();
        std::fs::remove_dir_all(&root).unwrap();
        hook.close();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_close_removes_workspaces() {
        let hook = hook(with_config("main:\n  project: demo\n"));
        let update = args(&format!("{} {} refs/heads/main", OLD, NEW));
        hook.run(&update, tokio::io::empty()).await.unwrap();

        let root = hook.temp_root().to_path_buf();
        assert!(root.join(NEW).exists());
        hook.close();
        assert!(!root.exists());
    }
}
