//! Workspace materialization
//!
//! Checks out pushed commits into per-hash directories under the run's
//! temp root. Each hash is cloned at most once per run.

use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::debug;
use walkdir::WalkDir;

use super::process::{CommandRunner, CommandSpec};
use crate::error::{HookError, WorkspaceError};

/// Checkout of one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub path: PathBuf,
    pub hash: String,
}

/// Produces workspaces from the repository receiving the push
#[derive(Debug, Clone)]
pub struct WorkspaceMaterializer {
    /// Directory holding one subdirectory per hash
    root: PathBuf,
    /// Repository to clone from
    source: PathBuf,
    git_bin: String,
}

impl WorkspaceMaterializer {
    pub fn new(root: impl Into<PathBuf>, source: impl Into<PathBuf>, git_bin: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source: source.into(),
            git_bin: git_bin.into(),
        }
    }

    /// Deterministic location of a hash's workspace
    pub fn path_for(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    /// Check out `hash`, reusing an existing checkout from this run.
    ///
    /// A failed materialization leaves its directory behind, and a later
    /// request for the same hash in this run returns it as is.
    pub async fn materialize<R: CommandRunner>(
        &self,
        runner: &R,
        hash: &str,
    ) -> Result<Workspace, HookError> {
        if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(WorkspaceError::InvalidHash {
                hash: hash.to_string(),
            }
            .into());
        }

        let path = self.path_for(hash);
        let workspace = Workspace {
            path: path.clone(),
            hash: hash.to_string(),
        };

        match create_private_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("reusing workspace {}", path.display());
                return Ok(workspace);
            }
            Err(source) => return Err(WorkspaceError::CreateDir { path, source }.into()),
        }

        for cmd in self.checkout_commands(&path, hash) {
            runner.run(&cmd, None).await?;
        }

        // docker build caches on mtime; a fresh clone would bust every layer
        normalize_file_times(&path)?;

        Ok(workspace)
    }

    fn checkout_commands(&self, path: &Path, hash: &str) -> Vec<CommandSpec> {
        let git = |args: &[&str]| {
            CommandSpec::new(self.git_bin.as_str(), path).args(args.iter().copied())
        };
        let source = self.source.to_string_lossy().into_owned();

        // --git-dir=.git overrides the GIT_DIR=. env hooks run with
        vec![
            git(&["clone", "--quiet", source.as_str(), "."]),
            git(&["--git-dir=.git", "checkout", "--quiet", hash]),
            git(&[
                "--git-dir=.git",
                "submodule",
                "--quiet",
                "update",
                "--init",
                "--recursive",
            ]),
        ]
    }
}

fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

/// Reset access and modification times of everything under `root` to the epoch
pub fn normalize_file_times(root: &Path) -> Result<(), WorkspaceError> {
    let epoch = FileTime::zero();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| WorkspaceError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        filetime::set_symlink_file_times(entry.path(), epoch, epoch).map_err(|source| {
            WorkspaceError::Timestamps {
                path: entry.path().to_path_buf(),
                source,
            }
        })?;
    }
    Ok(())
}
