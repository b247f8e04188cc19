//! # repo: external repository working copies
//!
//! Documentation sites built with the MkDocs multirepo plugin pull pages from
//! other repositories. [`RepoResolver`] keeps one working copy per registered
//! repository under a scratch directory, cloning it on first use and pulling
//! it on later runs. Each repository is synced at most once per run; the
//! outcome (path or failure) is memoised.
//!
//! Git itself is behind the [`GitOps`] trait so tests can swap in a mock.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tracing::{debug, error, info, warn};

use crate::error::ScanError;

/// Mapping from repository name (the FileRef prefix) to its clone URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoRegistry {
    repos: BTreeMap<String, String>,
}

impl RepoRegistry {
    /// Register `name`, replacing any earlier URL for it.
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.repos.insert(name.into(), url.into());
    }

    pub fn url(&self, name: &str) -> Option<&str> {
        self.repos.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Entries from `other` win over existing ones.
    pub fn merge(&mut self, other: RepoRegistry) {
        self.repos.extend(other.repos);
    }
}

/// Parse a `NAME=URL` pair as given on the command line.
pub fn parse_repo_arg(arg: &str) -> Result<(String, String), ScanError> {
    match arg.split_once('=') {
        Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
            Ok((name.trim().trim_matches('/').to_string(), url.trim().to_string()))
        }
        _ => Err(ScanError::Config(format!(
            "repository must be given as NAME=URL, got '{arg}'"
        ))),
    }
}

/// Minimal git surface needed to maintain working copies.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait GitOps {
    /// `git clone <url> <dest>`
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), String>;
    /// Fast-forward the working copy at `dest`.
    fn pull(&self, dest: &Path) -> Result<(), String>;
}

/// [`GitOps`] backed by the `git` executable on `PATH`.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    /// Run git with its output captured, so nothing reaches our stdout.
    fn run(&self, mut cmd: Command, what: &str) -> Result<(), String> {
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to launch git {what}: {e}"))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(
            command = what,
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "git finished"
        );
        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "git {what} exited with non-zero code: {}: {}",
                output.status,
                stderr.trim()
            ))
        }
    }
}

impl GitOps for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), String> {
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg(url).arg(dest);
        self.run(cmd, "clone")
    }

    fn pull(&self, dest: &Path) -> Result<(), String> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(dest).arg("pull").arg("--ff-only");
        self.run(cmd, "pull")
    }
}

/// Lazily materialises registered repositories under `scratch_dir/<name>`.
pub struct RepoResolver<G: GitOps> {
    scratch_dir: PathBuf,
    registry: RepoRegistry,
    git: G,
    synced: HashMap<String, Result<PathBuf, ScanError>>,
}

impl<G: GitOps> RepoResolver<G> {
    pub fn new(scratch_dir: impl Into<PathBuf>, registry: RepoRegistry, git: G) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            registry,
            git,
            synced: HashMap::new(),
        }
    }

    /// Deterministic checkout location for `repo`.
    pub fn checkout_path(&self, repo: &str) -> PathBuf {
        self.scratch_dir.join(repo)
    }

    /// Ensure a working copy of `repo` exists and return its path.
    ///
    /// Clone failures are returned (and remembered for the rest of the run).
    /// Pull failures only log a warning: the stale checkout is still used.
    pub fn resolve(&mut self, repo: &str) -> Result<PathBuf, ScanError> {
        if let Some(outcome) = self.synced.get(repo) {
            return outcome.clone();
        }
        let outcome = self.sync(repo);
        self.synced.insert(repo.to_string(), outcome.clone());
        outcome
    }

    fn sync(&self, repo: &str) -> Result<PathBuf, ScanError> {
        let url = self.registry.url(repo).ok_or_else(|| ScanError::RepoSync {
            repo: repo.to_string(),
            message: "repository is not registered".to_string(),
        })?;
        let dest = self.checkout_path(repo);

        if dest.exists() {
            info!(repo, path = %dest.display(), "Updating existing working copy");
            if let Err(message) = self.git.pull(&dest) {
                warn!(
                    repo,
                    path = %dest.display(),
                    error = %message,
                    "Update failed, continuing with stale working copy"
                );
            }
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!(error = ?e, path = %parent.display(), "Failed to create scratch directory");
                return Err(ScanError::RepoSync {
                    repo: repo.to_string(),
                    message: format!("cannot create {}: {e}", parent.display()),
                });
            }
        }

        info!(repo, url, path = %dest.display(), "Cloning repository");
        match self.git.clone_repo(url, &dest) {
            Ok(()) => {
                info!(repo, path = %dest.display(), "Successfully cloned repository");
                Ok(dest)
            }
            Err(message) => {
                error!(repo, url, error = %message, "Clone failed");
                Err(ScanError::RepoSync {
                    repo: repo.to_string(),
                    message,
                })
            }
        }
    }
}
