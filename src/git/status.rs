//! Git status probe
//!
//! Reports branch name and upstream divergence for a project directory with a
//! single shell invocation. Every failure collapses to `None`; the probe never
//! blocks aggregation of other projects.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::workspace::config::ProbeConfig;
use crate::workspace::state::GitStatus;

/// Repository marker looked up in each project directory
pub const REPO_MARKER: &str = ".git";

/// Branch (symbolic ref, else detached abbreviation), then
/// `<local-only> <upstream-only>` counts, or `0 0` without an upstream.
/// `$1` is the git binary.
pub const STATUS_SCRIPT: &str = r#"g="$1";
branch=$("$g" symbolic-ref --short HEAD 2>/dev/null || "$g" rev-parse --abbrev-ref HEAD 2>/dev/null);
counts=$("$g" rev-list --left-right --count HEAD...@{u} 2>/dev/null || echo "0 0");
echo "$branch";
echo "$counts""#;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to spawn status query: {0}")]
    Spawn(String),
    #[error("Status query timed out after {0:?}")]
    Timeout(Duration),
    #[error("Status query exited with {0}")]
    ExitStatus(String),
    #[error("Unparseable status output: {0}")]
    Parse(String),
}

/// Process boundary of the probe
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Whether the git binary can be executed at all
    async fn is_available(&self) -> bool;

    /// Run the status query in `dir`, returning raw stdout
    async fn query_status(&self, dir: &Path) -> Result<String, ProbeError>;
}

/// Runs git through a POSIX shell with a per-call timeout
#[derive(Debug, Clone)]
pub struct ShellGitRunner {
    git_binary: String,
    shell: String,
    timeout: Duration,
}

impl ShellGitRunner {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            git_binary: config.git_binary.clone(),
            shell: config.shell.clone(),
            timeout: config.timeout(),
        }
    }

    async fn run(&self, mut cmd: Command) -> Result<std::process::Output, ProbeError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env("GIT_OPTIONAL_LOCKS", "0")
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ProbeError::Spawn(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

impl Default for ShellGitRunner {
    fn default() -> Self {
        Self::new(&ProbeConfig::default())
    }
}

#[async_trait]
impl GitRunner for ShellGitRunner {
    async fn is_available(&self) -> bool {
        // PATH lookup touches the filesystem synchronously
        let binary = self.git_binary.clone();
        let resolved = match tokio::task::spawn_blocking(move || which::which(binary)).await {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                debug!(git = %self.git_binary, error = %e, "git binary not found");
                return false;
            }
            Err(e) => {
                warn!(git = %self.git_binary, error = %e, "git lookup task failed");
                return false;
            }
        };

        let mut cmd = Command::new(resolved);
        cmd.arg("--version");
        match self.run(cmd).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(git = %self.git_binary, error = %e, "git --version failed");
                false
            }
        }
    }

    async fn query_status(&self, dir: &Path) -> Result<String, ProbeError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(STATUS_SCRIPT)
            .arg("sh")
            .arg(&self.git_binary)
            .current_dir(dir);

        let output = self.run(cmd).await?;
        if !output.status.success() {
            return Err(ProbeError::ExitStatus(output.status.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Status probe with a lazily resolved, probe-owned availability flag
pub struct GitProbe {
    runner: Arc<dyn GitRunner>,
    available: OnceCell<bool>,
}

impl GitProbe {
    pub fn new(runner: Arc<dyn GitRunner>) -> Self {
        Self {
            runner,
            available: OnceCell::new(),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(Arc::new(ShellGitRunner::new(config)))
    }

    /// Availability is resolved on first use and kept for the probe's lifetime
    pub async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let available = self.runner.is_available().await;
                if available {
                    info!("git binary available, status probing enabled");
                } else {
                    warn!("git binary unavailable, project status disabled");
                }
                available
            })
            .await
    }

    /// Branch and divergence for `project_path`, or `None` when the directory
    /// is not a repository, git is unavailable, or the query fails.
    pub async fn probe_status(&self, project_path: &str) -> Option<GitStatus> {
        let dir = Path::new(project_path);
        if !has_repo_marker(dir).await {
            return None;
        }
        if !self.is_available().await {
            return None;
        }

        let result = self
            .runner
            .query_status(dir)
            .await
            .and_then(|stdout| parse_status_output(&stdout));

        match result {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(project = project_path, error = %e, "Status probe failed");
                None
            }
        }
    }
}

async fn has_repo_marker(dir: &Path) -> bool {
    tokio::fs::try_exists(dir.join(REPO_MARKER))
        .await
        .unwrap_or(false)
}

/// Parse `STATUS_SCRIPT` output: branch line, then `<push> <pull>`
pub fn parse_status_output(stdout: &str) -> Result<GitStatus, ProbeError> {
    let mut lines = stdout.trim().lines();

    let branch = lines.next().map(str::trim).unwrap_or_default();
    if branch.is_empty() {
        return Err(ProbeError::Parse("missing branch name".to_string()));
    }

    let counts_line = lines.next().map(str::trim).unwrap_or_default();
    let counts: Vec<&str> = counts_line.split_whitespace().collect();
    if counts.len() != 2 {
        return Err(ProbeError::Parse(format!(
            "expected two counts, got '{}'",
            counts_line
        )));
    }

    let push = counts[0]
        .parse::<u32>()
        .map_err(|e| ProbeError::Parse(format!("local count '{}': {}", counts[0], e)))?;
    let pull = counts[1]
        .parse::<u32>()
        .map_err(|e| ProbeError::Parse(format!("upstream count '{}': {}", counts[1], e)))?;

    Ok(GitStatus {
        branch: branch.to_string(),
        pull,
        push,
    })
}
