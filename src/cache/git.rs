//! Git operations for keeping a working copy current.
//!
//! **CLI (through [`CommandRunner`]) for everything that talks to the remote:**
//! - `clone` - first-time acquisition
//! - `fetch` / `fetch -p` - refresh remote-tracking refs
//! - `remote set-head origin --auto` + `symbolic-ref` - discover the default branch
//! - `checkout` / `pull origin <branch>` - move the working copy forward
//!
//! **libgit2 for local reads:**
//! - `head_commit` - HEAD before/after a pull, to tell whether anything changed

use std::path::Path;

use git2::Repository;
use thiserror::Error;

use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

/// Errors returned by git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// git could not be started at all.
    #[error("cannot run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// git ran and exited unsuccessfully.
    #[error("`{command}` exited with {}: {}", exit_code(.code), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    /// Output parsing or unexpected git data.
    #[error("failed to parse git data: {0}")]
    ParseError(String),
    /// Underlying IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid inputs were provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Validate that a git ref (branch name) does not contain dangerous patterns.
///
/// Rejects:
/// - Empty strings
/// - Strings containing `..` (path traversal)
/// - Strings starting with `-` (could be interpreted as flags)
/// - Strings containing null bytes or control characters
fn validate_git_ref(value: &str, name: &str) -> Result<(), GitError> {
    if value.is_empty() {
        return Err(GitError::InvalidInput(format!("{} cannot be empty", name)));
    }
    if value.contains("..") {
        return Err(GitError::InvalidInput(format!(
            "{} cannot contain '..'",
            name
        )));
    }
    if value.starts_with('-') {
        return Err(GitError::InvalidInput(format!(
            "{} cannot start with '-'",
            name
        )));
    }
    if value.bytes().any(|b| b < 0x20) {
        return Err(GitError::InvalidInput(format!(
            "{} cannot contain null or control characters",
            name
        )));
    }
    Ok(())
}

fn path_str<'p>(path: &'p Path, what: &str) -> Result<&'p str, GitError> {
    path.to_str()
        .ok_or_else(|| GitError::ParseError(format!("{} path is not valid UTF-8", what)))
}

/// Git CLI wrapper with security hardening.
pub struct GitCli<'a> {
    runner: &'a dyn CommandRunner,
    git_path: String,
}

impl<'a> GitCli<'a> {
    /// Create a new GitCli that runs the system git through `runner`.
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            git_path: "git".into(),
        }
    }

    /// Base command with security settings.
    ///
    /// Applies:
    /// - `GIT_LFS_SKIP_SMUDGE=1` - skip LFS file downloads
    /// - `GIT_TERMINAL_PROMPT=0` - disable interactive prompts
    /// - `core.hooksPath=` - disable hooks execution
    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.git_path)
            .env("GIT_LFS_SKIP_SMUDGE", "1")
            .env("GIT_TERMINAL_PROMPT", "0")
            .args(["-c", "core.hooksPath="])
    }

    /// Command operating inside `working_copy` (`git -C <path> ...`).
    fn command_in(&self, working_copy: &Path) -> Result<CommandSpec, GitError> {
        let path = path_str(working_copy, "working copy")?;
        Ok(self.command().arg("-C").arg(path))
    }

    fn exec(&self, spec: CommandSpec) -> Result<CommandOutput, GitError> {
        let output = self.runner.run(&spec).map_err(|source| GitError::Spawn {
            command: spec.to_string(),
            source,
        })?;

        if !output.success {
            return Err(GitError::Failed {
                command: spec.to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }

        Ok(output)
    }

    /// Clone `url` into `dest`.
    ///
    /// A failed clone removes `dest` again if this call created it.
    pub fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        if url.starts_with('-') {
            return Err(GitError::InvalidInput(
                "url cannot start with '-'".to_string(),
            ));
        }

        let dest_existed = dest.exists();

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let dest_str = path_str(dest, "destination")?;
        let spec = self.command().arg("clone").arg(url).arg(dest_str);

        if let Err(e) = self.exec(spec) {
            if !dest_existed {
                let _ = std::fs::remove_dir_all(dest);
            }
            return Err(e);
        }

        Ok(())
    }

    /// `git fetch`
    pub fn fetch(&self, working_copy: &Path) -> Result<(), GitError> {
        self.exec(self.command_in(working_copy)?.arg("fetch"))?;
        Ok(())
    }

    /// `git fetch -p`, dropping remote-tracking refs deleted upstream.
    pub fn fetch_prune(&self, working_copy: &Path) -> Result<(), GitError> {
        self.exec(self.command_in(working_copy)?.args(["fetch", "-p"]))?;
        Ok(())
    }

    /// Point `refs/remotes/origin/HEAD` at the remote's current default branch.
    pub fn set_remote_head(&self, working_copy: &Path) -> Result<(), GitError> {
        self.exec(
            self.command_in(working_copy)?
                .args(["remote", "set-head", "origin", "--auto"]),
        )?;
        Ok(())
    }

    /// Read the default branch from `refs/remotes/origin/HEAD`.
    ///
    /// Returns `Ok(None)` when git prints nothing.
    pub fn remote_default_branch(&self, working_copy: &Path) -> Result<Option<String>, GitError> {
        let output = self.exec(
            self.command_in(working_copy)?
                .args(["symbolic-ref", "--short", "refs/remotes/origin/HEAD"]),
        )?;

        let branch = output.stdout.replacen("origin/", "", 1).trim().to_string();
        if branch.is_empty() {
            return Ok(None);
        }
        validate_git_ref(&branch, "branch")?;
        Ok(Some(branch))
    }

    /// `git checkout <branch>`
    pub fn checkout(&self, working_copy: &Path, branch: &str) -> Result<(), GitError> {
        validate_git_ref(branch, "branch")?;
        self.exec(self.command_in(working_copy)?.arg("checkout").arg(branch))?;
        Ok(())
    }

    /// `git pull origin <branch>`, returning git's stdout.
    pub fn pull(&self, working_copy: &Path, branch: &str) -> Result<String, GitError> {
        validate_git_ref(branch, "branch")?;
        let output = self.exec(
            self.command_in(working_copy)?
                .args(["pull", "origin"])
                .arg(branch),
        )?;
        Ok(output.stdout)
    }
}

/// HEAD commit of the repository at `path`, if it can be read.
pub fn head_commit(path: &Path) -> Option<String> {
    let repo = Repository::open(path).ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

/// Whether `git pull` output says nothing was merged.
///
/// Matches git's whole status line (both spellings git has used), with the
/// locale forced to `C` by the runner.
pub fn pull_reports_up_to_date(stdout: &str) -> bool {
    stdout
        .lines()
        .map(str::trim)
        .any(|line| line == "Already up to date." || line == "Already up-to-date.")
}
