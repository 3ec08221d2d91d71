//! Working copy synchronizer
//!
//! Brings the local working copy of a remote up to date:
//!
//! - **absent** -> `git clone <remote> <working copy>`
//! - **present** -> `fetch`, `fetch -p`, `remote set-head origin --auto`,
//!   `symbolic-ref` to find the default branch, then `checkout` and
//!   `pull origin <branch>`.
//!
//! Every step is attempted regardless of earlier failures: a stale working
//! copy is still worth measuring. Failures are recorded on the [`Outcome`].

use std::path::{Path, PathBuf};

use super::git::{GitCli, head_commit, pull_reports_up_to_date};
use crate::exec::CommandRunner;
use crate::outcome::{Outcome, Stage};
use crate::types::RepoIdentity;

/// Which path the synchronizer took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Synchronized,
}

/// Result of synchronizing one working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub working_copy: PathBuf,
    pub action: SyncAction,
    /// Default branch read from `refs/remotes/origin/HEAD`, if any.
    pub branch: Option<String>,
    /// The pull succeeded and brought in nothing new.
    pub up_to_date: bool,
}

pub struct RepoSync<'a> {
    git: GitCli<'a>,
}

impl<'a> RepoSync<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            git: GitCli::new(runner),
        }
    }

    /// Clone or refresh `identity.remote` at `working_copy`.
    pub fn sync(
        &self,
        identity: &RepoIdentity,
        working_copy: &Path,
        outcome: &mut Outcome,
    ) -> SyncReport {
        if working_copy.exists() {
            self.synchronize(working_copy, outcome)
        } else {
            self.clone_fresh(identity, working_copy, outcome)
        }
    }

    fn clone_fresh(
        &self,
        identity: &RepoIdentity,
        working_copy: &Path,
        outcome: &mut Outcome,
    ) -> SyncReport {
        log::debug!("cloning {} into {}", identity.remote, working_copy.display());
        if let Err(e) = self.git.clone_repo(&identity.remote, working_copy) {
            outcome.record(Stage::Clone, e);
        }

        SyncReport {
            working_copy: working_copy.to_path_buf(),
            action: SyncAction::Cloned,
            branch: None,
            up_to_date: false,
        }
    }

    fn synchronize(&self, working_copy: &Path, outcome: &mut Outcome) -> SyncReport {
        let mut report = SyncReport {
            working_copy: working_copy.to_path_buf(),
            action: SyncAction::Synchronized,
            branch: None,
            up_to_date: false,
        };

        if let Err(e) = self.git.fetch(working_copy) {
            outcome.record(Stage::Fetch, e);
        }
        if let Err(e) = self.git.fetch_prune(working_copy) {
            outcome.record(Stage::Fetch, e);
        }
        if let Err(e) = self.git.set_remote_head(working_copy) {
            outcome.record(Stage::Branch, e);
        }

        let branch = match self.git.remote_default_branch(working_copy) {
            Ok(branch) => branch,
            Err(e) => {
                outcome.record(Stage::Branch, e);
                None
            }
        };
        log::debug!("default branch of {}: {:?}", working_copy.display(), branch);

        let Some(branch) = branch else {
            return report;
        };

        if let Err(e) = self.git.checkout(working_copy, &branch) {
            outcome.record(Stage::Checkout, e);
        }

        let before = head_commit(working_copy);
        match self.git.pull(working_copy, &branch) {
            Ok(stdout) => {
                report.up_to_date = match (before, head_commit(working_copy)) {
                    (Some(before), Some(after)) => before == after,
                    _ => pull_reports_up_to_date(&stdout),
                };
                log::debug!("pulled {} -> up to date: {}", branch, report.up_to_date);
            }
            Err(e) => outcome.record(Stage::Pull, e),
        }

        report.branch = Some(branch);
        report
    }
}
