//! One end-to-end run: identity -> sync -> measure -> cleanup.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::{CachePaths, Cleanup, RepoSync, StatsCache, SyncReport, clean};
use crate::config::{Config, ConfigError};
use crate::exec::CommandRunner;
use crate::loc::LocCollector;
use crate::outcome::{Outcome, Stage};
use crate::types::{IdentityError, LocReport, RepoIdentity};

/// Errors that stop a run before anything touches the disk.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug)]
pub struct RunReport {
    pub identity: RepoIdentity,
    pub working_copy: PathBuf,
    pub stats_file: PathBuf,
    pub sync: SyncReport,
    pub loc: LocReport,
    /// `None` when cleanup was skipped or failed.
    pub cleanup: Option<Cleanup>,
    pub outcome: Outcome,
}

/// Mirror `url` locally and measure it.
///
/// Only an unusable URL is fatal. Every later failure lands in
/// [`RunReport::outcome`] and the remaining stages still run.
pub fn run(
    config: &Config,
    runner: &dyn CommandRunner,
    url: &str,
) -> Result<RunReport, RunError> {
    let identity = RepoIdentity::resolve(url, config.follow_hierarchy)?;
    let paths = CachePaths::from_config(config);
    let working_copy = paths.working_copy(&identity);
    let mut outcome = Outcome::new();

    log::debug!("{} -> {}", identity, working_copy.display());

    if let Err(e) = std::fs::create_dir_all(paths.repos_root()) {
        outcome.record(
            Stage::Setup,
            format!("cannot create {}: {}", paths.repos_root().display(), e),
        );
    }
    let org_dir = paths.org_cache_dir(&identity.organization);
    if let Err(e) = std::fs::create_dir_all(&org_dir) {
        outcome.record(
            Stage::Setup,
            format!("cannot create {}: {}", org_dir.display(), e),
        );
    }

    let mut cache = StatsCache::load(&paths, &identity, &mut outcome);

    let sync = RepoSync::new(runner).sync(&identity, &working_copy, &mut outcome);

    let loc = LocCollector::new(runner, config.stats_tool.as_str()).measure(
        &working_copy,
        &mut cache,
        &mut outcome,
    );

    let cleanup = if config.skip_cleanup {
        log::debug!("cleanup skipped for {}", working_copy.display());
        None
    } else {
        match clean(&working_copy, config.force_cleanup) {
            Ok(cleanup) => Some(cleanup),
            Err(e) => {
                log::warn!("cannot remove {}: {}", working_copy.display(), e);
                None
            }
        }
    };

    Ok(RunReport {
        identity,
        working_copy,
        stats_file: cache.path().to_path_buf(),
        sync,
        loc,
        cleanup,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SyncAction;
    use crate::exec::CommandOutput;
    use crate::exec::testing::ScriptedRunner;
    use crate::types::CacheRecord;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::tempdir;

    const CLOC_OUTPUT: &str = "\
github.com/AlDanial/cloc v 1.98  T=0.05 s
-------------------------------------------------------------------------------
Language                     files          blank        comment           code
-------------------------------------------------------------------------------
Go                              10             50             20            500
-------------------------------------------------------------------------------
";

    fn config(root: &Path) -> Config {
        Config::new(root.join("repos"), root.join("cache"))
    }

    fn cached(root: &Path, org: &str) -> BTreeMap<String, CacheRecord> {
        let raw = std::fs::read_to_string(root.join("cache").join(org).join("stats.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn clones_measures_and_caches() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new().respond("cloc", CommandOutput::ok(CLOC_OUTPUT));

        let report = run(
            &config(dir.path()),
            &runner,
            "https://github.com/org1/repo1.git",
        )
        .unwrap();

        assert!(!report.outcome.is_errored());
        assert_eq!(report.working_copy, dir.path().join("repos").join("org1-repo1"));
        assert_eq!(report.sync.action, SyncAction::Cloned);
        assert_eq!(report.loc.line_count, 500);
        assert!(runner.was_called("clone https://github.com/org1/repo1"));

        let records = cached(dir.path(), "org1");
        let record = &records["repo1"];
        assert_eq!(record.line_count, 500);
        assert_eq!(record.language_stats[0].language, "Go");
        assert!(record.timestamp.as_deref().is_some_and(|t| t.ends_with('Z')));
    }

    #[test]
    fn hierarchy_mode_nests_working_copy() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new().respond("cloc", CommandOutput::ok(CLOC_OUTPUT));
        let config = config(dir.path()).with_follow_hierarchy(true);

        let report = run(&config, &runner, "https://github.com/org1/repo1.git").unwrap();

        assert_eq!(
            report.working_copy,
            dir.path().join("repos").join("org1").join("repo1")
        );
    }

    #[test]
    fn existing_small_working_copy_is_synced_then_removed() {
        let dir = tempdir().unwrap();
        let wc = dir.path().join("repos").join("org1-repo1");
        std::fs::create_dir_all(&wc).unwrap();
        std::fs::write(wc.join("main.go"), "package main\n").unwrap();

        let runner = ScriptedRunner::new()
            .respond("symbolic-ref", CommandOutput::ok("origin/main\n"))
            .respond("pull", CommandOutput::ok("Already up to date.\n"))
            .respond("cloc", CommandOutput::ok(CLOC_OUTPUT));

        let report = run(
            &config(dir.path()),
            &runner,
            "https://github.com/org1/repo1.git",
        )
        .unwrap();

        assert_eq!(report.sync.action, SyncAction::Synchronized);
        assert!(report.sync.up_to_date);
        assert!(!runner.was_called("clone"));
        assert!(matches!(report.cleanup, Some(Cleanup::Deleted(_))));
        assert!(!wc.exists());
    }

    #[test]
    fn skip_cleanup_keeps_working_copy() {
        let dir = tempdir().unwrap();
        let wc = dir.path().join("repos").join("org1-repo1");
        std::fs::create_dir_all(&wc).unwrap();

        let runner = ScriptedRunner::new()
            .respond("symbolic-ref", CommandOutput::ok("origin/main\n"))
            .respond("cloc", CommandOutput::ok(CLOC_OUTPUT));
        let config = config(dir.path()).with_skip_cleanup(true);

        let report = run(&config, &runner, "https://github.com/org1/repo1.git").unwrap();

        assert_eq!(report.cleanup, None);
        assert!(wc.exists());
    }

    #[test]
    fn failed_count_falls_back_to_cache_and_errors() {
        let dir = tempdir().unwrap();
        let org_dir = dir.path().join("cache").join("org1");
        std::fs::create_dir_all(&org_dir).unwrap();
        std::fs::write(
            org_dir.join("stats.json"),
            r#"{"repo1": {"loc": 42, "pls": [], "timestamp": "2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        let runner = ScriptedRunner::new().fail_to_spawn("cloc");
        let report = run(
            &config(dir.path()),
            &runner,
            "https://github.com/org1/repo1.git",
        )
        .unwrap();

        assert!(report.outcome.has_failed(Stage::Stats));
        assert_eq!(report.loc.line_count, 42);
        assert_eq!(
            cached(dir.path(), "org1")["repo1"].timestamp.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn non_git_source_host_keys_by_domain() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new().respond("cloc", CommandOutput::ok(CLOC_OUTPUT));

        let report = run(
            &config(dir.path()),
            &runner,
            "https://gerrit.onap.org/r/aai/babel",
        )
        .unwrap();

        assert_eq!(report.identity.organization, "onap");
        assert!(cached(dir.path(), "onap").contains_key(&report.identity.repository));
    }

    #[test]
    fn malformed_url_is_fatal() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new();

        let err = run(&config(dir.path()), &runner, "not a url").unwrap_err();

        assert!(matches!(err, RunError::Identity(IdentityError::Malformed { .. })));
        assert!(runner.calls().is_empty());
        assert!(!dir.path().join("repos").exists());
    }
}
