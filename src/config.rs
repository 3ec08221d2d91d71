//! Run configuration.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Name of the per-organization stats cache file.
pub const CACHE_FILE_NAME: &str = "stats.json";

/// Line counter used when none is configured.
pub const DEFAULT_STATS_TOOL: &str = "cloc";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "cannot determine the home directory; set DA_GIT_REPOS_PATH and DA_GIT_CACHE_PATH"
    )]
    NoHomeDir,
}

/// Immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root under which working copies are cloned.
    pub repos_root: PathBuf,
    /// Root under which per-organization cache directories live.
    pub cache_root: PathBuf,
    /// Nest working copies as `<org>/<repo>` instead of `<org>-<repo>`.
    pub follow_hierarchy: bool,
    pub verbose: bool,
    pub skip_cleanup: bool,
    /// Delete the working copy whatever its size.
    pub force_cleanup: bool,
    pub stats_tool: String,
}

impl Config {
    pub fn new(repos_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            repos_root: repos_root.into(),
            cache_root: cache_root.into(),
            follow_hierarchy: false,
            verbose: false,
            skip_cleanup: false,
            force_cleanup: false,
            stats_tool: DEFAULT_STATS_TOOL.to_string(),
        }
    }

    /// Build a config, filling unset (or empty) roots from the home directory:
    /// `~/.perceval/repositories` and `~/.perceval/cache`.
    pub fn with_home_defaults(
        repos_root: Option<PathBuf>,
        cache_root: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::with_defaults_from(repos_root, cache_root, dirs::home_dir().as_deref())
    }

    fn with_defaults_from(
        repos_root: Option<PathBuf>,
        cache_root: Option<PathBuf>,
        home: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let perceval = || {
            home.map(|h| h.join(".perceval"))
                .ok_or(ConfigError::NoHomeDir)
        };

        let repos_root = match non_empty(repos_root) {
            Some(path) => path,
            None => perceval()?.join("repositories"),
        };
        let cache_root = match non_empty(cache_root) {
            Some(path) => path,
            None => perceval()?.join("cache"),
        };

        Ok(Self::new(repos_root, cache_root))
    }

    pub fn with_follow_hierarchy(mut self, follow_hierarchy: bool) -> Self {
        self.follow_hierarchy = follow_hierarchy;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_skip_cleanup(mut self, skip_cleanup: bool) -> Self {
        self.skip_cleanup = skip_cleanup;
        self
    }

    pub fn with_force_cleanup(mut self, force_cleanup: bool) -> Self {
        self.force_cleanup = force_cleanup;
        self
    }

    pub fn with_stats_tool(mut self, stats_tool: impl Into<String>) -> Self {
        self.stats_tool = stats_tool.into();
        self
    }
}

fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}
