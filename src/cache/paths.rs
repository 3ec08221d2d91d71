//! Filesystem layout for working copies and stats caches
//!
//! ```text
//! <repos_root>/
//! ├── <org>-<repo>/                 # working copy (flat, default)
//! └── <org>/<repo>/                 # working copy (hierarchy mode)
//!
//! <cache_root>/
//! └── <org>/
//!     ├── stats.json                # repo -> cached measurement
//!     └── stats.json.lock           # flock-based locking
//! ```

use std::path::{Path, PathBuf};

use crate::config::{CACHE_FILE_NAME, Config};
use crate::types::RepoIdentity;

/// Resolves every path a run touches.
#[derive(Debug, Clone)]
pub struct CachePaths {
    repos_root: PathBuf,
    cache_root: PathBuf,
    follow_hierarchy: bool,
}

impl CachePaths {
    pub fn new(repos_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            repos_root: repos_root.into(),
            cache_root: cache_root.into(),
            follow_hierarchy: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.repos_root, &config.cache_root)
            .with_hierarchy(config.follow_hierarchy)
    }

    pub fn with_hierarchy(mut self, follow_hierarchy: bool) -> Self {
        self.follow_hierarchy = follow_hierarchy;
        self
    }

    pub fn repos_root(&self) -> &Path {
        &self.repos_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Working copy: `{repos_root}/{org}/{repo}` in hierarchy mode,
    /// `{repos_root}/{org}-{repo}` otherwise.
    pub fn working_copy(&self, identity: &RepoIdentity) -> PathBuf {
        if self.follow_hierarchy {
            self.repos_root
                .join(&identity.organization)
                .join(&identity.repository)
        } else {
            self.repos_root
                .join(format!("{}-{}", identity.organization, identity.repository))
        }
    }

    /// Per-organization cache directory: `{cache_root}/{org}`
    pub fn org_cache_dir(&self, organization: &str) -> PathBuf {
        self.cache_root.join(organization)
    }

    /// `{cache_root}/{org}/stats.json`
    pub fn stats_file(&self, organization: &str) -> PathBuf {
        self.org_cache_dir(organization).join(CACHE_FILE_NAME)
    }

    /// `{cache_root}/{org}/stats.json.lock`
    pub fn lock_path(&self, organization: &str) -> PathBuf {
        self.org_cache_dir(organization)
            .join(format!("{}.lock", CACHE_FILE_NAME))
    }
}
