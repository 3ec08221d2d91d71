//! Working copies + stats cache

mod git;
mod lock;
mod paths;
mod repo;
mod retention;
mod stats;
mod swap;

pub use git::{GitCli, GitError};
pub use lock::CacheLock;
pub use paths::CachePaths;
pub use repo::{RepoSync, SyncAction, SyncReport};
pub use retention::{Cleanup, HumanSize, SizeUnit, clean};
pub use stats::{CacheError, StatsCache};
