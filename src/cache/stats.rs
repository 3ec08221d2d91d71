//! Per-organization lines-of-code cache.
//!
//! One `stats.json` per organization maps repository name to its last known
//! [`CacheRecord`]. Loading never fails: a missing or unreadable file is
//! treated as an empty cache. Writes happen under [`CacheLock`] and merge the
//! current repository's record into whatever is on disk at that moment, so
//! concurrent runs for sibling repositories do not drop each other's updates.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::lock::CacheLock;
use super::paths::CachePaths;
use super::swap::atomic_write;
use crate::outcome::{Outcome, Stage};
use crate::types::{CacheRecord, RepoIdentity};

type Records = BTreeMap<String, CacheRecord>;

/// Errors returned by stats cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The cache file is not a valid repo -> record mapping.
    #[error("invalid cache file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The cache lock could not be taken.
    #[error("cannot lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// In-memory view of one organization's stats file.
#[derive(Debug)]
pub struct StatsCache {
    path: PathBuf,
    lock_path: PathBuf,
    repository: String,
    records: Records,
}

impl StatsCache {
    /// Load the cache for `identity`'s organization.
    ///
    /// Guarantees an entry for `identity.repository` afterwards. When the
    /// file was missing, corrupt, or lacked that entry the healed content is
    /// written back immediately; write and lock failures go to `outcome`.
    pub fn load(paths: &CachePaths, identity: &RepoIdentity, outcome: &mut Outcome) -> Self {
        let path = paths.stats_file(&identity.organization);
        let lock_path = paths.lock_path(&identity.organization);

        let lock = match CacheLock::acquire(&lock_path) {
            Ok(lock) => Some(lock),
            Err(source) => {
                outcome.record(
                    Stage::Cache,
                    CacheError::Lock {
                        path: lock_path.clone(),
                        source,
                    },
                );
                None
            }
        };

        let (mut records, mut dirty) = match read_records(&path) {
            Ok(Some(records)) => (records, false),
            Ok(None) => {
                log::debug!("no stats cache at {}, starting empty", path.display());
                (Records::new(), true)
            }
            Err(e) => {
                log::warn!("{}; starting with an empty cache", e);
                (Records::new(), true)
            }
        };

        if !records.contains_key(&identity.repository) {
            records.insert(identity.repository.clone(), CacheRecord::default());
            dirty = true;
        }

        if dirty {
            if let Err(e) = write_records(&path, &records) {
                outcome.record(Stage::Cache, e);
            }
        }
        drop(lock);

        log::debug!("{}: {:?}", path.display(), records);

        Self {
            path,
            lock_path,
            repository: identity.repository.clone(),
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Repository this cache was loaded for.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn get(&self, repository: &str) -> Option<&CacheRecord> {
        self.records.get(repository)
    }

    /// Record of the repository this cache was loaded for.
    pub fn current(&self) -> CacheRecord {
        self.get(&self.repository).cloned().unwrap_or_default()
    }

    /// Replace the record for `repository`. Returns `false` and changes
    /// nothing when the repository has no entry.
    pub fn update(&mut self, repository: &str, record: CacheRecord) -> bool {
        match self.records.get_mut(repository) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Write the current repository's record to disk.
    ///
    /// Under the lock the file is re-read and only this repository's entry is
    /// replaced; the merged content becomes the new in-memory view.
    pub fn persist(&mut self) -> Result<(), CacheError> {
        let _lock = CacheLock::acquire(&self.lock_path).map_err(|source| CacheError::Lock {
            path: self.lock_path.clone(),
            source,
        })?;

        let mut merged = match read_records(&self.path) {
            Ok(records) => records.unwrap_or_default(),
            Err(e) => {
                log::warn!("{}; overwriting", e);
                Records::new()
            }
        };
        if let Some(record) = self.records.get(&self.repository) {
            merged.insert(self.repository.clone(), record.clone());
        }

        write_records(&self.path, &merged)?;
        self.records = merged;
        Ok(())
    }
}

/// `Ok(None)` when the file does not exist.
fn read_records(path: &Path) -> Result<Option<Records>, CacheError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| CacheError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn write_records(path: &Path, records: &Records) -> Result<(), CacheError> {
    let mut json = serde_json::to_vec_pretty(records)?;
    json.push(b'\n');
    atomic_write(path, &json).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}
