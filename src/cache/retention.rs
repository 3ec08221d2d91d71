//! Disposal of small working copies.
//!
//! A working copy that measures only bytes or kilobytes, or at most 200 MB,
//! is not worth keeping around; anything larger is kept so the next run can
//! fetch incrementally instead of cloning again.

use std::fmt;
use std::io;
use std::path::Path;

/// Working copies at or below this many megabytes are deleted.
pub const DELETE_THRESHOLD_MB: f64 = 200.0;

const STEP: f64 = 1024.0;

/// Binary unit ladder; anything past zetta is reported in yotta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeUnit {
    Bytes,
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
    Exa,
    Zetta,
    Yotta,
}

impl SizeUnit {
    const LADDER: [SizeUnit; 8] = [
        SizeUnit::Bytes,
        SizeUnit::Kilo,
        SizeUnit::Mega,
        SizeUnit::Giga,
        SizeUnit::Tera,
        SizeUnit::Peta,
        SizeUnit::Exa,
        SizeUnit::Zetta,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            SizeUnit::Bytes => "B",
            SizeUnit::Kilo => "KB",
            SizeUnit::Mega => "MB",
            SizeUnit::Giga => "GB",
            SizeUnit::Tera => "TB",
            SizeUnit::Peta => "PB",
            SizeUnit::Exa => "EB",
            SizeUnit::Zetta => "ZB",
            SizeUnit::Yotta => "YB",
        }
    }
}

/// A byte count scaled to the largest unit keeping the value below 1024.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanSize {
    pub value: f64,
    pub unit: SizeUnit,
}

impl HumanSize {
    pub fn from_bytes(bytes: u64) -> Self {
        Self::scale(bytes as f64)
    }

    fn scale(mut value: f64) -> Self {
        for unit in SizeUnit::LADDER {
            if value < STEP {
                return Self { value, unit };
            }
            value /= STEP;
        }
        Self {
            value,
            unit: SizeUnit::Yotta,
        }
    }

    /// Value as printed, i.e. rounded to two decimals.
    fn displayed_value(&self) -> f64 {
        (self.value * 100.0).round() / 100.0
    }

    /// Whether a working copy of this size is disposable.
    pub fn is_disposable(&self) -> bool {
        match self.unit {
            SizeUnit::Bytes | SizeUnit::Kilo => true,
            SizeUnit::Mega => self.displayed_value() <= DELETE_THRESHOLD_MB,
            _ => false,
        }
    }
}

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit.symbol())
    }
}

/// What [`clean`] did with a working copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cleanup {
    /// Nothing on disk at the working-copy path.
    Missing,
    Deleted(HumanSize),
    Retained(HumanSize),
}

/// Total size of regular files under `path`.
///
/// Symlinks are neither followed nor counted.
pub fn dir_size(path: impl AsRef<Path>) -> u64 {
    let path = path.as_ref();
    let mut total = 0u64;
    if let Ok(meta) = std::fs::symlink_metadata(path) {
        if meta.is_file() {
            return meta.len();
        }
    }
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Ok(meta) = std::fs::symlink_metadata(&path) {
                if meta.is_file() {
                    total = total.saturating_add(meta.len());
                } else if meta.is_dir() {
                    total = total.saturating_add(dir_size(path));
                }
            }
        }
    }
    total
}

/// Delete `working_copy` when it is disposable or `force` is set.
pub fn clean(working_copy: &Path, force: bool) -> io::Result<Cleanup> {
    if std::fs::symlink_metadata(working_copy).is_err() {
        return Ok(Cleanup::Missing);
    }

    let size = HumanSize::from_bytes(dir_size(working_copy));
    if !force && !size.is_disposable() {
        log::debug!("keeping {} ({})", working_copy.display(), size);
        return Ok(Cleanup::Retained(size));
    }

    if std::fs::remove_dir_all(working_copy).is_err() {
        std::fs::remove_file(working_copy)?;
    }
    log::debug!("removed {} ({})", working_copy.display(), size);
    Ok(Cleanup::Deleted(size))
}
