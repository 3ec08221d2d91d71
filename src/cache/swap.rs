//! Atomic replacement of cache files.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique temp file names within a process
static SWAP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Replace `path` with `contents` so readers see either the old or the new
/// file, never a truncated one.
///
/// Writes `{path}.tmp.{pid}.{counter}` and renames it over `path`.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    loop {
        let temp_path = temp_sibling(path);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(file) => file,
            // Left over from a crashed run; pick another name.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };

        let written = file
            .write_all(contents)
            .and_then(|()| file.sync_all())
            .and_then(|()| std::fs::rename(&temp_path, path));

        if let Err(e) = written {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        return Ok(());
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let counter = SWAP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp.{}.{}", std::process::id(), counter));
    path.with_file_name(name)
}
