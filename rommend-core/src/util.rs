//! Small filesystem and formatting helpers shared across the crates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Create a directory and any missing ancestors.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Create the parent directory of `path`, if it has one.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Produce a path that does not exist yet, by appending a numeric suffix
/// to `base`. Used for sidecar staging files next to an archive.
pub fn unique_path(base: &Path) -> io::Result<PathBuf> {
    let stem = base.as_os_str().to_os_string();
    for n in 0u32..100_000 {
        let mut candidate = stem.clone();
        candidate.push(format!(".{:05}", n));
        let candidate = PathBuf::from(candidate);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free temporary name for {}", base.display()),
    ))
}

/// Fold directory separators in `name` so it can be used as a flat
/// sidecar file name.
pub fn flatten_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Remove `dir` and then every ancestor that is left empty, walking
/// upward until a non-empty directory or a removal error stops the climb.
pub fn remove_dir_and_empty_parents(dir: &Path) -> io::Result<()> {
    fs::remove_dir(dir)?;
    let mut current = dir.parent();
    while let Some(parent) = current {
        if fs::remove_dir(parent).is_err() {
            break;
        }
        current = parent.parent();
    }
    Ok(())
}

/// Format a byte count for reports.
pub fn format_bytes(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Case-insensitive ordering used for the sorted name lists in the
/// reference database.
pub fn name_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let folded = a
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.chars().map(|c| c.to_ascii_lowercase()));
    folded.then_with(|| a.cmp(b))
}

#[cfg(test)]
#[path = "tests/util_tests.rs"]
mod tests;
