//! Relabel work queue construction.
//!
//! The [`PreclaimedSet`] holds top-level directories the orchestrator labels
//! itself, non-recursively. Their immediate subdirectories become the
//! [`RestoreconQueue`] handed out to workers for recursive labeling.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Second default preclaimed directory, relative to the sysfs root.
pub const DEVICES_DIR: &str = "devices";

/// Ordered set of directories labeled eagerly by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreclaimedSet {
    dirs: Vec<PathBuf>,
}

impl PreclaimedSet {
    /// Build a set from `dirs`, keeping first-seen order and dropping repeats.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut set = Self::default();
        for dir in dirs {
            let dir = dir.into();
            if !set.contains(&dir) {
                set.dirs.push(dir);
            }
        }
        set
    }

    /// The default set: the sysfs root and its `devices` directory.
    pub fn sysfs_default(sysfs_root: &Path) -> Self {
        Self::new([sysfs_root.to_path_buf(), sysfs_root.join(DEVICES_DIR)])
    }

    /// Membership test.
    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|d| d == dir)
    }

    /// Returns `true` when no directory is preclaimed.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Number of preclaimed directories.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Directories in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }
}

/// Ordered list of directories requiring recursive relabeling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreconQueue {
    dirs: Vec<PathBuf>,
}

impl RestoreconQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every immediate subdirectory of `directory` not in `preclaimed`.
    ///
    /// An unopenable `directory` is logged and skipped; entries that cannot
    /// be stat'ed are skipped silently. Symlinks are followed when deciding
    /// whether an entry is a directory. Entries already queued are appended
    /// again: only `preclaimed` is consulted for exclusion.
    pub fn expand(&mut self, directory: &Path, preclaimed: &PreclaimedSet) {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %directory.display(), error = %e, "opendir failed");
                return;
            }
        };

        // read_dir never yields `.` or `..`.
        for entry in entries {
            let Ok(entry) = entry else {
                continue;
            };
            let full_path = directory.join(entry.file_name());
            let Ok(metadata) = fs::metadata(&full_path) else {
                continue;
            };

            if metadata.is_dir() && !preclaimed.contains(&full_path) {
                self.dirs.push(full_path);
            }
        }
    }

    /// Number of queued directories.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Directory at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Path> {
        self.dirs.get(index).map(PathBuf::as_path)
    }

    /// All queued directories in order.
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.dirs
    }
}
