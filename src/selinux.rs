//! Security label assignment.
//!
//! The core only needs "label this path, optionally recursively". The
//! result is never inspected; diagnostics belong to the labeler.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Whether a relabel descends into the directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreconMode {
    /// Label the path itself only.
    Shallow,
    /// Label the path and everything below it.
    Recursive,
}

/// Applies security labels to filesystem paths.
pub trait Labeler {
    /// Relabel `path`. Fire-and-forget.
    fn restorecon(&self, path: &Path, mode: RestoreconMode);
}

/// Labeler that shells out to the `restorecon` tool.
#[derive(Debug, Clone)]
pub struct CommandLabeler {
    program: PathBuf,
}

impl CommandLabeler {
    /// Create a labeler invoking `program` (usually `restorecon`).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Labeler for CommandLabeler {
    fn restorecon(&self, path: &Path, mode: RestoreconMode) {
        let mut command = Command::new(&self.program);
        if mode == RestoreconMode::Recursive {
            command.arg("-R");
        }
        let result = command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match result {
            Ok(status) if status.success() => {}
            Ok(status) => {
                debug!(
                    path = %path.display(),
                    exit_code = ?status.code(),
                    "restorecon returned non-zero"
                );
            }
            Err(e) => {
                warn!(
                    program = %self.program.display(),
                    path = %path.display(),
                    error = %e,
                    "failed to run restorecon"
                );
            }
        }
    }
}

/// Labeler for systems without a security policy. Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLabeler;

impl Labeler for DisabledLabeler {
    fn restorecon(&self, _path: &Path, _mode: RestoreconMode) {}
}
