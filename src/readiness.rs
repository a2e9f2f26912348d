//! Readiness signal observed by the rest of the boot sequence.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

/// Name of the readiness property.
pub const COLD_BOOT_DONE_PROP: &str = "ro.cold_boot_done";

/// A single boolean state flipped to true once cold boot completed.
pub trait ReadinessSignal {
    /// Mark cold boot as done.
    ///
    /// # Errors
    ///
    /// Returns an error if the state could not be published.
    fn set_ready(&self) -> anyhow::Result<()>;
}

/// Publishes readiness as a property file holding `true`.
#[derive(Debug, Clone)]
pub struct PropertyFile {
    path: PathBuf,
}

impl PropertyFile {
    /// Property file named [`COLD_BOOT_DONE_PROP`] inside `property_dir`.
    pub fn new(property_dir: &Path) -> Self {
        Self {
            path: property_dir.join(COLD_BOOT_DONE_PROP),
        }
    }

    /// Full path of the property file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReadinessSignal for PropertyFile {
    /// Writes to a temporary file first, then renames to the final path, so
    /// pollers never see a partial value.
    fn set_ready(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        std::fs::write(&tmp_path, b"true\n")
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename {}", tmp_path.display()))?;

        debug!(path = %self.path.display(), "readiness property set");
        Ok(())
    }
}
