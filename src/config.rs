//! Configuration loading and validation.
//!
//! Loads `coldboot.toml` with per-section defaults. All sections use
//! `#[serde(default)]` so a minimal or empty file is valid, and a missing
//! file yields the defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::coldboot::ColdbootOptions;
use crate::queue::PreclaimedSet;

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/coldboot.toml";

/// Upper bound on worker processes.
const MAX_HANDLER_SUBPROCESSES: usize = 256;

/// Worker count used when the CPU count cannot be determined.
const FALLBACK_HANDLER_SUBPROCESSES: usize = 4;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColdbootConfig {
    /// Cold boot engine settings.
    pub coldboot: EngineConfig,
    /// Sysfs location.
    pub sysfs: SysfsConfig,
    /// Security relabeling.
    pub restorecon: RestoreconConfig,
    /// Readiness signal location.
    pub readiness: ReadinessConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Cold boot engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Relabel sysfs inside the workers instead of the orchestrator.
    #[serde(default)]
    pub parallel_restorecon: bool,

    /// Number of worker processes.
    #[serde(default = "default_handler_subprocesses")]
    pub handler_subprocesses: usize,

    /// Directories labeled eagerly by the orchestrator, in order.
    /// Empty means the sysfs root and its `devices` directory.
    #[serde(default)]
    pub parallel_restorecon_dirs: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_restorecon: false,
            handler_subprocesses: default_handler_subprocesses(),
            parallel_restorecon_dirs: Vec::new(),
        }
    }
}

/// Sysfs location.
#[derive(Debug, Clone, Deserialize)]
pub struct SysfsConfig {
    /// Sysfs mount point.
    #[serde(default = "default_sysfs_root")]
    pub root: PathBuf,
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            root: default_sysfs_root(),
        }
    }
}

/// Security relabeling.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreconConfig {
    /// Disable to skip labeling entirely (hosts without a policy).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Relabel tool to invoke.
    #[serde(default = "default_restorecon_program")]
    pub program: PathBuf,
}

impl Default for RestoreconConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_restorecon_program(),
        }
    }
}

/// Readiness signal location.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// Directory holding the readiness property file.
    #[serde(default = "default_property_dir")]
    pub property_dir: PathBuf,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            property_dir: default_property_dir(),
        }
    }
}

/// Log output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rotated JSON logs. Stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl ColdbootConfig {
    /// Validate that configuration values are within sane bounds.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_HANDLER_SUBPROCESSES).contains(&self.coldboot.handler_subprocesses),
            "coldboot.handler_subprocesses must be in [1, {MAX_HANDLER_SUBPROCESSES}]"
        );
        anyhow::ensure!(
            self.sysfs.root.is_absolute(),
            "sysfs.root must be an absolute path"
        );
        for dir in &self.coldboot.parallel_restorecon_dirs {
            anyhow::ensure!(
                dir.is_absolute(),
                "coldboot.parallel_restorecon_dirs entry {} must be absolute",
                dir.display()
            );
        }
        Ok(())
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests need not touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("COLDBOOT_PARALLEL_RESTORECON") {
            match v.parse() {
                Ok(b) => self.coldboot.parallel_restorecon = b,
                Err(_) => tracing::warn!(
                    var = "COLDBOOT_PARALLEL_RESTORECON",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("COLDBOOT_HANDLER_SUBPROCESSES") {
            match v.parse() {
                Ok(n) => self.coldboot.handler_subprocesses = n,
                Err(_) => tracing::warn!(
                    var = "COLDBOOT_HANDLER_SUBPROCESSES",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("COLDBOOT_SYSFS_ROOT") {
            self.sysfs.root = PathBuf::from(v);
        }
    }

    /// Value-only options for the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker count is zero.
    pub fn options(&self) -> anyhow::Result<ColdbootOptions> {
        let workers = NonZeroUsize::new(self.coldboot.handler_subprocesses)
            .context("coldboot.handler_subprocesses must be at least 1")?;
        Ok(ColdbootOptions {
            parallel_restorecon: self.coldboot.parallel_restorecon,
            workers,
            parallel_restorecon_dirs: PreclaimedSet::new(
                self.coldboot.parallel_restorecon_dirs.iter().cloned(),
            ),
            sysfs_root: self.sysfs.root.clone(),
        })
    }
}

/// Load configuration from `path`, apply env overrides and validate.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// the result fails validation.
pub fn load_config(path: &Path) -> anyhow::Result<ColdbootConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with a custom env resolver.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ColdbootConfig> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<ColdbootConfig>(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file found, using defaults");
            ColdbootConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read config at {}", path.display()));
        }
    };
    config.apply_overrides(env);
    config.validate()?;
    Ok(config)
}

// Default value functions for serde.

fn default_handler_subprocesses() -> usize {
    handler_subprocesses_for(std::thread::available_parallelism().ok())
}

/// One worker per CPU, capped so the default always validates.
fn handler_subprocesses_for(cpus: Option<NonZeroUsize>) -> usize {
    cpus.map_or(FALLBACK_HANDLER_SUBPROCESSES, NonZeroUsize::get)
        .min(MAX_HANDLER_SUBPROCESSES)
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys")
}

fn default_true() -> bool {
    true
}

fn default_restorecon_program() -> PathBuf {
    PathBuf::from("restorecon")
}

fn default_property_dir() -> PathBuf {
    PathBuf::from("/run/coldboot")
}
