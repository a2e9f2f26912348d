//! Backlog replay from the sysfs tree.
//!
//! Walks `class`, `block` and `devices` below the sysfs root and reports one
//! `add` event for every directory carrying a `uevent` file. Only real
//! directories are descended; sysfs symlinks (bus and class links) are not
//! followed, so each device is reported once.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::uevent::{ListenerAction, Uevent, UeventSource};

/// Top-level sysfs directories replayed, in order.
const REGENERATION_DIRS: [&str; 3] = ["class", "block", "devices"];

/// [`UeventSource`] backed by a sysfs mount.
#[derive(Debug, Clone)]
pub struct SysfsUeventSource {
    root: PathBuf,
}

impl SysfsUeventSource {
    /// Create a source reading the sysfs tree mounted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Depth-first walk from `dir`. Returns `Stop` once the callback asked to stop.
    fn regenerate_dir(
        &self,
        dir: &Path,
        callback: &mut dyn FnMut(Uevent) -> ListenerAction,
    ) -> ListenerAction {
        let mut stack = vec![dir.to_path_buf()];

        while let Some(current) = stack.pop() {
            if let Some(uevent) = self.read_uevent(&current) {
                if callback(uevent) == ListenerAction::Stop {
                    return ListenerAction::Stop;
                }
            }

            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %current.display(), error = %e, "skipping unreadable sysfs dir");
                    continue;
                }
            };

            let mut children: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
                .map(|entry| entry.path())
                .collect();

            // Pop order is reversed, so sort descending to visit children by name.
            children.sort_unstable_by(|a, b| b.cmp(a));
            stack.extend(children);
        }

        ListenerAction::Continue
    }

    /// Parse `dir/uevent` into an event, or `None` if the file is absent or unreadable.
    fn read_uevent(&self, dir: &Path) -> Option<Uevent> {
        let contents = fs::read_to_string(dir.join("uevent")).ok()?;
        let relative = dir.strip_prefix(&self.root).ok()?;
        let devpath = format!("/{}", relative.display());

        let mut uevent = Uevent::from_sysfs(devpath, &contents);
        if uevent.subsystem.is_empty() {
            if let Some(name) = fs::read_link(dir.join("subsystem"))
                .ok()
                .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()))
            {
                uevent.subsystem = name;
            }
        }
        Some(uevent)
    }
}

impl UeventSource for SysfsUeventSource {
    fn regenerate_uevents(&mut self, callback: &mut dyn FnMut(Uevent) -> ListenerAction) {
        for name in REGENERATION_DIRS {
            let dir = self.root.join(name);
            if self.regenerate_dir(&dir, callback) == ListenerAction::Stop {
                return;
            }
        }
    }
}
