//! Event-handler plugin contract.

use tracing::debug;

use crate::uevent::Uevent;

/// A plugin invoked for every event a worker owns.
///
/// Handlers run inside forked workers. Their side effects must land in
/// shared OS state (device nodes, symlinks, firmware loads); nothing they
/// keep in memory is seen by the orchestrator.
pub trait UeventHandler {
    /// Handle one event.
    fn handle_uevent(&self, uevent: &Uevent);
}

/// Handler that only logs each event at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl UeventHandler for LoggingHandler {
    fn handle_uevent(&self, uevent: &Uevent) {
        debug!(
            action = %uevent.action,
            path = %uevent.path,
            subsystem = %uevent.subsystem,
            device = ?uevent.device_name,
            "uevent"
        );
    }
}
