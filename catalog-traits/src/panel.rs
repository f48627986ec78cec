//! UI Notification Surface
//!
//! The terminal UI owns rendering and key dispatch; the playback core only
//! pushes the few facts the UI needs to show. Implementations must be cheap
//! and non-blocking since they are called from playback setup paths.

use std::time::Duration;

/// Receives player-side notifications.
pub trait PlayerPanel: Send + Sync {
    /// Called before audio for a newly selected track begins.
    fn set_track(&self, title: &str, duration: Duration);
}

/// A panel that ignores every notification. Useful for tests and headless
/// operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPanel;

impl PlayerPanel for NullPanel {
    fn set_track(&self, _title: &str, _duration: Duration) {}
}
