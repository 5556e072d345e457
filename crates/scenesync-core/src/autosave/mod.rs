//! Debounced autosave.
//!
//! The coordinator turns a stream of local edit notifications into at most one
//! write in flight at a time and tracks the save status shown to the user.
//! It never performs I/O; it hands [`WriteRequest`]s to its owner, which
//! forwards them to the remote channel and reports the result back.

mod coordinator;
mod debounce;

pub use coordinator::AutosaveCoordinator;
pub use debounce::DebounceTimer;

use crate::connectivity::ConnectivitySignal;
use crate::document::CanvasDocument;
use crate::remote::WriteTicket;
use crate::time::Duration;

/// Save status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Ready,
    Saving,
    Saved,
    Failed,
    Offline,
}

impl SaveState {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            SaveState::Ready => "Ready",
            SaveState::Saving => "Saving...",
            SaveState::Saved => "Saved",
            SaveState::Failed => "Save Failed",
            SaveState::Offline => "Offline",
        }
    }
}

/// Autosave tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct AutosaveConfig {
    /// Quiescence window before an autosave fires.
    pub debounce: Duration,
    /// How long `Saved` is shown before reverting to `Ready`.
    pub saved_display: Duration,
    /// How long `Failed` is shown before reverting to `Ready`.
    pub failed_display: Duration,
    /// Keep the latest autosave that fired during a write and run it once the
    /// write completes, instead of dropping it.
    pub retry_skipped: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            saved_display: Duration::from_millis(2000),
            failed_display: Duration::from_millis(3000),
            retry_skipped: false,
        }
    }
}

/// Conditions checked before a write is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteGate {
    /// The scene has no remote counterpart.
    pub local_only: bool,
    /// Connectivity is effectively offline.
    pub offline: bool,
}

impl WriteGate {
    /// A gate that lets every write through.
    pub fn open() -> Self {
        Self::default()
    }

    /// Whether a debounced autosave may write.
    pub fn allows_autosave(&self) -> bool {
        !self.local_only && !self.offline
    }

    /// Whether a manual save may write.
    ///
    /// Manual saves go through while unreachable: a successful one is how
    /// reachability is regained.
    pub fn allows_manual(&self) -> bool {
        !self.local_only
    }
}

impl From<&ConnectivitySignal> for WriteGate {
    fn from(signal: &ConnectivitySignal) -> Self {
        Self {
            local_only: signal.local_only,
            offline: signal.is_effectively_offline(),
        }
    }
}

/// What triggered a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOrigin {
    Autosave,
    Manual,
}

/// A write the coordinator wants performed.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub ticket: WriteTicket,
    pub document: CanvasDocument,
    pub origin: SaveOrigin,
}
