use super::{AutosaveConfig, DebounceTimer, SaveOrigin, SaveState, WriteGate, WriteRequest};
use crate::document::CanvasDocument;
use crate::remote::{WriteResult, WriteTicket};
use crate::time::Instant;

/// Owns the save state and the in-flight flag of one session.
///
/// Local changes arm a debounce timer; `poll` starts a write when it fires.
/// Only one write is in flight at a time: an autosave that fires during a
/// write is dropped (or parked in a single slot with `retry_skipped`), and a
/// manual save issued during a write runs as soon as that write completes.
pub struct AutosaveCoordinator {
    config: AutosaveConfig,
    state: SaveState,
    debounce: DebounceTimer<CanvasDocument>,
    in_flight: Option<(WriteTicket, SaveOrigin)>,
    deferred_manual: Option<CanvasDocument>,
    skipped: Option<CanvasDocument>,
    /// Loads whose change notification has not been seen yet.
    pending_load_echoes: usize,
    revert_at: Option<Instant>,
    last_failure: Option<String>,
    next_ticket: u64,
    writes_started: u64,
    disabled: bool,
}

impl AutosaveCoordinator {
    pub fn new(config: AutosaveConfig) -> Self {
        let debounce = DebounceTimer::new(config.debounce);
        Self {
            config,
            state: SaveState::Ready,
            debounce,
            in_flight: None,
            deferred_manual: None,
            skipped: None,
            pending_load_echoes: 0,
            revert_at: None,
            last_failure: None,
            next_ticket: 1,
            writes_started: 0,
            disabled: false,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    /// Whether a write is in flight.
    pub fn is_writing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether local changes are waiting to be written.
    pub fn has_pending(&self) -> bool {
        self.debounce.is_armed() || self.deferred_manual.is_some() || self.skipped.is_some()
    }

    /// When the pending autosave fires, if one is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Reason of the last failed write.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Number of writes handed out so far.
    pub fn writes_started(&self) -> u64 {
        self.writes_started
    }

    /// Whether `teardown` has run.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// A document was just loaded into the surface; its change notification
    /// must not be saved back.
    ///
    /// Each load swallows exactly one later notification. Snapshots still
    /// waiting to be written predate the load and are dropped.
    pub fn note_document_loaded(&mut self) {
        self.pending_load_echoes += 1;
        let dropped = [
            self.debounce.cancel(),
            self.skipped.take(),
            self.deferred_manual.take(),
        ];
        if dropped.iter().any(Option::is_some) {
            log::debug!("Dropping unsaved snapshot replaced by a document load");
        }
    }

    /// A qualifying local edit happened.
    pub fn on_local_change(&mut self, snapshot: CanvasDocument, now: Instant) {
        if self.disabled {
            return;
        }
        if self.pending_load_echoes > 0 {
            self.pending_load_echoes -= 1;
            log::debug!("Ignoring change notification from document load");
            return;
        }
        self.debounce.arm(snapshot, now);
    }

    /// User-initiated save: cancels the debounced write and writes now.
    pub fn on_manual_save(
        &mut self,
        snapshot: CanvasDocument,
        _now: Instant,
        gate: WriteGate,
    ) -> Option<WriteRequest> {
        if self.disabled {
            return None;
        }
        self.debounce.cancel();
        self.skipped = None;
        self.pending_load_echoes = 0;

        if !gate.allows_manual() {
            log::debug!("Manual save rejected: scene is local only");
            self.set_state(SaveState::Offline, None);
            return None;
        }
        if self.in_flight.is_some() {
            log::debug!("Manual save deferred until the current write completes");
            self.deferred_manual = Some(snapshot);
            return None;
        }
        Some(self.start_write(snapshot, SaveOrigin::Manual))
    }

    /// Advance timers. Returns a write to perform when the debounce fired.
    pub fn poll(&mut self, now: Instant, gate: WriteGate) -> Option<WriteRequest> {
        if self.revert_at.is_some_and(|at| at <= now) {
            self.revert_at = None;
            if matches!(self.state, SaveState::Saved | SaveState::Failed) {
                self.set_state(SaveState::Ready, None);
            }
        }

        if self.disabled {
            return None;
        }

        if self.in_flight.is_none() && gate.allows_autosave() {
            if let Some(document) = self.skipped.take() {
                log::debug!("Writing autosave skipped during the previous write");
                return Some(self.start_write(document, SaveOrigin::Autosave));
            }
        }

        let document = self.debounce.fire_if_due(now)?;

        if !gate.allows_autosave() {
            log::debug!(
                "Autosave suppressed (local_only: {}, offline: {})",
                gate.local_only,
                gate.offline
            );
            self.skipped = None;
            self.set_state(SaveState::Offline, None);
            return None;
        }

        if self.in_flight.is_some() {
            if self.config.retry_skipped {
                log::debug!("Write in flight, keeping latest autosave");
                self.skipped = Some(document);
            } else {
                log::debug!("Write in flight, autosave skipped");
            }
            return None;
        }

        Some(self.start_write(document, SaveOrigin::Autosave))
    }

    /// Report the outcome of a write. Returns a deferred manual save to
    /// perform next, if one was waiting.
    pub fn complete_write(
        &mut self,
        ticket: WriteTicket,
        result: WriteResult,
        now: Instant,
    ) -> Option<WriteRequest> {
        match self.in_flight {
            Some((current, _)) if current == ticket => {}
            _ => {
                log::debug!("Ignoring completion of stale write {:?}", ticket);
                return None;
            }
        }
        self.in_flight = None;

        match result {
            WriteResult::Saved => {
                self.last_failure = None;
                self.set_state(SaveState::Saved, Some(now + self.config.saved_display));
            }
            WriteResult::Unavailable => {
                self.set_state(SaveState::Offline, None);
            }
            WriteResult::Failed(reason) => {
                log::warn!("Save failed: {}", reason);
                self.last_failure = Some(reason);
                self.set_state(SaveState::Failed, Some(now + self.config.failed_display));
            }
        }

        if self.disabled {
            return None;
        }
        let document = self.deferred_manual.take()?;
        Some(self.start_write(document, SaveOrigin::Manual))
    }

    /// Cancel pending work and refuse all further writes.
    pub fn teardown(&mut self) {
        self.debounce.cancel();
        self.deferred_manual = None;
        self.skipped = None;
        self.disabled = true;
    }

    fn start_write(&mut self, document: CanvasDocument, origin: SaveOrigin) -> WriteRequest {
        let ticket = WriteTicket(self.next_ticket);
        self.next_ticket += 1;
        self.writes_started += 1;
        self.in_flight = Some((ticket, origin));
        self.set_state(SaveState::Saving, None);
        WriteRequest {
            ticket,
            document,
            origin,
        }
    }

    fn set_state(&mut self, state: SaveState, revert_at: Option<Instant>) {
        if self.state != state {
            log::debug!("Save state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.revert_at = revert_at;
    }
}

impl Default for AutosaveCoordinator {
    fn default() -> Self {
        Self::new(AutosaveConfig::default())
    }
}
