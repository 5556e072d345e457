//! Uniform access to a drawing surface for the sync engine.

use crate::document::CanvasDocument;
use crate::surface::{CanvasSurface, DrawingSurface, SurfaceError, SurfaceEvent};

/// Wraps a [`DrawingSurface`] and exposes what the session needs:
/// serialization, loading, and a change feed without selection noise.
pub struct SurfaceAdapter<S: DrawingSurface = CanvasSurface> {
    surface: S,
    view_only: bool,
}

impl<S: DrawingSurface> SurfaceAdapter<S> {
    pub fn new(surface: S, view_only: bool) -> Self {
        Self { surface, view_only }
    }

    pub fn is_view_only(&self) -> bool {
        self.view_only
    }

    pub fn is_ready(&self) -> bool {
        self.surface.is_mounted()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Mount the surface; a view-only surface is locked right away.
    pub fn mount(&mut self) -> Result<(), SurfaceError> {
        self.surface.mount()?;
        if self.view_only {
            self.lock_read_only();
        }
        Ok(())
    }

    /// Current persistable content.
    pub fn serialize(&self) -> CanvasDocument {
        self.surface.to_document()
    }

    /// Replace the surface content with `document`.
    ///
    /// Loading the same document twice leaves the surface in the same state.
    pub fn deserialize(&mut self, document: &CanvasDocument) -> Result<(), SurfaceError> {
        self.surface.load_document(document)?;
        if self.view_only {
            self.lock_read_only();
        }
        Ok(())
    }

    /// Structural changes since the last call, in arrival order.
    pub fn poll_changes(&mut self) -> Vec<SurfaceEvent> {
        self.surface
            .take_events()
            .into_iter()
            .filter(SurfaceEvent::is_structural)
            .collect()
    }

    /// Make every object non-selectable and non-evented and refuse edits.
    pub fn lock_read_only(&mut self) {
        self.view_only = true;
        self.surface.set_interactive(false);
    }

    pub fn dispose(&mut self) {
        self.surface.dispose();
    }
}
