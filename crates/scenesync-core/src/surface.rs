//! Drawing surface: the editable object graph behind the canvas.
//!
//! [`DrawingSurface`] is what the sync engine needs from a surface.
//! [`CanvasSurface`] is an in-memory implementation with the editor's
//! toolbar operations; it keeps shapes, selection and per-object
//! interaction flags but renders nothing.

use crate::document::{CanvasDocument, DEFAULT_BACKGROUND};
use crate::shapes::{
    Circle, Freehand, Rectangle, Shape, ShapeStyle, Text, is_valid_color,
};
use kurbo::{Point, Vec2};
use thiserror::Error;

/// Session-local object identifier. Never persisted.
pub type ObjectId = u64;

/// Margin subtracted from the host size.
const HOST_MARGIN: f64 = 40.0;
/// Smallest surface width.
pub const MIN_WIDTH: f64 = 600.0;
/// Smallest surface height.
pub const MIN_HEIGHT: f64 = 400.0;
/// Hit-test tolerance in pixels.
const HIT_TOLERANCE: f64 = 4.0;
/// Largest stroke width the properties panel allows.
pub const MAX_STROKE_WIDTH: f64 = 20.0;

/// Toolbar presets.
pub mod presets {
    pub const RECT_WIDTH: f64 = 100.0;
    pub const RECT_HEIGHT: f64 = 80.0;
    pub const RECT_FILL: &str = "#ff6b6b";
    pub const RECT_STROKE: &str = "#d63031";
    pub const CIRCLE_RADIUS: f64 = 50.0;
    pub const CIRCLE_FILL: &str = "#4ecdc4";
    pub const CIRCLE_STROKE: &str = "#00b894";
    pub const SHAPE_STROKE_WIDTH: f64 = 2.0;
    pub const TEXT_PLACEHOLDER: &str = "Double click to edit";
    pub const TEXT_FILL: &str = "#2d3436";
    pub const BRUSH_WIDTH: f64 = 3.0;
    pub const BRUSH_COLOR: &str = "#2d3436";
}

/// Surface errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurfaceError {
    #[error("Canvas host element not found")]
    HostMissing,
    #[error("Mount failed: {0}")]
    MountFailed(String),
    #[error("Surface is not mounted")]
    NotMounted,
    #[error("Surface is read-only")]
    ReadOnly,
    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),
    #[error("Invalid property: {0}")]
    InvalidProperty(String),
}

/// Size of the element the surface is mounted into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostBounds {
    pub width: f64,
    pub height: f64,
}

impl HostBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Surface size for this host: the host minus a margin, never below
    /// the minimum editing area.
    pub fn surface_size(&self) -> (f64, f64) {
        (
            (self.width - HOST_MARGIN).max(MIN_WIDTH),
            (self.height - HOST_MARGIN).max(MIN_HEIGHT),
        )
    }
}

/// Change notifications emitted by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    ObjectAdded(ObjectId),
    ObjectRemoved(ObjectId),
    ObjectModified(ObjectId),
    TextEdited(ObjectId),
    PathCreated(ObjectId),
    Cleared,
    DocumentLoaded,
    BackgroundChanged,
    SelectionCreated(ObjectId),
    SelectionCleared,
}

impl SurfaceEvent {
    /// Whether the event changes persisted content.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            SurfaceEvent::SelectionCreated(_) | SurfaceEvent::SelectionCleared
        )
    }
}

/// What the sync engine needs from a drawing surface.
pub trait DrawingSurface {
    /// Attach to the host and become ready for editing.
    fn mount(&mut self) -> Result<(), SurfaceError>;

    fn is_mounted(&self) -> bool;

    /// Persistable content of the surface.
    fn to_document(&self) -> CanvasDocument;

    /// Replace the whole surface content. Emits a single
    /// [`SurfaceEvent::DocumentLoaded`].
    fn load_document(&mut self, document: &CanvasDocument) -> Result<(), SurfaceError>;

    /// Allow or forbid selection and editing of every object.
    fn set_interactive(&mut self, interactive: bool);

    /// Drain change notifications.
    fn take_events(&mut self) -> Vec<SurfaceEvent>;

    /// Release the surface. It can be mounted again.
    fn dispose(&mut self);
}

/// A shape on the surface with its session-local state.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceObject {
    pub id: ObjectId,
    pub shape: Shape,
    pub selectable: bool,
    pub evented: bool,
}

/// Partial style change from the properties panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleUpdate {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub font_size: Option<f64>,
}

impl StyleUpdate {
    pub fn fill(color: impl Into<String>) -> Self {
        Self {
            fill: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn stroke(color: impl Into<String>) -> Self {
        Self {
            stroke: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn stroke_width(width: f64) -> Self {
        Self {
            stroke_width: Some(width),
            ..Self::default()
        }
    }

    pub fn opacity(opacity: f64) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    pub fn font_size(size: f64) -> Self {
        Self {
            font_size: Some(size),
            ..Self::default()
        }
    }
}

/// In-memory drawing surface.
pub struct CanvasSurface {
    host: Option<HostBounds>,
    injected_mount_error: Option<String>,
    mounted: bool,
    background: String,
    width: f64,
    height: f64,
    objects: Vec<SurfaceObject>,
    selection: Option<ObjectId>,
    interactive: bool,
    drawing_mode: bool,
    brush: Option<Freehand>,
    next_id: ObjectId,
    events: Vec<SurfaceEvent>,
}

impl Default for CanvasSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasSurface {
    /// A surface with no host yet; mounting fails until one is attached.
    pub fn new() -> Self {
        let empty = CanvasDocument::new();
        Self {
            host: None,
            injected_mount_error: None,
            mounted: false,
            background: empty.background,
            width: empty.width,
            height: empty.height,
            objects: Vec::new(),
            selection: None,
            interactive: true,
            drawing_mode: false,
            brush: None,
            next_id: 1,
            events: Vec::new(),
        }
    }

    /// A surface whose host element already exists.
    pub fn with_host(width: f64, height: f64) -> Self {
        let mut surface = Self::new();
        surface.host = Some(HostBounds::new(width, height));
        surface
    }

    /// Attach or detach the host element.
    pub fn set_host(&mut self, host: Option<HostBounds>) {
        self.host = host;
    }

    /// Make the next mount attempt fail with `message`.
    pub fn fail_next_mount(&mut self, message: impl Into<String>) {
        self.injected_mount_error = Some(message.into());
    }

    pub fn background(&self) -> &str {
        &self.background
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn objects(&self) -> &[SurfaceObject] {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&SurfaceObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The selected object.
    pub fn selected(&self) -> Option<&SurfaceObject> {
        self.selection.and_then(|id| self.object(id))
    }

    pub fn is_drawing_mode(&self) -> bool {
        self.drawing_mode
    }

    /// Add a shape on top of the others and select it.
    pub fn add_shape(&mut self, shape: Shape) -> Result<ObjectId, SurfaceError> {
        self.check_editable()?;
        let id = self.insert(shape);
        self.events.push(SurfaceEvent::ObjectAdded(id));
        self.select(id)?;
        Ok(id)
    }

    /// Add the toolbar rectangle at a position.
    pub fn add_rectangle(&mut self, left: f64, top: f64) -> Result<ObjectId, SurfaceError> {
        let rect = Rectangle::new(left, top, presets::RECT_WIDTH, presets::RECT_HEIGHT).with_style(
            ShapeStyle::filled(presets::RECT_FILL, presets::RECT_STROKE, presets::SHAPE_STROKE_WIDTH),
        );
        self.add_shape(Shape::Rectangle(rect))
    }

    /// Add the toolbar circle at a position.
    pub fn add_circle(&mut self, left: f64, top: f64) -> Result<ObjectId, SurfaceError> {
        let circle = Circle::new(left, top, presets::CIRCLE_RADIUS).with_style(ShapeStyle::filled(
            presets::CIRCLE_FILL,
            presets::CIRCLE_STROKE,
            presets::SHAPE_STROKE_WIDTH,
        ));
        self.add_shape(Shape::Circle(circle))
    }

    /// Add the toolbar text box at a position.
    pub fn add_text(&mut self, left: f64, top: f64) -> Result<ObjectId, SurfaceError> {
        let text = Text::new(left, top, presets::TEXT_PLACEHOLDER).with_style(ShapeStyle {
            fill: Some(presets::TEXT_FILL.to_string()),
            stroke: None,
            ..ShapeStyle::default()
        });
        self.add_shape(Shape::Text(text))
    }

    /// Toggle free drawing. Leaving drawing mode drops an unfinished stroke.
    pub fn set_drawing_mode(&mut self, enabled: bool) -> Result<(), SurfaceError> {
        if enabled {
            self.check_editable()?;
        }
        self.drawing_mode = enabled;
        if !enabled {
            self.brush = None;
        }
        Ok(())
    }

    /// Start a brush stroke.
    pub fn begin_stroke(&mut self, point: Point) -> Result<(), SurfaceError> {
        self.check_editable()?;
        if !self.drawing_mode {
            return Err(SurfaceError::InvalidProperty("not in drawing mode".to_string()));
        }
        let mut path = Freehand::new(ShapeStyle::stroked(presets::BRUSH_COLOR, presets::BRUSH_WIDTH));
        path.add_point(point);
        self.brush = Some(path);
        Ok(())
    }

    /// Extend the current brush stroke.
    pub fn extend_stroke(&mut self, point: Point) {
        if let Some(path) = self.brush.as_mut() {
            path.add_point(point);
        }
    }

    /// Finish the brush stroke. Strokes with fewer than two points are
    /// discarded.
    pub fn finish_stroke(&mut self) -> Result<Option<ObjectId>, SurfaceError> {
        self.check_editable()?;
        let Some(mut path) = self.brush.take() else {
            return Ok(None);
        };
        if path.len() < 2 {
            return Ok(None);
        }
        path.simplify(0.5);
        let id = self.insert(Shape::Freehand(path));
        self.events.push(SurfaceEvent::PathCreated(id));
        Ok(Some(id))
    }

    /// Remove an object.
    pub fn remove(&mut self, id: ObjectId) -> Result<(), SurfaceError> {
        self.check_editable()?;
        let index = self.index_of(id)?;
        self.objects.remove(index);
        self.events.push(SurfaceEvent::ObjectRemoved(id));
        if self.selection == Some(id) {
            self.selection = None;
            self.events.push(SurfaceEvent::SelectionCleared);
        }
        Ok(())
    }

    /// Remove the selected object, if any.
    pub fn remove_selected(&mut self) -> Result<bool, SurfaceError> {
        match self.selection {
            Some(id) => self.remove(id).map(|_| true),
            None => Ok(false),
        }
    }

    /// Remove everything and reset the background.
    pub fn clear(&mut self) -> Result<(), SurfaceError> {
        self.check_editable()?;
        self.objects.clear();
        self.selection = None;
        self.background = DEFAULT_BACKGROUND.to_string();
        self.events.push(SurfaceEvent::Cleared);
        Ok(())
    }

    /// Apply a properties-panel change.
    pub fn update_style(&mut self, id: ObjectId, update: StyleUpdate) -> Result<(), SurfaceError> {
        self.check_editable()?;
        let index = self.index_of(id)?;
        let shape = &mut self.objects[index].shape;

        if let Some(fill) = &update.fill {
            if !shape.supports_fill() {
                return Err(SurfaceError::InvalidProperty(format!(
                    "{} has no fill",
                    shape.kind()
                )));
            }
            if !is_valid_color(fill) {
                return Err(SurfaceError::InvalidProperty(format!("color {}", fill)));
            }
        }
        if let Some(stroke) = &update.stroke {
            if !is_valid_color(stroke) {
                return Err(SurfaceError::InvalidProperty(format!("color {}", stroke)));
            }
        }
        if update.font_size.is_some() && shape.as_text_mut().is_none() {
            return Err(SurfaceError::InvalidProperty(format!(
                "{} has no font size",
                shape.kind()
            )));
        }

        let style = shape.style_mut();
        if let Some(fill) = update.fill {
            style.fill = Some(fill);
        }
        if let Some(stroke) = update.stroke {
            style.stroke = Some(stroke);
        }
        if let Some(width) = update.stroke_width {
            style.stroke_width = width.clamp(0.0, MAX_STROKE_WIDTH);
        }
        if let Some(opacity) = update.opacity {
            style.opacity = opacity.clamp(0.0, 1.0);
        }
        if let (Some(size), Some(text)) = (update.font_size, shape.as_text_mut()) {
            text.font_size = size.clamp(Text::MIN_FONT_SIZE, Text::MAX_FONT_SIZE);
        }

        self.events.push(SurfaceEvent::ObjectModified(id));
        Ok(())
    }

    /// Move an object by an offset.
    pub fn move_by(&mut self, id: ObjectId, dx: f64, dy: f64) -> Result<(), SurfaceError> {
        self.check_editable()?;
        let index = self.index_of(id)?;
        self.objects[index].shape.translate(Vec2::new(dx, dy));
        self.events.push(SurfaceEvent::ObjectModified(id));
        Ok(())
    }

    /// Replace the content of a text object.
    pub fn edit_text(&mut self, id: ObjectId, content: &str) -> Result<(), SurfaceError> {
        self.check_editable()?;
        let index = self.index_of(id)?;
        let Some(text) = self.objects[index].shape.as_text_mut() else {
            return Err(SurfaceError::InvalidProperty("not a text object".to_string()));
        };
        text.text = content.to_string();
        self.events.push(SurfaceEvent::TextEdited(id));
        Ok(())
    }

    /// Change the canvas background.
    pub fn set_background(&mut self, color: &str) -> Result<(), SurfaceError> {
        self.check_editable()?;
        if !is_valid_color(color) {
            return Err(SurfaceError::InvalidProperty(format!("color {}", color)));
        }
        self.background = color.to_string();
        self.events.push(SurfaceEvent::BackgroundChanged);
        Ok(())
    }

    /// Select an object.
    pub fn select(&mut self, id: ObjectId) -> Result<(), SurfaceError> {
        self.check_editable()?;
        let index = self.index_of(id)?;
        if !self.objects[index].selectable {
            return Err(SurfaceError::ReadOnly);
        }
        if self.selection != Some(id) {
            self.selection = Some(id);
            self.events.push(SurfaceEvent::SelectionCreated(id));
        }
        Ok(())
    }

    /// Select the topmost selectable object under `point`.
    pub fn select_at(&mut self, point: Point) -> Result<Option<ObjectId>, SurfaceError> {
        self.check_editable()?;
        let hit = self
            .objects
            .iter()
            .rev()
            .find(|o| o.selectable && o.evented && o.shape.hit_test(point, HIT_TOLERANCE))
            .map(|o| o.id);
        match hit {
            Some(id) => {
                self.select(id)?;
                Ok(Some(id))
            }
            None => {
                self.clear_selection();
                Ok(None)
            }
        }
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.events.push(SurfaceEvent::SelectionCleared);
        }
    }

    fn insert(&mut self, shape: Shape) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.push(SurfaceObject {
            id,
            shape,
            selectable: self.interactive,
            evented: self.interactive,
        });
        id
    }

    fn index_of(&self, id: ObjectId) -> Result<usize, SurfaceError> {
        self.objects
            .iter()
            .position(|o| o.id == id)
            .ok_or(SurfaceError::UnknownObject(id))
    }

    fn check_editable(&self) -> Result<(), SurfaceError> {
        if !self.mounted {
            return Err(SurfaceError::NotMounted);
        }
        if !self.interactive {
            return Err(SurfaceError::ReadOnly);
        }
        Ok(())
    }
}

impl DrawingSurface for CanvasSurface {
    fn mount(&mut self) -> Result<(), SurfaceError> {
        if let Some(message) = self.injected_mount_error.take() {
            return Err(SurfaceError::MountFailed(message));
        }
        let host = self.host.ok_or(SurfaceError::HostMissing)?;
        let (width, height) = host.surface_size();
        log::debug!("Creating canvas: {}x{}", width, height);
        self.width = width;
        self.height = height;
        self.background = DEFAULT_BACKGROUND.to_string();
        self.mounted = true;
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn to_document(&self) -> CanvasDocument {
        CanvasDocument {
            background: self.background.clone(),
            width: self.width,
            height: self.height,
            objects: self.objects.iter().map(|o| o.shape.clone()).collect(),
        }
    }

    fn load_document(&mut self, document: &CanvasDocument) -> Result<(), SurfaceError> {
        if !self.mounted {
            return Err(SurfaceError::NotMounted);
        }
        self.objects.clear();
        self.selection = None;
        self.brush = None;
        self.background = document.background.clone();
        self.width = document.width;
        self.height = document.height;
        for shape in &document.objects {
            self.insert(shape.clone());
        }
        self.events.push(SurfaceEvent::DocumentLoaded);
        Ok(())
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
        for object in &mut self.objects {
            object.selectable = interactive;
            object.evented = interactive;
        }
        if !interactive {
            self.drawing_mode = false;
            self.brush = None;
            self.clear_selection();
        }
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn dispose(&mut self) {
        self.mounted = false;
        self.objects.clear();
        self.selection = None;
        self.brush = None;
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted() -> CanvasSurface {
        let mut surface = CanvasSurface::with_host(1200.0, 900.0);
        surface.mount().unwrap();
        surface
    }

    #[test]
    fn test_mount_requires_host() {
        let mut surface = CanvasSurface::new();
        assert_eq!(surface.mount(), Err(SurfaceError::HostMissing));
        surface.set_host(Some(HostBounds::new(300.0, 200.0)));
        surface.mount().unwrap();
        assert_eq!(surface.size(), (600.0, 400.0));
    }

    #[test]
    fn test_host_size_minus_margin() {
        assert_eq!(HostBounds::new(1200.0, 900.0).surface_size(), (1160.0, 860.0));
        assert_eq!(HostBounds::new(640.0, 300.0).surface_size(), (600.0, 400.0));
    }

    #[test]
    fn test_injected_mount_error() {
        let mut surface = CanvasSurface::with_host(800.0, 600.0);
        surface.fail_next_mount("no context");
        assert_eq!(surface.mount(), Err(SurfaceError::MountFailed("no context".into())));
        assert!(surface.mount().is_ok());
    }

    #[test]
    fn test_mutations_require_mount() {
        let mut surface = CanvasSurface::with_host(800.0, 600.0);
        assert_eq!(surface.add_rectangle(0.0, 0.0), Err(SurfaceError::NotMounted));
    }

    #[test]
    fn test_toolbar_presets() {
        let mut surface = mounted();
        surface.add_rectangle(50.0, 50.0).unwrap();
        surface.add_circle(100.0, 100.0).unwrap();
        surface.add_text(150.0, 150.0).unwrap();

        let doc = surface.to_document();
        match &doc.objects[0] {
            Shape::Rectangle(r) => {
                assert_eq!((r.width, r.height), (100.0, 80.0));
                assert_eq!(r.style.fill.as_deref(), Some("#ff6b6b"));
                assert_eq!(r.style.stroke.as_deref(), Some("#d63031"));
                assert_eq!(r.style.stroke_width, 2.0);
            }
            other => panic!("expected rect, got {:?}", other),
        }
        match &doc.objects[1] {
            Shape::Circle(c) => {
                assert_eq!(c.radius, 50.0);
                assert_eq!(c.style.fill.as_deref(), Some("#4ecdc4"));
            }
            other => panic!("expected circle, got {:?}", other),
        }
        match &doc.objects[2] {
            Shape::Text(t) => {
                assert_eq!(t.text, "Double click to edit");
                assert_eq!(t.font_size, 20.0);
                assert_eq!(t.font_family, "Arial");
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_add_emits_added_then_selection() {
        let mut surface = mounted();
        let id = surface.add_rectangle(0.0, 0.0).unwrap();
        assert_eq!(
            surface.take_events(),
            vec![SurfaceEvent::ObjectAdded(id), SurfaceEvent::SelectionCreated(id)]
        );
        assert_eq!(surface.selected().map(|o| o.id), Some(id));
    }

    #[test]
    fn test_select_at_prefers_topmost() {
        let mut surface = mounted();
        let below = surface.add_rectangle(0.0, 0.0).unwrap();
        let above = surface.add_rectangle(50.0, 40.0).unwrap();
        surface.clear_selection();

        assert_eq!(surface.select_at(Point::new(60.0, 50.0)).unwrap(), Some(above));
        assert_eq!(surface.select_at(Point::new(10.0, 10.0)).unwrap(), Some(below));
        assert_eq!(surface.select_at(Point::new(500.0, 500.0)).unwrap(), None);
        assert!(surface.selected().is_none());
    }

    #[test]
    fn test_brush_stroke() {
        let mut surface = mounted();
        surface.set_drawing_mode(true).unwrap();
        surface.begin_stroke(Point::new(0.0, 0.0)).unwrap();
        assert_eq!(surface.finish_stroke().unwrap(), None);

        surface.begin_stroke(Point::new(0.0, 0.0)).unwrap();
        surface.extend_stroke(Point::new(10.0, 5.0));
        surface.extend_stroke(Point::new(20.0, 0.0));
        let id = surface.finish_stroke().unwrap().unwrap();
        assert_eq!(surface.take_events(), vec![SurfaceEvent::PathCreated(id)]);
        let style = surface.object(id).unwrap().shape.style();
        assert_eq!(style.stroke.as_deref(), Some("#2d3436"));
        assert_eq!(style.stroke_width, 3.0);
    }

    #[test]
    fn test_update_style_validation_and_clamping() {
        let mut surface = mounted();
        let rect = surface.add_rectangle(0.0, 0.0).unwrap();
        let text = surface.add_text(0.0, 0.0).unwrap();

        surface.update_style(rect, StyleUpdate::stroke_width(50.0)).unwrap();
        assert_eq!(surface.object(rect).unwrap().shape.style().stroke_width, 20.0);

        assert!(matches!(
            surface.update_style(rect, StyleUpdate::fill("nope")),
            Err(SurfaceError::InvalidProperty(_))
        ));
        assert!(matches!(
            surface.update_style(rect, StyleUpdate::font_size(30.0)),
            Err(SurfaceError::InvalidProperty(_))
        ));

        surface.update_style(text, StyleUpdate::font_size(200.0)).unwrap();
        match &surface.object(text).unwrap().shape {
            Shape::Text(t) => assert_eq!(t.font_size, 72.0),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_load_replaces_content_with_one_event() {
        let mut surface = mounted();
        surface.add_rectangle(0.0, 0.0).unwrap();
        surface.take_events();

        let mut doc = CanvasDocument::with_size(1000.0, 700.0);
        doc.background = "#f0f0f0".to_string();
        doc.push(Shape::Circle(Circle::new(1.0, 2.0, 3.0)));
        doc.push(Shape::Circle(Circle::new(4.0, 5.0, 6.0)));
        surface.load_document(&doc).unwrap();

        assert_eq!(surface.take_events(), vec![SurfaceEvent::DocumentLoaded]);
        assert_eq!(surface.to_document(), doc);
        assert_eq!(surface.background(), "#f0f0f0");
    }

    #[test]
    fn test_read_only_rejects_edits() {
        let mut surface = mounted();
        let id = surface.add_rectangle(0.0, 0.0).unwrap();
        surface.set_interactive(false);

        let object = surface.object(id).unwrap();
        assert!(!object.selectable && !object.evented);
        assert!(surface.selected().is_none());
        assert_eq!(surface.move_by(id, 1.0, 1.0), Err(SurfaceError::ReadOnly));
        assert_eq!(surface.select(id), Err(SurfaceError::ReadOnly));
        assert_eq!(surface.clear(), Err(SurfaceError::ReadOnly));
    }

    #[test]
    fn test_clear_resets_background() {
        let mut surface = mounted();
        surface.set_background("#000000").unwrap();
        surface.add_rectangle(0.0, 0.0).unwrap();
        surface.clear().unwrap();
        assert!(surface.is_empty());
        assert_eq!(surface.background(), "#ffffff");
    }

    #[test]
    fn test_selection_events_are_not_structural() {
        assert!(!SurfaceEvent::SelectionCreated(1).is_structural());
        assert!(!SurfaceEvent::SelectionCleared.is_structural());
        assert!(SurfaceEvent::DocumentLoaded.is_structural());
        assert!(SurfaceEvent::Cleared.is_structural());
    }
}
