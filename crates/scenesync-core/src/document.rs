//! Canvas document: the unit of serialization and persistence.

use crate::shapes::Shape;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default canvas background.
pub const DEFAULT_BACKGROUND: &str = "#ffffff";
/// Default canvas width when no host size is known.
pub const DEFAULT_WIDTH: f64 = 800.0;
/// Default canvas height when no host size is known.
pub const DEFAULT_HEIGHT: f64 = 600.0;

/// Document errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unexpected canvas state: {0}")]
    UnexpectedState(String),
}

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_HEIGHT
}

/// All shapes of a scene plus its global canvas attributes.
///
/// Shapes are kept in paint order (back to front). The document carries no
/// identity of its own; it belongs to whichever scene stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasDocument {
    /// Canvas background color.
    #[serde(default = "default_background")]
    pub background: String,
    /// Canvas width in pixels.
    #[serde(default = "default_width")]
    pub width: f64,
    /// Canvas height in pixels.
    #[serde(default = "default_height")]
    pub height: f64,
    /// Shapes in paint order.
    #[serde(default)]
    pub objects: Vec<Shape>,
}

impl Default for CanvasDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            background: default_background(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            objects: Vec::new(),
        }
    }

    /// Create an empty document with the given dimensions.
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::new()
        }
    }

    /// Append a shape on top of the others.
    pub fn push(&mut self, shape: Shape) {
        self.objects.push(shape);
    }

    /// Number of shapes.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the document has no shapes.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Shapes in paint order.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.objects.iter()
    }

    /// Serialize to compact JSON text.
    pub fn to_json(&self) -> DocumentResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON text.
    pub fn from_json(json: &str) -> DocumentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode a stored `canvasState` value.
    ///
    /// Records normally carry the document as JSON text, but older writers
    /// stored the object inline; both are accepted. `null` means the record
    /// has no canvas yet.
    pub fn from_canvas_state(value: &Value) -> DocumentResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(text) => Self::from_json(text).map(Some),
            Value::Object(_) => Ok(Some(Self::deserialize(value)?)),
            other => Err(DocumentError::UnexpectedState(format!(
                "expected text or object, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Rectangle, ShapeStyle};

    #[test]
    fn test_empty_document_json() {
        let doc = CanvasDocument::new();
        let json = doc.to_json().unwrap();
        let back = CanvasDocument::from_json(&json).unwrap();
        assert_eq!(doc, back);
        assert!(back.is_empty());
    }

    #[test]
    fn test_missing_canvas_attributes_use_defaults() {
        let doc = CanvasDocument::from_json(r#"{"objects":[]}"#).unwrap();
        assert_eq!(doc.background, "#ffffff");
        assert_eq!(doc.width, 800.0);
        assert_eq!(doc.height, 600.0);
    }

    #[test]
    fn test_session_flags_are_ignored() {
        let json = r##"{"objects":[{"type":"rect","left":50,"top":50,"width":100,"height":80,
            "fill":"#ff6b6b","selectable":false,"evented":false}]}"##;
        let doc = CanvasDocument::from_json(json).unwrap();
        let out = serde_json::to_value(&doc).unwrap();
        assert!(out["objects"][0].get("selectable").is_none());
        assert!(out["objects"][0].get("evented").is_none());
    }

    #[test]
    fn test_from_canvas_state_variants() {
        let mut doc = CanvasDocument::new();
        doc.push(Shape::Rectangle(
            Rectangle::new(1.0, 2.0, 3.0, 4.0).with_style(ShapeStyle::filled("#000", "#fff", 1.0)),
        ));

        let as_text = Value::String(doc.to_json().unwrap());
        assert_eq!(CanvasDocument::from_canvas_state(&as_text).unwrap(), Some(doc.clone()));

        let as_object = serde_json::to_value(&doc).unwrap();
        assert_eq!(CanvasDocument::from_canvas_state(&as_object).unwrap(), Some(doc));

        assert_eq!(CanvasDocument::from_canvas_state(&Value::Null).unwrap(), None);
        assert!(CanvasDocument::from_canvas_state(&Value::Bool(true)).is_err());
        assert!(CanvasDocument::from_canvas_state(&Value::String("{".into())).is_err());
    }
}
