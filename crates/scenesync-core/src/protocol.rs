//! Document store wire protocol.
//!
//! Messages are JSON objects tagged by `type`:
//! ```json
//! { "type": "get", "request_id": 1, "scene_id": "abc" }
//! { "type": "put", "request_id": 2, "scene_id": "abc", "record": { "canvasState": "...", "lastModified": 0, "sceneId": "abc" } }
//! { "type": "subscribe", "scene_id": "abc" }
//! ```

use crate::document::{CanvasDocument, DocumentResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The persisted record of one scene.
///
/// Fields written by other clients are kept in `extra` so that a
/// read-modify-write through this type does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    /// Serialized canvas document (JSON text).
    #[serde(default)]
    pub canvas_state: Value,
    /// Unix milliseconds of the last write.
    #[serde(default)]
    pub last_modified: u64,
    /// Owning scene.
    #[serde(default)]
    pub scene_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SceneRecord {
    /// Build the record written for a document.
    pub fn new(scene_id: &str, document: &CanvasDocument, last_modified: u64) -> DocumentResult<Self> {
        Ok(Self {
            canvas_state: Value::String(document.to_json()?),
            last_modified,
            scene_id: scene_id.to_string(),
            extra: Map::new(),
        })
    }

    /// Decode the canvas carried by this record, if any.
    pub fn document(&self) -> DocumentResult<Option<CanvasDocument>> {
        CanvasDocument::from_canvas_state(&self.canvas_state)
    }
}

/// Merge `patch` into `target`: fields present in the patch win, every other
/// field of the existing record is preserved.
pub fn merge_record(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Messages sent to the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Read a scene record.
    Get { request_id: u64, scene_id: String },
    /// Merge-write a scene record.
    Put {
        request_id: u64,
        scene_id: String,
        record: SceneRecord,
    },
    /// Receive `changed` pushes for a scene.
    Subscribe { scene_id: String },
    /// Stop receiving pushes for a scene.
    Unsubscribe { scene_id: String },
}

/// Messages received from the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `get`; `record` is absent when the scene was never written.
    Record {
        request_id: u64,
        scene_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record: Option<SceneRecord>,
    },
    /// Reply to `put`.
    PutAck {
        request_id: u64,
        scene_id: String,
        last_modified: u64,
    },
    /// A subscribed scene changed (including by this client).
    Changed { scene_id: String, record: SceneRecord },
    /// A request or subscription failed.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        message: String,
    },
}
