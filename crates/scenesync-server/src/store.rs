//! Scene records with merge writes and change fan-out.

use dashmap::DashMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use scenesync_core::protocol::{SceneRecord, ServerMessage, merge_record};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of each scene's change channel.
const CHANNEL_CAPACITY: usize = 256;

/// Bytes escaped in scene file names.
const FILE_STEM_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-');

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One scene: its record fields and the channel its subscribers listen on.
struct SceneEntry {
    /// `None` until the scene is first written.
    fields: Option<Map<String, Value>>,
    tx: broadcast::Sender<ServerMessage>,
    /// Bumped by every write.
    revision: u64,
    /// Revision last mirrored to the scene file.
    written: Arc<Mutex<u64>>,
}

impl SceneEntry {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            fields: None,
            tx,
            revision: 0,
            written: Arc::new(Mutex::new(0)),
        }
    }
}

/// A serialized write waiting to reach the scene file.
struct PendingFile {
    path: PathBuf,
    json: String,
    revision: u64,
    written: Arc<Mutex<u64>>,
}

impl PendingFile {
    /// Write unless a later revision already reached the file.
    fn flush(self) -> StoreResult<()> {
        let mut written = self
            .written
            .lock()
            .map_err(|_| StoreError::Io(format!("Lock poisoned for {}", self.path.display())))?;
        if *written >= self.revision {
            return Ok(());
        }
        fs::write(&self.path, self.json).map_err(|e| {
            StoreError::Io(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        *written = self.revision;
        Ok(())
    }
}

/// Keyed scene records, optionally mirrored to JSON files.
pub struct SceneStore {
    scenes: DashMap<String, SceneEntry>,
    data_dir: Option<PathBuf>,
}

impl SceneStore {
    /// Store that forgets everything on restart.
    pub fn in_memory() -> Self {
        Self {
            scenes: DashMap::new(),
            data_dir: None,
        }
    }

    /// Store persisting each scene to `<dir>/<scene>.json`.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Io(format!("Failed to create data directory {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            scenes: DashMap::new(),
            data_dir: Some(dir),
        })
    }

    /// Read a scene record. `None` when the scene was never written.
    pub fn get(&self, scene_id: &str) -> StoreResult<Option<SceneRecord>> {
        self.ensure_loaded(scene_id)?;
        let fields = self
            .scenes
            .get(scene_id)
            .and_then(|entry| entry.fields.clone());
        fields.map(to_record).transpose()
    }

    /// Merge `patch` into the scene record and notify subscribers.
    ///
    /// Fields absent from the patch keep their stored values. The scene file
    /// is written after the map entry is released; when that write fails the
    /// merged record stays in memory and the error is returned.
    pub fn put(&self, scene_id: &str, patch: Map<String, Value>) -> StoreResult<SceneRecord> {
        self.ensure_loaded(scene_id)?;

        let (record, file) = {
            let mut entry = self
                .scenes
                .entry(scene_id.to_string())
                .or_insert_with(SceneEntry::new);
            let mut fields = entry.fields.clone().unwrap_or_default();
            merge_record(&mut fields, patch);
            let record = to_record(fields.clone())?;

            let file = match self.scene_path(scene_id) {
                Some(path) => Some(PendingFile {
                    json: serde_json::to_string_pretty(&fields)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?,
                    path,
                    revision: entry.revision + 1,
                    written: entry.written.clone(),
                }),
                None => None,
            };
            entry.revision += 1;
            entry.fields = Some(fields);

            let receivers = entry.tx.send(ServerMessage::Changed {
                scene_id: scene_id.to_string(),
                record: record.clone(),
            });
            debug!(
                "Scene {} written, {} subscriber(s) notified",
                scene_id,
                receivers.unwrap_or(0)
            );
            (record, file)
        };

        if let Some(file) = file {
            file.flush()?;
        }
        Ok(record)
    }

    /// Merge a typed record.
    pub fn put_record(&self, scene_id: &str, record: &SceneRecord) -> StoreResult<SceneRecord> {
        match serde_json::to_value(record) {
            Ok(Value::Object(patch)) => self.put(scene_id, patch),
            Ok(_) => Err(StoreError::InvalidRecord("record is not an object".to_string())),
            Err(e) => Err(StoreError::Serialization(e.to_string())),
        }
    }

    /// Receive a `changed` message for every later write to the scene.
    pub fn subscribe(&self, scene_id: &str) -> broadcast::Receiver<ServerMessage> {
        self.scenes
            .entry(scene_id.to_string())
            .or_insert_with(SceneEntry::new)
            .tx
            .subscribe()
    }

    /// Pull a persisted scene into memory on first access.
    fn ensure_loaded(&self, scene_id: &str) -> StoreResult<()> {
        let loaded = self
            .scenes
            .get(scene_id)
            .is_some_and(|entry| entry.fields.is_some());
        if loaded {
            return Ok(());
        }
        let Some(path) = self.scene_path(scene_id) else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let json = fs::read_to_string(&path)
            .map_err(|e| StoreError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        let fields = match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                return Err(StoreError::InvalidRecord(format!(
                    "{} does not hold an object",
                    path.display()
                )));
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                return Err(StoreError::Serialization(e.to_string()));
            }
        };
        if let Some(Value::String(stored)) = fields.get("sceneId") {
            if !stored.is_empty() && stored != scene_id {
                warn!("{} belongs to scene {}, not {}", path.display(), stored, scene_id);
                return Err(StoreError::InvalidRecord(format!(
                    "{} holds scene {}",
                    path.display(),
                    stored
                )));
            }
        }

        let mut entry = self
            .scenes
            .entry(scene_id.to_string())
            .or_insert_with(SceneEntry::new);
        if entry.fields.is_none() {
            entry.fields = Some(fields);
        }
        Ok(())
    }

    fn scene_path(&self, scene_id: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", file_stem(scene_id))))
    }
}

/// File stem for a scene id.
///
/// Every byte other than an ASCII letter, digit, `-` or `_` is written as
/// `%XX`, so distinct ids get distinct files.
pub fn file_stem(scene_id: &str) -> String {
    percent_encode(scene_id.as_bytes(), FILE_STEM_ESCAPES).to_string()
}

fn to_record(fields: Map<String, Value>) -> StoreResult<SceneRecord> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| StoreError::InvalidRecord(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenesync_core::CanvasDocument;
    use scenesync_core::shapes::{Rectangle, Shape};
    use serde_json::json;
    use tempfile::TempDir;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_get_unknown_scene() {
        let store = SceneStore::in_memory();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_put_merges_fields() {
        let store = SceneStore::in_memory();
        store
            .put("s", object(json!({"canvasState": "a", "title": "Plan", "lastModified": 1})))
            .unwrap();
        let record = store
            .put("s", object(json!({"canvasState": "b", "lastModified": 2})))
            .unwrap();

        assert_eq!(record.canvas_state, json!("b"));
        assert_eq!(record.last_modified, 2);
        assert_eq!(record.extra.get("title"), Some(&json!("Plan")));
        assert_eq!(store.get("s").unwrap(), Some(record));
    }

    #[test]
    fn test_put_record_round_trip() {
        let store = SceneStore::in_memory();
        let mut doc = CanvasDocument::new();
        doc.push(Shape::Rectangle(Rectangle::new(50.0, 50.0, 100.0, 80.0)));
        let record = SceneRecord::new("s", &doc, 7).unwrap();

        store.put_record("s", &record).unwrap();
        let stored = store.get("s").unwrap().unwrap();
        assert_eq!(stored.document().unwrap(), Some(doc));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("abc-123_x"), "abc-123_x");
        assert_eq!(file_stem("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_ne!(file_stem("a.b"), file_stem("a_b"));
        assert_ne!(file_stem("a%2Eb"), file_stem("a.b"));
    }

    #[test]
    fn test_similar_ids_do_not_share_a_file() {
        let temp = TempDir::new().unwrap();
        let store = SceneStore::with_data_dir(temp.path()).unwrap();
        store
            .put("a.b", object(json!({"canvasState": "x", "lastModified": 1, "sceneId": "a.b"})))
            .unwrap();

        let reopened = SceneStore::with_data_dir(temp.path()).unwrap();
        assert!(reopened.get("a_b").unwrap().is_none());
        assert_eq!(reopened.get("a.b").unwrap().unwrap().scene_id, "a.b");
    }

    #[test]
    fn test_file_of_another_scene_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("x.json"),
            r#"{"sceneId": "y", "canvasState": "x", "lastModified": 1}"#,
        )
        .unwrap();
        let store = SceneStore::with_data_dir(temp.path()).unwrap();
        assert!(matches!(store.get("x"), Err(StoreError::InvalidRecord(_))));
    }

    #[test]
    fn test_file_follows_latest_write() {
        let temp = TempDir::new().unwrap();
        let store = SceneStore::with_data_dir(temp.path()).unwrap();
        for n in 1..=3 {
            store
                .put("s", object(json!({"canvasState": n, "lastModified": n})))
                .unwrap();
        }
        let json = fs::read_to_string(temp.path().join("s.json")).unwrap();
        let stored: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(stored["lastModified"], json!(3));
    }

    #[test]
    fn test_file_persistence() {
        let temp = TempDir::new().unwrap();
        let store = SceneStore::with_data_dir(temp.path()).unwrap();
        store
            .put("s/1", object(json!({"canvasState": "x", "lastModified": 3, "sceneId": "s/1"})))
            .unwrap();
        assert!(temp.path().join("s%2F1.json").exists());

        let reopened = SceneStore::with_data_dir(temp.path()).unwrap();
        let record = reopened.get("s/1").unwrap().unwrap();
        assert_eq!(record.last_modified, 3);
        assert_eq!(record.scene_id, "s/1");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bad.json"), "not json").unwrap();
        let store = SceneStore::with_data_dir(temp.path()).unwrap();
        assert!(matches!(store.get("bad"), Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_subscribers_see_every_write() {
        let store = SceneStore::in_memory();
        let mut rx = store.subscribe("s");
        store
            .put("s", object(json!({"canvasState": "a", "lastModified": 1})))
            .unwrap();

        match rx.recv().await.unwrap() {
            ServerMessage::Changed { scene_id, record } => {
                assert_eq!(scene_id, "s");
                assert_eq!(record.canvas_state, json!("a"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
