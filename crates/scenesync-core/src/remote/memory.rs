//! In-process document store for tests and single-machine demos.

use super::{ConnectionState, StoreError, StoreResult, StoreTransport, TransportEvent};
use crate::protocol::{ClientMessage, SceneRecord, ServerMessage, merge_record};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Inbox = Arc<Mutex<VecDeque<TransportEvent>>>;

struct Subscriber {
    transport_id: u64,
    scene_id: String,
    inbox: Inbox,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Map<String, Value>>,
    subscribers: Vec<Subscriber>,
    next_transport_id: u64,
    offline: bool,
}

/// Shared in-memory store; clones see the same records.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transport connected to this store.
    pub fn connect(&self) -> MemoryTransport {
        let id = match self.inner.lock() {
            Ok(mut inner) => {
                inner.next_transport_id += 1;
                inner.next_transport_id
            }
            Err(_) => 0,
        };
        MemoryTransport {
            store: self.clone(),
            id,
            inbox: Arc::new(Mutex::new(VecDeque::new())),
            state: ConnectionState::Connecting,
        }
    }

    /// Simulate an outage: while offline every send fails.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.offline = offline;
        }
    }

    /// Raw stored record for a scene.
    pub fn record(&self, scene_id: &str) -> Option<Map<String, Value>> {
        self.inner.lock().ok()?.records.get(scene_id).cloned()
    }

    /// Merge-write a raw record, notifying subscribers.
    pub fn put_raw(&self, scene_id: &str, patch: Map<String, Value>) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let merged = {
            let entry = inner.records.entry(scene_id.to_string()).or_default();
            merge_record(entry, patch);
            entry.clone()
        };
        notify(&inner, scene_id, &merged);
        Ok(())
    }

    /// Number of live subscriptions for a scene.
    pub fn subscriber_count(&self, scene_id: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.subscribers.iter().filter(|s| s.scene_id == scene_id).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))
    }
}

fn notify(inner: &Inner, scene_id: &str, record: &Map<String, Value>) {
    let Ok(record) = serde_json::from_value::<SceneRecord>(Value::Object(record.clone())) else {
        log::warn!("Stored record for {} is not a scene record", scene_id);
        return;
    };
    for subscriber in inner.subscribers.iter().filter(|s| s.scene_id == scene_id) {
        if let Ok(mut inbox) = subscriber.inbox.lock() {
            inbox.push_back(TransportEvent::Message(ServerMessage::Changed {
                scene_id: scene_id.to_string(),
                record: record.clone(),
            }));
        }
    }
}

/// Transport handle onto a [`MemoryDocumentStore`].
///
/// Replies are queued and only become visible on the next `poll_events`,
/// so callers observe the same asynchrony as with a network transport.
pub struct MemoryTransport {
    store: MemoryDocumentStore,
    id: u64,
    inbox: Inbox,
    state: ConnectionState,
}

impl MemoryTransport {
    fn push(&self, event: TransportEvent) {
        if let Ok(mut inbox) = self.inbox.lock() {
            inbox.push_back(event);
        }
    }
}

impl StoreTransport for MemoryTransport {
    fn send(&mut self, message: ClientMessage) -> StoreResult<()> {
        let mut inner = self.store.lock()?;
        if inner.offline {
            return Err(StoreError::NotConnected);
        }
        match message {
            ClientMessage::Get {
                request_id,
                scene_id,
            } => {
                let record = match inner.records.get(&scene_id) {
                    Some(raw) => Some(
                        serde_json::from_value::<SceneRecord>(Value::Object(raw.clone()))
                            .map_err(|e| StoreError::Other(e.to_string()))?,
                    ),
                    None => None,
                };
                drop(inner);
                self.push(TransportEvent::Message(ServerMessage::Record {
                    request_id,
                    scene_id,
                    record,
                }));
            }
            ClientMessage::Put {
                request_id,
                scene_id,
                record,
            } => {
                let last_modified = record.last_modified;
                let patch = match serde_json::to_value(&record) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) => return Err(StoreError::Other("record is not an object".to_string())),
                    Err(e) => return Err(StoreError::Other(e.to_string())),
                };
                // Ack first so the writer sees its reply before its own echo.
                self.push(TransportEvent::Message(ServerMessage::PutAck {
                    request_id,
                    scene_id: scene_id.clone(),
                    last_modified,
                }));
                let merged = {
                    let entry = inner.records.entry(scene_id.clone()).or_default();
                    merge_record(entry, patch);
                    entry.clone()
                };
                notify(&inner, &scene_id, &merged);
            }
            ClientMessage::Subscribe { scene_id } => {
                let transport_id = self.id;
                inner
                    .subscribers
                    .retain(|s| !(s.transport_id == transport_id && s.scene_id == scene_id));
                inner.subscribers.push(Subscriber {
                    transport_id,
                    scene_id,
                    inbox: self.inbox.clone(),
                });
            }
            ClientMessage::Unsubscribe { scene_id } => {
                let transport_id = self.id;
                inner
                    .subscribers
                    .retain(|s| !(s.transport_id == transport_id && s.scene_id == scene_id));
            }
        }
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            events.push(TransportEvent::Connected);
        }
        if let Ok(mut inbox) = self.inbox.lock() {
            events.extend(inbox.drain(..));
        }
        events
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn close(&mut self) {
        if let Ok(mut inner) = self.store.inner.lock() {
            let transport_id = self.id;
            inner.subscribers.retain(|s| s.transport_id != transport_id);
        }
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CanvasDocument;
    use serde_json::json;

    fn put(transport: &mut MemoryTransport, request_id: u64, scene: &str, doc: &CanvasDocument) {
        let record = SceneRecord::new(scene, doc, 10).unwrap();
        transport
            .send(ClientMessage::Put {
                request_id,
                scene_id: scene.to_string(),
                record,
            })
            .unwrap();
    }

    #[test]
    fn test_get_missing_scene() {
        let store = MemoryDocumentStore::new();
        let mut t = store.connect();
        t.send(ClientMessage::Get {
            request_id: 1,
            scene_id: "nope".to_string(),
        })
        .unwrap();
        let events = t.poll_events();
        assert_eq!(events[0], TransportEvent::Connected);
        assert_eq!(
            events[1],
            TransportEvent::Message(ServerMessage::Record {
                request_id: 1,
                scene_id: "nope".to_string(),
                record: None
            })
        );
    }

    #[test]
    fn test_put_notifies_all_subscribers_including_writer() {
        let store = MemoryDocumentStore::new();
        let mut writer = store.connect();
        let mut reader = store.connect();
        writer.send(ClientMessage::Subscribe { scene_id: "s".into() }).unwrap();
        reader.send(ClientMessage::Subscribe { scene_id: "s".into() }).unwrap();

        put(&mut writer, 1, "s", &CanvasDocument::new());

        let writer_events = writer.poll_events();
        assert!(matches!(
            writer_events[1],
            TransportEvent::Message(ServerMessage::PutAck { request_id: 1, .. })
        ));
        assert!(matches!(
            writer_events[2],
            TransportEvent::Message(ServerMessage::Changed { .. })
        ));
        let reader_events = reader.poll_events();
        assert_eq!(reader_events.len(), 2);
    }

    #[test]
    fn test_put_merges_existing_fields() {
        let store = MemoryDocumentStore::new();
        store
            .put_raw("s", json!({"title": "Plan"}).as_object().cloned().unwrap())
            .unwrap();
        let mut t = store.connect();
        put(&mut t, 1, "s", &CanvasDocument::new());

        let record = store.record("s").unwrap();
        assert_eq!(record["title"], "Plan");
        assert_eq!(record["sceneId"], "s");
        assert!(record["canvasState"].is_string());
    }

    #[test]
    fn test_offline_store_rejects_sends() {
        let store = MemoryDocumentStore::new();
        let mut t = store.connect();
        store.set_offline(true);
        let err = t.send(ClientMessage::Subscribe { scene_id: "s".into() });
        assert_eq!(err, Err(StoreError::NotConnected));
    }

    #[test]
    fn test_close_drops_subscriptions() {
        let store = MemoryDocumentStore::new();
        let mut t = store.connect();
        t.send(ClientMessage::Subscribe { scene_id: "s".into() }).unwrap();
        assert_eq!(store.subscriber_count("s"), 1);
        t.close();
        assert_eq!(store.subscriber_count("s"), 0);
    }
}
