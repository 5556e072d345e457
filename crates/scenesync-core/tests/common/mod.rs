#![allow(dead_code)]

use scenesync_core::protocol::{ClientMessage, SceneRecord, ServerMessage};
use scenesync_core::remote::{ConnectionState, StoreResult, TransportEvent};
use scenesync_core::session::SceneAddress;
use scenesync_core::time::{Duration, Instant};
use scenesync_core::{CanvasDocument, CanvasSurface, SceneSession, StoreTransport, SyncConfig};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub const FRAME: Duration = Duration::from_millis(16);

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Tick `session` frame by frame until `millis` have passed.
pub fn advance(session: &mut SceneSession, now: &mut Instant, millis: u64) {
    let end = *now + ms(millis);
    while *now < end {
        *now = (*now + FRAME).min(end);
        session.tick(*now);
    }
}

pub fn surface() -> CanvasSurface {
    CanvasSurface::with_host(1200.0, 900.0)
}

#[derive(Default)]
struct Script {
    record: Option<SceneRecord>,
    fail_reads: Option<String>,
    fail_writes: Option<String>,
    hold_reads: bool,
    held_reads: Vec<ServerMessage>,
    hold_writes: bool,
    held: Vec<(u64, String, SceneRecord)>,
    puts: Vec<CanvasDocument>,
    sends: usize,
    subscribed: Option<String>,
    inbox: VecDeque<TransportEvent>,
}

impl Script {
    fn ack(&mut self, request_id: u64, scene_id: String, record: SceneRecord) {
        self.inbox.push_back(TransportEvent::Message(ServerMessage::PutAck {
            request_id,
            scene_id: scene_id.clone(),
            last_modified: record.last_modified,
        }));
        self.record = Some(record.clone());
        if self.subscribed.as_deref() == Some(scene_id.as_str()) {
            self.inbox
                .push_back(TransportEvent::Message(ServerMessage::Changed { scene_id, record }));
        }
    }
}

/// Test-side handle onto a [`ScriptedTransport`].
#[derive(Clone, Default)]
pub struct ScriptHandle(Rc<RefCell<Script>>);

impl ScriptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Box<dyn StoreTransport> {
        Box::new(ScriptedTransport {
            script: self.0.clone(),
        })
    }

    /// Serve `document` from `get`.
    pub fn with_document(self, scene_id: &str, document: &CanvasDocument) -> Self {
        self.0.borrow_mut().record = SceneRecord::new(scene_id, document, 1).ok();
        self
    }

    pub fn fail_reads(&self, message: &str) {
        self.0.borrow_mut().fail_reads = Some(message.to_string());
    }

    pub fn fail_writes(&self, message: &str) {
        self.0.borrow_mut().fail_writes = Some(message.to_string());
    }

    /// Keep the initial fetch unanswered until [`release_reads`](Self::release_reads).
    pub fn hold_reads(&self) {
        self.0.borrow_mut().hold_reads = true;
    }

    pub fn release_reads(&self) {
        let mut script = self.0.borrow_mut();
        script.hold_reads = false;
        let held = std::mem::take(&mut script.held_reads);
        script
            .inbox
            .extend(held.into_iter().map(TransportEvent::Message));
    }

    /// Keep writes in flight until [`release_writes`](Self::release_writes).
    pub fn hold_writes(&self) {
        self.0.borrow_mut().hold_writes = true;
    }

    pub fn release_writes(&self) {
        let mut script = self.0.borrow_mut();
        script.hold_writes = false;
        let held = std::mem::take(&mut script.held);
        for (request_id, scene_id, record) in held {
            script.ack(request_id, scene_id, record);
        }
    }

    /// Deliver a change made by someone else.
    pub fn push_remote(&self, scene_id: &str, document: &CanvasDocument) {
        let Ok(record) = SceneRecord::new(scene_id, document, 2) else {
            return;
        };
        self.0
            .borrow_mut()
            .inbox
            .push_back(TransportEvent::Message(ServerMessage::Changed {
                scene_id: scene_id.to_string(),
                record,
            }));
    }

    /// Documents that reached the transport as writes.
    pub fn puts(&self) -> Vec<CanvasDocument> {
        self.0.borrow().puts.clone()
    }

    /// Every message the transport was asked to send.
    pub fn sends(&self) -> usize {
        self.0.borrow().sends
    }
}

/// In-memory transport whose replies are scripted by the test.
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl StoreTransport for ScriptedTransport {
    fn send(&mut self, message: ClientMessage) -> StoreResult<()> {
        let mut script = self.script.borrow_mut();
        script.sends += 1;
        match message {
            ClientMessage::Get {
                request_id,
                scene_id,
            } => {
                let reply = match script.fail_reads.clone() {
                    Some(message) => ServerMessage::Error {
                        request_id: Some(request_id),
                        message,
                    },
                    None => ServerMessage::Record {
                        request_id,
                        scene_id,
                        record: script.record.clone(),
                    },
                };
                if script.hold_reads {
                    script.held_reads.push(reply);
                } else {
                    script.inbox.push_back(TransportEvent::Message(reply));
                }
            }
            ClientMessage::Put {
                request_id,
                scene_id,
                record,
            } => {
                if let Ok(Some(document)) = record.document() {
                    script.puts.push(document);
                }
                if let Some(message) = script.fail_writes.clone() {
                    script.inbox.push_back(TransportEvent::Message(ServerMessage::Error {
                        request_id: Some(request_id),
                        message,
                    }));
                } else if script.hold_writes {
                    script.held.push((request_id, scene_id, record));
                } else {
                    script.ack(request_id, scene_id, record);
                }
            }
            ClientMessage::Subscribe { scene_id } => script.subscribed = Some(scene_id),
            ClientMessage::Unsubscribe { .. } => script.subscribed = None,
        }
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.script.borrow_mut().inbox.drain(..).collect()
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Connected
    }
}

/// Open a session over a scripted store and tick until the surface is up.
pub fn open(address: SceneAddress, script: &ScriptHandle) -> (SceneSession, Instant) {
    open_with(address, script, &SyncConfig::default())
}

pub fn open_with(
    address: SceneAddress,
    script: &ScriptHandle,
    config: &SyncConfig,
) -> (SceneSession, Instant) {
    let mut now = Instant::now();
    let mut session = SceneSession::new(address, surface(), Some(script.transport()), config, now);
    advance(&mut session, &mut now, 200);
    (session, now)
}
