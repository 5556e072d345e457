//! The single gateway between a scene session and the document store.

use super::{ChannelEvent, StoreTransport, TransportEvent, WriteResult, WriteTicket};
use crate::document::CanvasDocument;
use crate::protocol::{ClientMessage, SceneRecord, ServerMessage};
use crate::time::unix_millis;
use std::collections::HashMap;

/// What an outstanding request id is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingRequest {
    Fetch,
    Write(WriteTicket),
}

/// Wraps a store transport for one scene.
///
/// Every operation is fallible in isolation and every failure is turned into
/// an event or a reachability flip; nothing here returns an error to the
/// caller. A channel without a transport (no backend configured, or an
/// offline-only scene) is permanently unavailable and answers every
/// operation immediately without I/O.
pub struct RemoteSyncChannel {
    scene_id: Option<String>,
    transport: Option<Box<dyn StoreTransport>>,
    reachable: bool,
    last_error: Option<String>,
    subscribed: bool,
    next_request_id: u64,
    pending: HashMap<u64, PendingRequest>,
    events: Vec<ChannelEvent>,
}

impl RemoteSyncChannel {
    /// Create a channel for a scene over the given transport.
    ///
    /// Without a scene id or a transport the channel is unavailable.
    pub fn new(scene_id: Option<String>, transport: Option<Box<dyn StoreTransport>>) -> Self {
        let transport = match (&scene_id, transport) {
            (Some(_), Some(t)) => Some(t),
            (_, _) => {
                log::info!("No document store configured - running offline only");
                None
            }
        };
        Self {
            scene_id,
            transport,
            reachable: false,
            last_error: None,
            subscribed: false,
            next_request_id: 1,
            pending: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// A channel that never performs I/O.
    pub fn unavailable() -> Self {
        Self::new(None, None)
    }

    /// Whether a backend is configured for this channel.
    pub fn is_available(&self) -> bool {
        self.transport.is_some()
    }

    /// Remote-store reachability derived from the last remote operation.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Message of the last remote failure, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a live subscription has been requested.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Start the one-shot initial read.
    ///
    /// The result arrives as [`ChannelEvent::InitialLoaded`].
    pub fn fetch_initial(&mut self) {
        let Some(scene_id) = self.scene_id.clone() else {
            self.events.push(ChannelEvent::InitialLoaded(None));
            return;
        };
        if self.transport.is_none() {
            self.events.push(ChannelEvent::InitialLoaded(None));
            return;
        }
        let request_id = self.allocate_request(PendingRequest::Fetch);
        if let Err(message) = self.send(ClientMessage::Get { request_id, scene_id }) {
            self.pending.remove(&request_id);
            log::warn!("Failed to load canvas: {}", message);
            self.mark_unreachable(message);
            self.events.push(ChannelEvent::InitialLoaded(None));
        }
    }

    /// Open the live subscription for this scene.
    ///
    /// Every remote change, including the echo of our own writes, arrives as
    /// [`ChannelEvent::RemoteUpdate`].
    pub fn subscribe(&mut self) {
        let Some(scene_id) = self.scene_id.clone() else {
            return;
        };
        if self.transport.is_none() || self.subscribed {
            return;
        }
        match self.send(ClientMessage::Subscribe { scene_id }) {
            Ok(()) => self.subscribed = true,
            Err(message) => {
                log::warn!("Store listener error: {}", message);
                self.mark_unreachable(message);
            }
        }
    }

    /// Upsert the document with merge semantics.
    ///
    /// The result arrives as [`ChannelEvent::WriteFinished`] carrying `ticket`.
    pub fn write(&mut self, ticket: WriteTicket, document: &CanvasDocument) {
        let (Some(scene_id), true) = (self.scene_id.clone(), self.transport.is_some()) else {
            log::debug!("Cannot save: no scene or no document store");
            self.events.push(ChannelEvent::WriteFinished {
                ticket,
                result: WriteResult::Unavailable,
            });
            return;
        };

        let record = match SceneRecord::new(&scene_id, document, unix_millis()) {
            Ok(record) => record,
            Err(e) => {
                log::error!("Failed to serialize canvas for {}: {}", scene_id, e);
                self.events.push(ChannelEvent::WriteFinished {
                    ticket,
                    result: WriteResult::Failed(e.to_string()),
                });
                return;
            }
        };

        let request_id = self.allocate_request(PendingRequest::Write(ticket));
        if let Err(message) = self.send(ClientMessage::Put {
            request_id,
            scene_id,
            record,
        }) {
            self.pending.remove(&request_id);
            log::warn!("Save failed: {}", message);
            self.mark_unreachable(message.clone());
            self.events.push(ChannelEvent::WriteFinished {
                ticket,
                result: WriteResult::Failed(message),
            });
        }
    }

    /// Drain transport events and return what happened since the last poll.
    pub fn poll(&mut self) -> Vec<ChannelEvent> {
        let transport_events = match self.transport.as_mut() {
            Some(t) => t.poll_events(),
            None => Vec::new(),
        };

        for event in transport_events {
            match event {
                TransportEvent::Connected => {
                    log::info!("Document store connected");
                }
                TransportEvent::Disconnected => {
                    self.subscribed = false;
                    self.fail_all("connection closed");
                }
                TransportEvent::Error { message } => {
                    self.fail_all(&message);
                }
                TransportEvent::Message(message) => self.handle_message(message),
            }
        }

        std::mem::take(&mut self.events)
    }

    /// Drop the subscription and close the transport.
    pub fn close(&mut self) {
        if let (Some(scene_id), true) = (self.scene_id.clone(), self.subscribed) {
            let _ = self.send(ClientMessage::Unsubscribe { scene_id });
        }
        self.subscribed = false;
        self.pending.clear();
        if let Some(t) = self.transport.as_mut() {
            t.close();
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Record {
                request_id, record, ..
            } => {
                if self.pending.remove(&request_id) != Some(PendingRequest::Fetch) {
                    log::debug!("Ignoring reply to unknown request {}", request_id);
                    return;
                }
                let decoded = match record {
                    Some(record) => record.document(),
                    None => Ok(None),
                };
                match decoded {
                    Ok(document) => {
                        self.mark_reachable();
                        self.events.push(ChannelEvent::InitialLoaded(document));
                    }
                    Err(e) => {
                        log::warn!("Failed to load canvas: {}", e);
                        self.mark_unreachable(e.to_string());
                        self.events.push(ChannelEvent::InitialLoaded(None));
                    }
                }
            }
            ServerMessage::PutAck { request_id, .. } => match self.pending.remove(&request_id) {
                Some(PendingRequest::Write(ticket)) => {
                    self.mark_reachable();
                    self.events.push(ChannelEvent::WriteFinished {
                        ticket,
                        result: WriteResult::Saved,
                    });
                }
                _ => log::debug!("Ignoring ack for unknown request {}", request_id),
            },
            ServerMessage::Changed { scene_id, record } => {
                if self.scene_id.as_deref() != Some(scene_id.as_str()) {
                    return;
                }
                self.mark_reachable();
                match record.document() {
                    Ok(Some(document)) => self.events.push(ChannelEvent::RemoteUpdate(document)),
                    Ok(None) => {}
                    Err(e) => log::warn!("Ignoring unreadable remote canvas: {}", e),
                }
            }
            ServerMessage::Error {
                request_id: Some(request_id),
                message,
            } => {
                let pending = self.pending.remove(&request_id);
                log::warn!("Store request {} failed: {}", request_id, message);
                self.mark_unreachable(message.clone());
                match pending {
                    Some(PendingRequest::Fetch) => {
                        self.events.push(ChannelEvent::InitialLoaded(None));
                    }
                    Some(PendingRequest::Write(ticket)) => {
                        self.events.push(ChannelEvent::WriteFinished {
                            ticket,
                            result: WriteResult::Failed(message),
                        });
                    }
                    None => {}
                }
            }
            ServerMessage::Error {
                request_id: None,
                message,
            } => {
                log::warn!("Store listener error: {}", message);
                self.mark_unreachable(message);
            }
        }
    }

    /// Resolve every outstanding request as failed.
    fn fail_all(&mut self, message: &str) {
        self.mark_unreachable(message.to_string());
        let mut pending: Vec<(u64, PendingRequest)> = self.pending.drain().collect();
        pending.sort_by_key(|(id, _)| *id);
        for (_, request) in pending {
            match request {
                PendingRequest::Fetch => self.events.push(ChannelEvent::InitialLoaded(None)),
                PendingRequest::Write(ticket) => self.events.push(ChannelEvent::WriteFinished {
                    ticket,
                    result: WriteResult::Failed(message.to_string()),
                }),
            }
        }
    }

    fn allocate_request(&mut self, request: PendingRequest) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.insert(id, request);
        id
    }

    fn send(&mut self, message: ClientMessage) -> Result<(), String> {
        match self.transport.as_mut() {
            Some(t) => t.send(message).map_err(|e| e.to_string()),
            None => Err("no document store".to_string()),
        }
    }

    fn mark_reachable(&mut self) {
        self.last_error = None;
        if !self.reachable {
            log::info!("Document store reachable");
            self.reachable = true;
            self.events.push(ChannelEvent::ReachabilityChanged(true));
        }
    }

    fn mark_unreachable(&mut self, message: String) {
        self.last_error = Some(message);
        if self.reachable {
            log::info!("Document store unreachable");
            self.reachable = false;
            self.events.push(ChannelEvent::ReachabilityChanged(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ConnectionState, StoreResult};
    use crate::shapes::{Circle, Shape};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Wire {
        sent: Vec<ClientMessage>,
        inbox: Vec<TransportEvent>,
    }

    struct WireTransport(Rc<RefCell<Wire>>);

    impl StoreTransport for WireTransport {
        fn send(&mut self, message: ClientMessage) -> StoreResult<()> {
            self.0.borrow_mut().sent.push(message);
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<TransportEvent> {
            std::mem::take(&mut self.0.borrow_mut().inbox)
        }

        fn state(&self) -> ConnectionState {
            ConnectionState::Connected
        }
    }

    fn channel(scene_id: &str) -> (RemoteSyncChannel, Rc<RefCell<Wire>>) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let transport = Box::new(WireTransport(wire.clone()));
        (RemoteSyncChannel::new(Some(scene_id.to_string()), Some(transport)), wire)
    }

    fn deliver(wire: &Rc<RefCell<Wire>>, message: ServerMessage) {
        wire.borrow_mut().inbox.push(TransportEvent::Message(message));
    }

    fn doc() -> CanvasDocument {
        let mut doc = CanvasDocument::new();
        doc.push(Shape::Circle(Circle::new(1.0, 2.0, 3.0)));
        doc
    }

    fn changed(scene_id: &str) -> ServerMessage {
        ServerMessage::Changed {
            scene_id: scene_id.to_string(),
            record: SceneRecord::new(scene_id, &doc(), 5).unwrap(),
        }
    }

    #[test]
    fn test_write_ack_marks_reachable() {
        let (mut channel, wire) = channel("s");
        channel.write(WriteTicket(3), &doc());
        assert_eq!(channel.pending_requests(), 1);
        assert!(matches!(wire.borrow().sent[0], ClientMessage::Put { request_id: 1, .. }));

        deliver(
            &wire,
            ServerMessage::PutAck {
                request_id: 1,
                scene_id: "s".to_string(),
                last_modified: 5,
            },
        );
        assert_eq!(
            channel.poll(),
            vec![
                ChannelEvent::ReachabilityChanged(true),
                ChannelEvent::WriteFinished {
                    ticket: WriteTicket(3),
                    result: WriteResult::Saved,
                },
            ]
        );
        assert!(channel.is_reachable());
        assert_eq!(channel.pending_requests(), 0);
    }

    #[test]
    fn test_disconnect_fails_everything_pending() {
        let (mut channel, wire) = channel("s");
        channel.fetch_initial();
        channel.subscribe();
        channel.write(WriteTicket(7), &doc());
        assert!(channel.is_subscribed());
        assert_eq!(channel.pending_requests(), 2);

        wire.borrow_mut().inbox.push(TransportEvent::Disconnected);
        assert_eq!(
            channel.poll(),
            vec![
                ChannelEvent::InitialLoaded(None),
                ChannelEvent::WriteFinished {
                    ticket: WriteTicket(7),
                    result: WriteResult::Failed("connection closed".to_string()),
                },
            ]
        );
        assert_eq!(channel.pending_requests(), 0);
        assert!(!channel.is_subscribed());
        assert_eq!(channel.last_error(), Some("connection closed"));
    }

    #[test]
    fn test_listener_error_flips_reachability() {
        let (mut channel, wire) = channel("s");
        deliver(&wire, changed("s"));
        assert_eq!(
            channel.poll(),
            vec![
                ChannelEvent::ReachabilityChanged(true),
                ChannelEvent::RemoteUpdate(doc()),
            ]
        );

        deliver(
            &wire,
            ServerMessage::Error {
                request_id: None,
                message: "permission denied".to_string(),
            },
        );
        assert_eq!(channel.poll(), vec![ChannelEvent::ReachabilityChanged(false)]);
        assert!(!channel.is_reachable());
        assert_eq!(channel.last_error(), Some("permission denied"));
    }

    #[test]
    fn test_unknown_replies_and_foreign_scenes_are_ignored() {
        let (mut channel, wire) = channel("s");
        channel.fetch_initial();
        deliver(
            &wire,
            ServerMessage::PutAck {
                request_id: 99,
                scene_id: "s".to_string(),
                last_modified: 1,
            },
        );
        deliver(
            &wire,
            ServerMessage::Record {
                request_id: 98,
                scene_id: "s".to_string(),
                record: None,
            },
        );
        deliver(&wire, changed("other"));

        assert!(channel.poll().is_empty());
        assert!(!channel.is_reachable());
        assert_eq!(channel.pending_requests(), 1);
    }

    #[test]
    fn test_request_error_resolves_only_that_request() {
        let (mut channel, wire) = channel("s");
        channel.fetch_initial();
        channel.write(WriteTicket(1), &doc());
        deliver(
            &wire,
            ServerMessage::Error {
                request_id: Some(2),
                message: "quota".to_string(),
            },
        );
        assert_eq!(
            channel.poll(),
            vec![ChannelEvent::WriteFinished {
                ticket: WriteTicket(1),
                result: WriteResult::Failed("quota".to_string()),
            }]
        );
        assert_eq!(channel.pending_requests(), 1);
    }

    #[test]
    fn test_without_transport_nothing_is_sent() {
        let mut channel = RemoteSyncChannel::new(Some("s".to_string()), None);
        assert!(!channel.is_available());
        channel.fetch_initial();
        channel.subscribe();
        channel.write(WriteTicket(4), &doc());

        assert_eq!(
            channel.poll(),
            vec![
                ChannelEvent::InitialLoaded(None),
                ChannelEvent::WriteFinished {
                    ticket: WriteTicket(4),
                    result: WriteResult::Unavailable,
                },
            ]
        );
        assert!(!channel.is_subscribed());
        assert_eq!(channel.pending_requests(), 0);
    }

    #[test]
    fn test_close_unsubscribes() {
        let (mut channel, wire) = channel("s");
        channel.subscribe();
        channel.close();
        assert_eq!(
            wire.borrow().sent.last(),
            Some(&ClientMessage::Unsubscribe {
                scene_id: "s".to_string()
            })
        );
        assert!(!channel.is_subscribed());
    }
}
