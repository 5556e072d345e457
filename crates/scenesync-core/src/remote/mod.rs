//! Remote document store access.
//!
//! Everything that talks to the store goes through [`RemoteSyncChannel`],
//! which sits on top of a poll-based [`StoreTransport`].

mod channel;
mod memory;
mod socket;

pub use channel::RemoteSyncChannel;
pub use memory::{MemoryDocumentStore, MemoryTransport};

#[cfg(not(target_arch = "wasm32"))]
pub use socket::NativeStoreSocket;

#[cfg(target_arch = "wasm32")]
pub use socket::WasmStoreSocket;

/// Platform-specific WebSocket transport type.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStoreSocket = NativeStoreSocket;

#[cfg(target_arch = "wasm32")]
pub type PlatformStoreSocket = WasmStoreSocket;

use crate::document::CanvasDocument;
use crate::protocol::{ClientMessage, ServerMessage};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Not connected")]
    NotConnected,
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Store error: {0}")]
    Other(String),
}

/// Result type for transport operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events produced by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connected to the store.
    Connected,
    /// Connection closed.
    Disconnected,
    /// A message from the store.
    Message(ServerMessage),
    /// Transport-level failure.
    Error { message: String },
}

/// A bidirectional message pipe to the document store.
///
/// Sends never block; replies and pushes are collected by `poll_events`,
/// which the owner calls once per tick.
pub trait StoreTransport {
    /// Queue a message for the store.
    fn send(&mut self, message: ClientMessage) -> StoreResult<()>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Close the connection.
    fn close(&mut self) {}
}

/// Identifies one write from request to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriteTicket(pub u64);

/// Outcome of a write, as reported by the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteResult {
    /// The store acknowledged the write.
    Saved,
    /// No store is configured for this session; nothing was sent.
    Unavailable,
    /// The write was attempted and failed.
    Failed(String),
}

/// Events surfaced by the channel to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Result of the initial fetch; `None` when absent or unreachable.
    InitialLoaded(Option<CanvasDocument>),
    /// The subscribed scene changed remotely (may be an echo of our own write).
    RemoteUpdate(CanvasDocument),
    /// A write completed.
    WriteFinished {
        ticket: WriteTicket,
        result: WriteResult,
    },
    /// Remote-store reachability flipped.
    ReachabilityChanged(bool),
}
