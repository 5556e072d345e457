//! SceneSync Core Library
//!
//! Platform-agnostic canvas document model and the synchronization engine that
//! keeps a locally edited canvas in step with a remote document store.

pub mod adapter;
pub mod autosave;
pub mod config;
pub mod connectivity;
pub mod document;
pub mod init;
pub mod protocol;
pub mod remote;
pub mod session;
pub mod shapes;
pub mod shell;
pub mod surface;
pub mod time;

pub use adapter::SurfaceAdapter;
pub use autosave::{AutosaveCoordinator, DebounceTimer, SaveState, WriteGate};
pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, ConnectivitySignal};
pub use document::CanvasDocument;
pub use init::{InitState, SurfaceInit};
pub use remote::{ChannelEvent, RemoteSyncChannel, StoreTransport, WriteResult, WriteTicket};
pub use session::{SceneAddress, SceneSession, SessionStatus};
pub use shapes::{Shape, ShapeStyle};
pub use surface::{CanvasSurface, DrawingSurface, SurfaceEvent};
