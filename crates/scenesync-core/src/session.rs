//! One editing session of one scene.
//!
//! [`SceneSession`] owns the surface adapter, the remote channel, the
//! autosave coordinator and the connectivity monitor, and advances all of
//! them from a single [`tick`](SceneSession::tick) per frame.

use crate::adapter::SurfaceAdapter;
use crate::autosave::{AutosaveCoordinator, SaveState, WriteGate, WriteRequest};
use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivitySignal};
use crate::document::CanvasDocument;
use crate::init::{InitState, SurfaceInit};
use crate::remote::{ChannelEvent, RemoteSyncChannel, StoreTransport, WriteResult, WriteTicket};
use crate::surface::{CanvasSurface, DrawingSurface};
use crate::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Reserved scene id for a local-only scene.
pub const OFFLINE_SCENE_ID: &str = "offline";

/// Route prefix of scene addresses.
const CANVAS_ROUTE: &str = "/canvas/";

/// Address parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Unknown route: {0}")]
    UnknownRoute(String),
    #[error("Empty scene id")]
    EmptySceneId,
}

/// Generate a fresh scene id.
pub fn new_scene_id() -> String {
    Uuid::new_v4().to_string()
}

/// Which scene a session edits and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneAddress {
    id: String,
    view_only: bool,
    generated: bool,
}

impl SceneAddress {
    /// Parse `/canvas/<id>[?viewOnly=true]`. The root path yields a new scene.
    pub fn parse(path_and_query: &str) -> Result<Self, AddressError> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        let view_only = query
            .map(|q| {
                q.split('&')
                    .filter_map(|pair| pair.split_once('='))
                    .any(|(key, value)| key == "viewOnly" && value == "true")
            })
            .unwrap_or(false);

        if path.is_empty() || path == "/" {
            return Ok(Self::generate());
        }

        let id = path
            .strip_prefix(CANVAS_ROUTE)
            .ok_or_else(|| AddressError::UnknownRoute(path.to_string()))?;
        let id = id.strip_suffix('/').unwrap_or(id);
        if id.is_empty() {
            return Err(AddressError::EmptySceneId);
        }
        if id.contains('/') {
            return Err(AddressError::UnknownRoute(path.to_string()));
        }

        Ok(Self {
            id: id.to_string(),
            view_only,
            generated: false,
        })
    }

    /// A new scene with a generated id.
    pub fn generate() -> Self {
        Self {
            id: new_scene_id(),
            view_only: false,
            generated: true,
        }
    }

    /// The local-only scene.
    pub fn offline() -> Self {
        Self::remote(OFFLINE_SCENE_ID)
    }

    /// An editable remote scene.
    pub fn remote(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            view_only: false,
            generated: false,
        }
    }

    pub fn with_view_only(mut self, view_only: bool) -> Self {
        self.view_only = view_only;
        self
    }

    /// Remote scene id; `None` for the local-only scene.
    pub fn scene_id(&self) -> Option<&str> {
        (!self.is_local_only()).then_some(self.id.as_str())
    }

    pub fn is_local_only(&self) -> bool {
        self.id == OFFLINE_SCENE_ID
    }

    pub fn is_view_only(&self) -> bool {
        self.view_only
    }

    /// Whether the id was generated because the root path was opened.
    pub fn was_generated(&self) -> bool {
        self.generated
    }

    /// Canonical path of this address.
    pub fn path(&self) -> String {
        if self.view_only {
            format!("{}{}?viewOnly=true", CANVAS_ROUTE, self.id)
        } else {
            format!("{}{}", CANVAS_ROUTE, self.id)
        }
    }
}

/// Snapshot of everything the presentation layer derives its state from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub scene_id: Option<String>,
    pub local_only: bool,
    pub view_only: bool,
    pub save_state: SaveState,
    pub connectivity: ConnectivitySignal,
    /// Initial fetch still outstanding.
    pub loading: bool,
    pub init: InitState,
    pub init_error: Option<&'static str>,
}

/// Sync engine for one scene.
pub struct SceneSession<S: DrawingSurface = CanvasSurface> {
    address: SceneAddress,
    adapter: SurfaceAdapter<S>,
    channel: RemoteSyncChannel,
    coordinator: AutosaveCoordinator,
    monitor: ConnectivityMonitor,
    init: SurfaceInit,
    /// Latest remote document received before the first load.
    incoming: Option<CanvasDocument>,
    /// The initial fetch has answered (or there is nothing to fetch).
    initial_resolved: bool,
    /// Initial content is on the surface; later pushes are reloads.
    first_load_done: bool,
    /// Last document known to match the store, loaded or written.
    last_synced: Option<CanvasDocument>,
    in_flight: Option<(WriteTicket, CanvasDocument)>,
    closed: bool,
}

impl<S: DrawingSurface> SceneSession<S> {
    /// Start a session. The initial fetch and the subscription are issued
    /// right away; the surface is mounted from `tick`.
    pub fn new(
        address: SceneAddress,
        surface: S,
        transport: Option<Box<dyn StoreTransport>>,
        config: &SyncConfig,
        now: Instant,
    ) -> Self {
        let view_only = address.is_view_only();
        let (scene_id, transport) = match address.scene_id() {
            Some(id) => (Some(id.to_string()), transport),
            None => (None, None),
        };
        let mut channel = RemoteSyncChannel::new(scene_id, transport);
        let initial_resolved = if channel.is_available() {
            channel.fetch_initial();
            channel.subscribe();
            false
        } else {
            true
        };

        log::info!(
            "Opening scene {} (view only: {})",
            address.path(),
            view_only
        );

        Self {
            adapter: SurfaceAdapter::new(surface, view_only),
            channel,
            coordinator: AutosaveCoordinator::new(config.autosave()),
            monitor: ConnectivityMonitor::new(true),
            init: SurfaceInit::new(config.init(), now),
            address,
            incoming: None,
            initial_resolved,
            first_load_done: false,
            last_synced: None,
            in_flight: None,
            closed: false,
        }
    }

    /// Start a session connected to the configured document store.
    ///
    /// A connection that cannot be started leaves the session without a
    /// store, which behaves like an unreachable one.
    pub fn connect(address: SceneAddress, surface: S, config: &SyncConfig, now: Instant) -> Self {
        let transport: Option<Box<dyn StoreTransport>> = match &config.server_url {
            Some(url) if !address.is_local_only() => {
                match crate::remote::PlatformStoreSocket::connect(url) {
                    Ok(socket) => Some(Box::new(socket)),
                    Err(e) => {
                        log::warn!("Could not connect to document store: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };
        Self::new(address, surface, transport, config, now)
    }

    pub fn address(&self) -> &SceneAddress {
        &self.address
    }

    pub fn adapter(&self) -> &SurfaceAdapter<S> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut SurfaceAdapter<S> {
        &mut self.adapter
    }

    pub fn channel(&self) -> &RemoteSyncChannel {
        &self.channel
    }

    pub fn coordinator(&self) -> &AutosaveCoordinator {
        &self.coordinator
    }

    pub fn save_state(&self) -> SaveState {
        self.coordinator.state()
    }

    pub fn init_state(&self) -> InitState {
        self.init.state()
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.is_ready()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Initial fetch still outstanding for a remote scene.
    pub fn is_loading(&self) -> bool {
        !self.initial_resolved
    }

    /// Whether edits made now would be kept and saved.
    ///
    /// False until the initial content is on the surface, since the load
    /// replaces whatever the surface held.
    pub fn accepts_edits(&self) -> bool {
        !self.closed && self.first_load_done && !self.adapter.is_view_only()
    }

    pub fn connectivity(&self) -> ConnectivitySignal {
        ConnectivitySignal {
            local_only: self.address.is_local_only(),
            network_online: self.monitor.is_online(),
            remote_reachable: self.channel.is_reachable(),
            last_error: self.channel.last_error().map(str::to_string),
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            scene_id: self.address.scene_id().map(str::to_string),
            local_only: self.address.is_local_only(),
            view_only: self.adapter.is_view_only(),
            save_state: self.coordinator.state(),
            connectivity: self.connectivity(),
            loading: self.is_loading(),
            init: self.init.state(),
            init_error: self.init.error_message(),
        }
    }

    /// Report browser-level network reachability.
    pub fn set_network_online(&mut self, online: bool, now: Instant) {
        self.monitor.set_online(online, now);
    }

    /// Follow the browser's online/offline events.
    #[cfg(target_arch = "wasm32")]
    pub fn attach_browser_connectivity(&mut self, now: Instant) -> Result<(), String> {
        self.monitor.attach_browser(now)
    }

    /// Advance the session: mount the surface when due, feed local changes
    /// to autosave, apply remote events, and start writes.
    pub fn tick(&mut self, now: Instant) {
        if self.closed {
            return;
        }

        for event in self.monitor.poll_events(now) {
            log::debug!("Connectivity: {:?}", event);
        }

        if self.init.attempt_due(now) {
            match self.adapter.mount() {
                Ok(()) => self.init.succeeded(),
                Err(e) => self.init.failed(&e, now),
            }
        }

        // Local edits first, so a push in this tick sees them as pending.
        self.collect_local_changes(now);

        for event in self.channel.poll() {
            self.handle_channel_event(event, now);
        }

        self.apply_initial_load();

        let gate = WriteGate::from(&self.connectivity());
        if let Some(request) = self.coordinator.poll(now, gate) {
            self.dispatch(request);
        }
    }

    /// User-initiated save. Returns false when saving is not possible in
    /// this session: view only, closed, or initial content not loaded yet.
    pub fn manual_save(&mut self, now: Instant) -> bool {
        if !self.accepts_edits() || !self.adapter.is_ready() {
            return false;
        }
        // Edits not yet seen by the coordinator are part of this save.
        let _ = self.adapter.poll_changes();
        let snapshot = self.adapter.serialize();
        let gate = WriteGate::from(&self.connectivity());
        if let Some(request) = self.coordinator.on_manual_save(snapshot, now, gate) {
            self.dispatch(request);
        }
        true
    }

    /// End the session: no further writes, subscription and surface released.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        log::info!("Closing scene {}", self.address.path());
        self.coordinator.teardown();
        self.channel.close();
        self.adapter.dispose();
        self.closed = true;
    }

    fn collect_local_changes(&mut self, now: Instant) {
        let changes = self.adapter.poll_changes();
        if changes.is_empty() || self.adapter.is_view_only() {
            return;
        }
        if !self.first_load_done {
            log::debug!("Discarding {} change(s) made before the initial load", changes.len());
            return;
        }
        let snapshot = self.adapter.serialize();
        for change in changes {
            log::trace!("Local change: {:?}", change);
            self.coordinator.on_local_change(snapshot.clone(), now);
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent, now: Instant) {
        match event {
            ChannelEvent::InitialLoaded(document) => {
                self.initial_resolved = true;
                if let Some(document) = document {
                    if !self.first_load_done && self.incoming.is_none() {
                        self.incoming = Some(document);
                    }
                }
            }
            ChannelEvent::RemoteUpdate(document) => {
                if self.first_load_done {
                    self.apply_remote_push(document);
                } else {
                    self.incoming = Some(document);
                }
            }
            ChannelEvent::WriteFinished { ticket, result } => {
                let written = self.in_flight.take_if(|(current, _)| *current == ticket);
                if let (Some((_, document)), WriteResult::Saved) = (written, &result) {
                    self.last_synced = Some(document);
                }
                if let Some(request) = self.coordinator.complete_write(ticket, result, now) {
                    self.dispatch(request);
                }
            }
            ChannelEvent::ReachabilityChanged(reachable) => {
                log::info!(
                    "Document store {}",
                    if reachable { "reachable" } else { "unreachable" }
                );
            }
        }
    }

    fn apply_initial_load(&mut self) {
        if self.first_load_done || !self.adapter.is_ready() {
            return;
        }
        if let Some(document) = self.incoming.take() {
            self.load(document);
            self.first_load_done = true;
        } else if self.initial_resolved {
            self.first_load_done = true;
        }
    }

    fn apply_remote_push(&mut self, document: CanvasDocument) {
        if self.last_synced.as_ref() == Some(&document) {
            log::debug!("Ignoring echo of our own write");
            return;
        }
        if self.coordinator.has_pending() || self.coordinator.is_writing() {
            log::debug!("Local changes pending, ignoring remote update");
            return;
        }
        if self.adapter.serialize() == document {
            self.last_synced = Some(document);
            return;
        }
        log::info!("Applying remote update ({} shapes)", document.len());
        self.load(document);
    }

    fn load(&mut self, document: CanvasDocument) {
        match self.adapter.deserialize(&document) {
            Ok(()) => {
                self.coordinator.note_document_loaded();
                self.last_synced = Some(document);
            }
            Err(e) => log::error!("Error loading canvas data: {}", e),
        }
    }

    fn dispatch(&mut self, request: WriteRequest) {
        log::debug!("Writing {:?} ({:?})", request.ticket, request.origin);
        self.channel.write(request.ticket, &request.document);
        self.in_flight = Some((request.ticket, request.document));
    }
}

impl<S: DrawingSurface> Drop for SceneSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}
