//! WebSocket transports for the document store server.
//!
//! Both clients speak the JSON protocol in [`crate::protocol`] and buffer
//! incoming events until the owner polls them.

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use crate::protocol::{ClientMessage, ServerMessage};
    use crate::remote::{ConnectionState, StoreError, StoreResult, StoreTransport, TransportEvent};
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    /// Document store client for WASM.
    ///
    /// Messages sent before the socket opens are queued and flushed on open.
    pub struct WasmStoreSocket {
        ws: WebSocket,
        state: ConnectionState,
        events: Rc<RefCell<Vec<TransportEvent>>>,
        outbox: Rc<RefCell<Vec<String>>>,
        open: Rc<RefCell<bool>>,
        // Store closures to prevent them from being dropped
        _on_open: Closure<dyn Fn()>,
        _on_message: Closure<dyn Fn(MessageEvent)>,
        _on_close: Closure<dyn Fn(CloseEvent)>,
        _on_error: Closure<dyn Fn(ErrorEvent)>,
    }

    impl WasmStoreSocket {
        /// Open a socket to the store server.
        pub fn connect(url: &str) -> StoreResult<Self> {
            let ws = WebSocket::new(url).map_err(|e| StoreError::InvalidUrl(format!("{:?}", e)))?;
            ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

            let events: Rc<RefCell<Vec<TransportEvent>>> = Rc::new(RefCell::new(Vec::new()));
            let outbox: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
            let open = Rc::new(RefCell::new(false));

            let events_open = events.clone();
            let outbox_open = outbox.clone();
            let open_flag = open.clone();
            let ws_open = ws.clone();
            let on_open = Closure::wrap(Box::new(move || {
                *open_flag.borrow_mut() = true;
                for text in outbox_open.borrow_mut().drain(..) {
                    if let Err(e) = ws_open.send_with_str(&text) {
                        log::warn!("Failed to flush queued message: {:?}", e);
                    }
                }
                events_open.borrow_mut().push(TransportEvent::Connected);
            }) as Box<dyn Fn()>);
            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            let events_msg = events.clone();
            let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
                let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() else {
                    return;
                };
                let text: String = txt.into();
                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => events_msg.borrow_mut().push(TransportEvent::Message(message)),
                    Err(e) => log::warn!("Failed to parse store message: {}", e),
                }
            }) as Box<dyn Fn(MessageEvent)>);
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            let events_close = events.clone();
            let open_close = open.clone();
            let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
                *open_close.borrow_mut() = false;
                events_close.borrow_mut().push(TransportEvent::Disconnected);
            }) as Box<dyn Fn(CloseEvent)>);
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

            let events_err = events.clone();
            let on_error = Closure::wrap(Box::new(move |_e: ErrorEvent| {
                events_err.borrow_mut().push(TransportEvent::Error {
                    message: "WebSocket error".to_string(),
                });
            }) as Box<dyn Fn(ErrorEvent)>);
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            Ok(Self {
                ws,
                state: ConnectionState::Connecting,
                events,
                outbox,
                open,
                _on_open: on_open,
                _on_message: on_message,
                _on_close: on_close,
                _on_error: on_error,
            })
        }
    }

    impl StoreTransport for WasmStoreSocket {
        fn send(&mut self, message: ClientMessage) -> StoreResult<()> {
            if self.state == ConnectionState::Disconnected {
                return Err(StoreError::NotConnected);
            }
            let text = serde_json::to_string(&message).map_err(|e| StoreError::Send(e.to_string()))?;
            if *self.open.borrow() {
                self.ws
                    .send_with_str(&text)
                    .map_err(|e| StoreError::Send(format!("{:?}", e)))
            } else {
                self.outbox.borrow_mut().push(text);
                Ok(())
            }
        }

        fn poll_events(&mut self) -> Vec<TransportEvent> {
            let mut events = self.events.borrow_mut();
            for event in events.iter() {
                match event {
                    TransportEvent::Connected => self.state = ConnectionState::Connected,
                    TransportEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    TransportEvent::Error { .. } => self.state = ConnectionState::Error,
                    TransportEvent::Message(_) => {}
                }
            }
            std::mem::take(&mut *events)
        }

        fn state(&self) -> ConnectionState {
            self.state
        }

        fn close(&mut self) {
            let _ = self.ws.close();
            self.outbox.borrow_mut().clear();
            self.state = ConnectionState::Disconnected;
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmStoreSocket;

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use crate::protocol::{ClientMessage, ServerMessage};
    use crate::remote::{ConnectionState, StoreError, StoreResult, StoreTransport, TransportEvent};
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    enum SocketCommand {
        Send(String),
        Close,
    }

    /// Document store client for native platforms.
    ///
    /// The socket lives on a background thread; sends are queued to it and
    /// its events are drained by `poll_events`. Messages sent before the
    /// handshake completes are delivered once it does.
    pub struct NativeStoreSocket {
        state: ConnectionState,
        cmd_tx: Option<Sender<SocketCommand>>,
        event_rx: Option<Receiver<TransportEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeStoreSocket {
        /// Start connecting to the store server at `url` (`ws://` or `wss://`).
        pub fn connect(url: &str) -> StoreResult<Self> {
            let parsed = Url::parse(url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(StoreError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed.scheme()
                )));
            }

            let (cmd_tx, cmd_rx) = channel::<SocketCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

            Ok(Self {
                state: ConnectionState::Connecting,
                cmd_tx: Some(cmd_tx),
                event_rx: Some(event_rx),
                _thread: Some(handle),
            })
        }

        fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(SocketCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    fn run_socket(url: &str, cmd_rx: Receiver<SocketCommand>, event_tx: Sender<TransportEvent>) {
        log::info!("Store socket: connecting to {}", url);
        let (mut socket, response) = match connect(url) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("Store connection failed: {}", e);
                let _ = event_tx.send(TransportEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                return;
            }
        };
        log::info!("Store socket connected, status: {}", response.status());
        let _ = event_tx.send(TransportEvent::Connected);

        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }

        loop {
            match cmd_rx.try_recv() {
                Ok(SocketCommand::Send(text)) => {
                    log::debug!(
                        "Store socket sending: {}",
                        text.chars().take(100).collect::<String>()
                    );
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("Store socket send error: {}", e);
                        let _ = event_tx.send(TransportEvent::Error {
                            message: format!("Send failed: {}", e),
                        });
                        break;
                    }
                }
                Ok(SocketCommand::Close) => {
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        let _ = event_tx.send(TransportEvent::Message(message));
                    }
                    Err(e) => log::warn!("Failed to parse store message: {}", e),
                },
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("Store socket received close frame");
                    break;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("Store socket read error: {}", e);
                    break;
                }
            }
        }

        log::info!("Store socket thread exiting");
        let _ = event_tx.send(TransportEvent::Disconnected);
    }

    impl StoreTransport for NativeStoreSocket {
        fn send(&mut self, message: ClientMessage) -> StoreResult<()> {
            let Some(tx) = self.cmd_tx.as_ref() else {
                return Err(StoreError::NotConnected);
            };
            if self.state == ConnectionState::Disconnected {
                return Err(StoreError::NotConnected);
            }
            let text = serde_json::to_string(&message).map_err(|e| StoreError::Send(e.to_string()))?;
            tx.send(SocketCommand::Send(text))
                .map_err(|e| StoreError::Send(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<TransportEvent> {
            let Some(rx) = self.event_rx.as_ref() else {
                return Vec::new();
            };
            let mut events = Vec::new();
            while let Ok(event) = rx.try_recv() {
                match &event {
                    TransportEvent::Connected => self.state = ConnectionState::Connected,
                    TransportEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    TransportEvent::Error { .. } => self.state = ConnectionState::Error,
                    TransportEvent::Message(_) => {}
                }
                events.push(event);
            }
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }

        fn close(&mut self) {
            self.disconnect();
        }
    }

    impl Drop for NativeStoreSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeStoreSocket;
