//! Network reachability tracking.

use crate::time::Instant;

/// Everything the session knows about reachability, combined into one
/// effective-offline flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivitySignal {
    /// The scene has no remote counterpart.
    pub local_only: bool,
    /// Browser-level network reachability.
    pub network_online: bool,
    /// Remote store reachability, derived from the last remote operation.
    pub remote_reachable: bool,
    /// Message of the last remote failure.
    pub last_error: Option<String>,
}

impl ConnectivitySignal {
    pub fn new(local_only: bool) -> Self {
        Self {
            local_only,
            network_online: true,
            remote_reachable: false,
            last_error: None,
        }
    }

    /// Both the network and the remote store are reachable.
    pub fn is_online(&self) -> bool {
        self.network_online && self.remote_reachable
    }

    /// Writes should not be attempted automatically.
    pub fn is_effectively_offline(&self) -> bool {
        self.local_only || !self.network_online || !self.remote_reachable || self.last_error.is_some()
    }
}

/// A reachability transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Tracks browser-level network reachability.
///
/// Native hosts drive it with [`set_online`](Self::set_online); on wasm it can
/// listen to the window's `online`/`offline` events.
pub struct ConnectivityMonitor {
    online: bool,
    last_change: Option<Instant>,
    events: Vec<ConnectivityEvent>,
    #[cfg(target_arch = "wasm32")]
    browser: Option<browser::BrowserWatch>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: initially_online,
            last_change: None,
            events: Vec::new(),
            #[cfg(target_arch = "wasm32")]
            browser: None,
        }
    }

    /// Current reachability.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// When reachability last flipped.
    pub fn last_change(&self) -> Option<Instant> {
        self.last_change
    }

    /// Record the current reachability; emits an event on change.
    pub fn set_online(&mut self, online: bool, now: Instant) {
        if self.online == online {
            return;
        }
        log::info!("Network {}", if online { "online" } else { "offline" });
        self.online = online;
        self.last_change = Some(now);
        self.events.push(if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        });
    }

    /// Drain transitions since the last poll.
    pub fn poll_events(&mut self, now: Instant) -> Vec<ConnectivityEvent> {
        #[cfg(target_arch = "wasm32")]
        {
            let observed = self.browser.as_ref().map(|b| b.take()).unwrap_or_default();
            for online in observed {
                self.set_online(online, now);
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        let _ = now;
        std::mem::take(&mut self.events)
    }

    /// Follow the browser's `navigator.onLine` and its change events.
    #[cfg(target_arch = "wasm32")]
    pub fn attach_browser(&mut self, now: Instant) -> Result<(), String> {
        let watch = browser::BrowserWatch::attach()?;
        let online = watch.current();
        self.browser = Some(watch);
        self.set_online(online, now);
        Ok(())
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{Event, Window};

    pub(super) struct BrowserWatch {
        window: Window,
        observed: Rc<RefCell<Vec<bool>>>,
        on_online: Closure<dyn Fn(Event)>,
        on_offline: Closure<dyn Fn(Event)>,
    }

    impl BrowserWatch {
        pub(super) fn attach() -> Result<Self, String> {
            let window = web_sys::window().ok_or("No window")?;
            let observed: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));

            let seen = observed.clone();
            let on_online = Closure::wrap(Box::new(move |_e: Event| {
                seen.borrow_mut().push(true);
            }) as Box<dyn Fn(Event)>);
            let seen = observed.clone();
            let on_offline = Closure::wrap(Box::new(move |_e: Event| {
                seen.borrow_mut().push(false);
            }) as Box<dyn Fn(Event)>);

            window
                .add_event_listener_with_callback("online", on_online.as_ref().unchecked_ref())
                .map_err(|e| format!("Failed to listen for online: {:?}", e))?;
            window
                .add_event_listener_with_callback("offline", on_offline.as_ref().unchecked_ref())
                .map_err(|e| format!("Failed to listen for offline: {:?}", e))?;

            Ok(Self {
                window,
                observed,
                on_online,
                on_offline,
            })
        }

        pub(super) fn current(&self) -> bool {
            self.window.navigator().on_line()
        }

        pub(super) fn take(&self) -> Vec<bool> {
            std::mem::take(&mut *self.observed.borrow_mut())
        }
    }

    impl Drop for BrowserWatch {
        fn drop(&mut self) {
            let _ = self.window.remove_event_listener_with_callback(
                "online",
                self.on_online.as_ref().unchecked_ref(),
            );
            let _ = self.window.remove_event_listener_with_callback(
                "offline",
                self.on_offline.as_ref().unchecked_ref(),
            );
        }
    }
}
