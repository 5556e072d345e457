//! Presentation model derived from session state.
//!
//! Nothing here mutates the session; a UI renders these values as-is.

use crate::autosave::SaveState;
use crate::init::InitState;
use crate::session::{SceneAddress, SessionStatus};

/// Banner shown while writes are not attempted automatically.
pub const OFFLINE_BANNER: &str = "Offline Mode - Changes not saved automatically";

/// Save status pill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusIndicator {
    pub text: &'static str,
    pub class_name: &'static str,
    pub icon: &'static str,
}

impl StatusIndicator {
    pub fn derive(status: &SessionStatus) -> Self {
        if status.local_only {
            return Self::new("Offline Mode", "status-offline", "🔌");
        }
        if !status.connectivity.is_online() {
            return Self::new("Disconnected", "status-offline", "📡");
        }
        match status.save_state {
            SaveState::Saving => Self::new("Saving...", "status-saving", "💾"),
            SaveState::Saved => Self::new("Saved", "status-saved", "✅"),
            SaveState::Failed => Self::new("Save Failed", "status-failed", "⚠️"),
            SaveState::Offline => Self::new("Offline", "status-offline", "🔒"),
            SaveState::Ready => Self::new("Ready", "status-ready", "⚪"),
        }
    }

    fn new(text: &'static str, class_name: &'static str, icon: &'static str) -> Self {
        Self {
            text,
            class_name,
            icon,
        }
    }
}

/// Document store connection pill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemotePill {
    pub connected: bool,
}

impl RemotePill {
    pub fn derive(status: &SessionStatus) -> Self {
        Self {
            connected: status.connectivity.is_online(),
        }
    }

    pub fn text(&self) -> &'static str {
        if self.connected {
            "Store Connected"
        } else {
            "Store Disconnected"
        }
    }

    pub fn class_name(&self) -> &'static str {
        if self.connected { "status-saved" } else { "status-offline" }
    }

    pub fn icon(&self) -> &'static str {
        if self.connected { "🟢" } else { "🔴" }
    }
}

/// Header buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderAction {
    Share,
    New,
    Save,
}

/// Links offered by the share dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub edit: String,
    pub view_only: String,
}

impl ShareLinks {
    pub fn new(origin: &str, scene_id: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        let edit = SceneAddress::remote(scene_id).path();
        let view_only = SceneAddress::remote(scene_id).with_view_only(true).path();
        Self {
            edit: format!("{}{}", origin, edit),
            view_only: format!("{}{}", origin, view_only),
        }
    }
}

/// Which full-window screen to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Error { message: String },
    Editor,
}

/// Everything the UI shows, derived in one place.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellModel {
    pub screen: Screen,
    pub status: StatusIndicator,
    pub remote: RemotePill,
    pub actions: Vec<HeaderAction>,
    pub share: Option<ShareLinks>,
    pub offline_banner: Option<&'static str>,
    pub show_toolbar: bool,
    pub show_properties: bool,
}

impl ShellModel {
    /// Derive the model. `has_selection` controls the properties panel.
    pub fn derive(status: &SessionStatus, origin: &str, has_selection: bool) -> Self {
        let screen = if status.loading && !status.local_only {
            Screen::Loading
        } else if let Some(message) = status.init_error {
            Screen::Error {
                message: message.to_string(),
            }
        } else {
            Screen::Editor
        };

        let remote_scene = status.scene_id.as_deref().filter(|_| !status.local_only);
        let mut actions = Vec::with_capacity(3);
        if remote_scene.is_some() {
            actions.push(HeaderAction::Share);
        }
        actions.push(HeaderAction::New);
        if remote_scene.is_some() && !status.view_only {
            actions.push(HeaderAction::Save);
        }

        let editable = !status.view_only && status.init == InitState::Ready;

        Self {
            screen,
            status: StatusIndicator::derive(status),
            remote: RemotePill::derive(status),
            actions,
            share: remote_scene.map(|id| ShareLinks::new(origin, id)),
            offline_banner: status
                .connectivity
                .is_effectively_offline()
                .then_some(OFFLINE_BANNER),
            show_toolbar: editable,
            show_properties: editable && has_selection,
        }
    }
}
