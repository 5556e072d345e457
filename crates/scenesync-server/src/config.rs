//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Where scene files live. `None` keeps scenes in memory only.
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            data_dir: default_data_dir(),
        }
    }
}

impl ServerConfig {
    /// Read `SCENESYNC_ADDR` and `SCENESYNC_DATA_DIR`.
    ///
    /// An empty `SCENESYNC_DATA_DIR` disables persistence.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let addr = match lookup("SCENESYNC_ADDR") {
            Some(value) => value.parse().unwrap_or_else(|e| {
                warn!("Ignoring SCENESYNC_ADDR {:?}: {}", value, e);
                default_addr()
            }),
            None => default_addr(),
        };
        let data_dir = match lookup("SCENESYNC_DATA_DIR") {
            Some(value) if value.is_empty() => None,
            Some(value) => Some(PathBuf::from(value)),
            None => default_data_dir(),
        };
        Self { addr, data_dir }
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3030))
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("scenesync").join("scenes"))
}
