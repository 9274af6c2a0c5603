//! Operator settings for ping rewriting and the snapshot store they live in.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Where the rewritten response comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Relay the backend's own status
    #[default]
    LiveMirror,
    /// Build the status entirely from [`ConfigView`]
    StaticConfig,
}

/// Which protocol number the rewritten response advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolSource {
    /// The backend's protocol in live mode, `protocol` in static mode
    #[default]
    BackendReported,
    /// Echo the client's handshake protocol so it never shows a version warning
    ClientReported,
}

/// Read-only snapshot of the rewrite settings.
///
/// Counts are passed through as configured; `max_players` may be lower than
/// `online_players`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigView {
    pub mode: Mode,
    pub protocol_source: ProtocolSource,
    /// Markup-encoded MOTD, see [`crate::text::parse_markup`]
    pub motd: String,
    pub version: String,
    pub protocol: i32,
    pub online_players: u32,
    pub max_players: u32,
    /// Base64 image, optionally with a `data:image/<type>;base64,` header
    pub favicon: Option<String>,
}

impl Default for ConfigView {
    fn default() -> Self {
        Self {
            mode: Mode::LiveMirror,
            protocol_source: ProtocolSource::BackendReported,
            motd: "A Minecraft Server".to_string(),
            version: "Spigot 1.8.8".to_string(),
            protocol: 47,
            online_players: 0,
            max_players: 1,
            favicon: None,
        }
    }
}

impl ConfigView {
    /// The configured favicon payload, if it is not blank.
    pub fn favicon_payload(&self) -> Option<&str> {
        self.favicon
            .as_deref()
            .map(str::trim)
            .filter(|payload| !payload.is_empty())
    }
}

/// Publishes immutable [`ConfigView`] snapshots.
///
/// Readers take an `Arc` once per operation and keep it, so a reload never
/// changes the settings an in-flight ping is using.
pub struct ConfigStore {
    tx: watch::Sender<Arc<ConfigView>>,
}

impl ConfigStore {
    pub fn new(view: ConfigView) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(view));
        Self { tx }
    }

    /// The snapshot currently in effect.
    pub fn snapshot(&self) -> Arc<ConfigView> {
        self.tx.borrow().clone()
    }

    /// Replace the current snapshot, returning the one it replaced.
    pub fn reload(&self, view: impl Into<Arc<ConfigView>>) -> Arc<ConfigView> {
        self.tx.send_replace(view.into())
    }

    /// Receiver notified on every reload.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigView>> {
        self.tx.subscribe()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(ConfigView::default())
    }
}
