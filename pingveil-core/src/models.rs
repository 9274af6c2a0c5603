use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::icon::DecodedIcon;

/// Version block of a status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
  /// Label shown by the client when the protocol does not match
  pub name: String,
  /// Protocol number the client compares against its own
  pub protocol: i32,
}

/// One entry of the hover list in the server browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePlayer {
  pub name: String,
  pub id: Uuid,
}

/// Player counts and the optional hover sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
  pub max: u32,
  pub online: u32,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub sample: Vec<SamplePlayer>,
}

/// The status document sent back to a pinging client.
///
/// `description` is a chat component in its JSON form. It is kept as a raw
/// value so text mirrored from a backend passes through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResponse {
  pub version: Version,
  pub players: Players,
  pub description: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub favicon: Option<DecodedIcon>,
}

/// Status document as reported by a backend, before translation.
///
/// Everything except the version block is optional because backends are
/// free to hide player data, the MOTD or the icon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativePingResponse {
  pub version: Version,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub players: Option<Players>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub favicon: Option<String>,
}

/// Backend status, translated and validated. Lives for one ping.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendStatusDescriptor {
  /// `None` when the backend sent no description
  pub motd: Option<Value>,
  pub protocol_version: i32,
  pub version_label: String,
  /// `None` when the backend reported no player data
  pub players: Option<Players>,
  pub favicon: Option<DecodedIcon>,
}

/// What the transport knows about an inbound ping.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPingContext {
  /// Protocol number from the client's handshake
  pub requested_protocol_version: i32,
  /// The reply the transport would send if nothing rewrites it
  pub original_response: PingResponse,
}
