use crate::config::{ConfigView, ProtocolSource};
use crate::icon::DecodedIcon;
use crate::models::{BackendStatusDescriptor, ClientPingContext, PingResponse, Players, Version};
use crate::text::parse_markup;

/// Composes complete [`PingResponse`]s from a live descriptor or from config.
pub struct PingResponseBuilder;

impl PingResponseBuilder {
    /// Response mirroring a backend.
    ///
    /// Motd, favicon and player data are copied only when the backend reported
    /// them; otherwise the original response's values stay in place.
    pub fn from_live(
        descriptor: BackendStatusDescriptor,
        context: &ClientPingContext,
        protocol_source: ProtocolSource,
    ) -> PingResponse {
        let protocol = reconcile_protocol(protocol_source, descriptor.protocol_version, context);
        let original = &context.original_response;
        let players = descriptor
            .players
            .unwrap_or_else(|| original.players.clone());

        PingResponse {
            version: Version {
                name: descriptor.version_label,
                protocol,
            },
            players,
            description: descriptor
                .motd
                .unwrap_or_else(|| original.description.clone()),
            favicon: descriptor.favicon.or_else(|| original.favicon.clone()),
        }
    }

    /// Response built only from operator settings. The sample list is always empty.
    pub fn from_static(
        config: &ConfigView,
        icon: Option<DecodedIcon>,
        context: &ClientPingContext,
    ) -> PingResponse {
        PingResponse {
            version: Version {
                name: config.version.clone(),
                protocol: reconcile_protocol(config.protocol_source, config.protocol, context),
            },
            players: Players {
                max: config.max_players,
                online: config.online_players,
                sample: Vec::new(),
            },
            description: parse_markup(&config.motd).to_value(),
            favicon: icon,
        }
    }
}

/// Pick the protocol number to advertise.
///
/// `advertised` is the backend's protocol in live mode and the configured one
/// in static mode.
pub fn reconcile_protocol(
    source: ProtocolSource,
    advertised: i32,
    context: &ClientPingContext,
) -> i32 {
    match source {
        ProtocolSource::BackendReported => advertised,
        ProtocolSource::ClientReported => context.requested_protocol_version,
    }
}
