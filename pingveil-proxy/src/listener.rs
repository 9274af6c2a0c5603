//! Minecraft-facing listener.
//!
//! Status connections are answered here, through the rewrite engine. Login
//! and transfer connections are piped to the backend untouched.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use pingveil_core::{ClientPingContext, PingResponse, Players, TextComponent, Version};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::backend::TcpBackend;
use crate::protocol::{self, Handshake, NextState, PacketReader, ProtocolError};

/// How the proxy answers when a ping is not rewritten, and where logins go.
#[derive(Clone)]
pub struct ListenerSettings {
    pub fallback_motd: String,
    pub fallback_max_players: u32,
    pub fallback_version_name: String,
    pub handshake_timeout: Duration,
    /// Backend for login passthrough. Logins are dropped when unset.
    pub upstream: Option<Arc<TcpBackend>>,
}

impl ListenerSettings {
    /// The proxy's own reply for a client speaking `protocol`.
    pub fn original_response(&self, protocol: i32, online: u32) -> PingResponse {
        PingResponse {
            version: Version {
                name: self.fallback_version_name.clone(),
                protocol,
            },
            players: Players {
                max: self.fallback_max_players,
                online,
                sample: Vec::new(),
            },
            description: TextComponent::plain(self.fallback_motd.as_str()).to_value(),
            favicon: None,
        }
    }
}

/// Accept connections forever, one task per connection.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "status listener ready");
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "failed to accept connection");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            match handle_connection(stream, peer, &state).await {
                Ok(()) => {}
                Err(err) if err.is_disconnect() => debug!(%peer, "client hung up"),
                Err(err) => debug!(%peer, %err, "connection closed with error"),
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: &AppState,
) -> Result<(), ProtocolError> {
    let frame = timeout(
        state.listener.handshake_timeout,
        protocol::read_frame(&mut stream),
    )
    .await
    .map_err(|_| ProtocolError::HandshakeTimeout)??;
    let handshake = Handshake::decode(&frame)?;
    debug!(
        %peer,
        protocol = handshake.protocol_version,
        next_state = ?handshake.next_state,
        "received handshake"
    );

    match handshake.next_state {
        NextState::Status => answer_status(stream, &handshake, state).await,
        NextState::Login | NextState::Transfer => forward_login(stream, peer, &frame, state).await,
    }
}

async fn answer_status(
    mut stream: TcpStream,
    handshake: &Handshake,
    state: &AppState,
) -> Result<(), ProtocolError> {
    let wait = state.listener.handshake_timeout;
    let request = timeout(wait, protocol::read_frame(&mut stream))
        .await
        .map_err(|_| ProtocolError::HandshakeTimeout)??;
    PacketReader::new(&request).expect_id(protocol::STATUS_REQUEST_ID)?;

    let context = ClientPingContext {
        requested_protocol_version: handshake.protocol_version,
        original_response: state
            .listener
            .original_response(handshake.protocol_version, state.active_sessions()),
    };
    let response = state.engine.on_ping(&context).await;
    let json = serde_json::to_string(&response)?;
    protocol::write_frame(&mut stream, &protocol::status_response(&json)).await?;

    // Clients may close right after the status without pinging.
    let body = match timeout(wait, protocol::read_frame(&mut stream)).await {
        Ok(Ok(body)) => body,
        Ok(Err(err)) if err.is_disconnect() => return Ok(()),
        Ok(Err(err)) => return Err(err),
        Err(_) => return Ok(()),
    };
    let mut reader = PacketReader::new(&body);
    reader.expect_id(protocol::PING_ID)?;
    let payload = reader.i64()?;
    protocol::write_frame(&mut stream, &protocol::pong(payload)).await
}

async fn forward_login(
    mut client: TcpStream,
    peer: SocketAddr,
    handshake_frame: &[u8],
    state: &AppState,
) -> Result<(), ProtocolError> {
    let Some(upstream) = state.listener.upstream.as_ref() else {
        debug!(%peer, "no upstream configured, dropping login");
        return Ok(());
    };

    let mut server = upstream.connect().await?;
    protocol::write_frame(&mut server, handshake_frame).await?;

    let _session = SessionGuard::enter(state.sessions());
    debug!(%peer, "forwarding login to backend");
    let (sent, received) = tokio::io::copy_bidirectional(&mut client, &mut server).await?;
    debug!(%peer, sent, received, "login session ended");
    Ok(())
}

/// Counts a passthrough session for as long as it is alive.
struct SessionGuard<'a> {
    counter: &'a AtomicU32,
}

impl<'a> SessionGuard<'a> {
    fn enter(counter: &'a AtomicU32) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> ListenerSettings {
        ListenerSettings {
            fallback_motd: "A Minecraft Proxy".to_string(),
            fallback_max_players: 500,
            fallback_version_name: "pingveil".to_string(),
            handshake_timeout: Duration::from_secs(1),
            upstream: None,
        }
    }

    #[test]
    fn test_original_response_uses_client_protocol() {
        let response = settings().original_response(763, 4);
        assert_eq!(response.version.protocol, 763);
        assert_eq!(response.version.name, "pingveil");
        assert_eq!(response.players.online, 4);
        assert_eq!(response.players.max, 500);
        assert_eq!(response.description, json!({ "text": "A Minecraft Proxy" }));
        assert!(response.favicon.is_none());
    }

    #[test]
    fn test_session_guard_counts() {
        let counter = AtomicU32::new(0);
        {
            let _a = SessionGuard::enter(&counter);
            let _b = SessionGuard::enter(&counter);
            assert_eq!(counter.load(Ordering::Relaxed), 2);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
