//! Backend collaborators: a TCP status client and the name → handle registry.

use std::sync::Arc;

use async_trait::async_trait;
use pingveil_core::{BackendConnectionRegistry, BackendHandle, FetchError, NativePingResponse};
use scc::HashMap;
use tokio::net::TcpStream;
use tracing::debug;

use crate::protocol::{self, Handshake, NextState};

/// Conventional protocol number for "pinging to find out the version".
const PING_PROTOCOL_VERSION: i32 = -1;

/// A backend reached over TCP with the vanilla status exchange.
pub struct TcpBackend {
    name: String,
    host: String,
    port: u16,
}

impl TcpBackend {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// Open a fresh connection to the backend.
    pub async fn connect(&self) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl BackendHandle for TcpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request_status(&self) -> Result<NativePingResponse, FetchError> {
        let mut stream = self.connect().await?;

        let handshake = Handshake {
            protocol_version: PING_PROTOCOL_VERSION,
            server_address: self.host.clone(),
            server_port: self.port,
            next_state: NextState::Status,
        };
        protocol::write_frame(&mut stream, &handshake.encode()).await?;
        protocol::write_frame(&mut stream, &protocol::status_request()).await?;

        let body = protocol::read_frame(&mut stream).await?;
        let json = protocol::decode_status_response(&body)?;
        debug!(backend = %self.name, len = json.len(), "received backend status");

        serde_json::from_str(&json).map_err(|e| FetchError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("backend '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Concurrent registry of backend handles keyed by name.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn BackendHandle>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub async fn register(&self, handle: Arc<dyn BackendHandle>) -> Result<(), RegistryError> {
        let name = handle.name().to_string();
        self.backends
            .insert_async(name.clone(), handle)
            .await
            .map_err(|_| RegistryError::AlreadyRegistered(name))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendConnectionRegistry for BackendRegistry {
    async fn lookup(&self, name: &str) -> Option<Arc<dyn BackendHandle>> {
        self.backends.read_async(name, |_, handle| handle.clone()).await
    }
}
