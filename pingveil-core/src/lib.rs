//! Server-list ping rewriting.
//!
//! The entry point is [`PingRewriteEngine`]: hand it the context of an inbound
//! ping and it either mirrors the configured backend or substitutes the static
//! values from the current [`ConfigView`].

mod builder;
mod config;
mod engine;
mod error;
mod fetcher;
mod icon;
mod models;
pub mod text;

pub use builder::{PingResponseBuilder, reconcile_protocol};
pub use config::{ConfigStore, ConfigView, Mode, ProtocolSource};
pub use engine::PingRewriteEngine;
pub use error::{FetchError, IconError};
pub use fetcher::{BackendConnectionRegistry, BackendHandle, BackendStatusFetcher};
pub use icon::{DecodedIcon, IconDecoder};
pub use models::{
  BackendStatusDescriptor, ClientPingContext, NativePingResponse, PingResponse, Players,
  SamplePlayer, Version,
};
pub use text::{TextComponent, parse_markup};
