//! Per-ping rewrite decisions.
//!
//! [`PingRewriteEngine::handle`] is called once per inbound ping with the
//! config snapshot taken when the ping arrived. In live mode it queries the
//! backend and mirrors it; any failure means the ping is left alone. In static
//! mode it always produces a response, losing at most the favicon.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::builder::PingResponseBuilder;
use crate::config::{ConfigStore, ConfigView, Mode};
use crate::fetcher::BackendStatusFetcher;
use crate::icon::{DecodedIcon, IconDecoder};
use crate::models::{ClientPingContext, PingResponse};

pub struct PingRewriteEngine {
    fetcher: BackendStatusFetcher,
    backend: String,
    config: ConfigStore,
}

impl PingRewriteEngine {
    pub fn new(fetcher: BackendStatusFetcher, backend: impl Into<String>, config: ConfigView) -> Self {
        Self {
            fetcher,
            backend: backend.into(),
            config: ConfigStore::new(config),
        }
    }

    /// Name of the backend mirrored in live mode.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<ConfigView> {
        self.config.snapshot()
    }

    /// Install a new snapshot for pings that arrive from now on and return it.
    pub fn reload(&self, view: ConfigView) -> Arc<ConfigView> {
        let current = Arc::new(view);
        let previous = self.config.reload(current.clone());
        debug!(
            from = ?previous.mode,
            to = ?current.mode,
            "ping rewrite config replaced"
        );
        current
    }

    /// Answer a ping using the current snapshot.
    ///
    /// Returns the original response unchanged when no rewrite happens.
    pub async fn on_ping(&self, context: &ClientPingContext) -> PingResponse {
        let config = self.snapshot();
        match self.handle(context, &config).await {
            Some(response) => response,
            None => context.original_response.clone(),
        }
    }

    /// Decide the response for one ping. `None` means "do not rewrite".
    pub async fn handle(
        &self,
        context: &ClientPingContext,
        config: &ConfigView,
    ) -> Option<PingResponse> {
        match config.mode {
            Mode::LiveMirror => self.mirror_backend(context, config).await,
            Mode::StaticConfig => Some(substitute_static(context, config)),
        }
    }

    async fn mirror_backend(
        &self,
        context: &ClientPingContext,
        config: &ConfigView,
    ) -> Option<PingResponse> {
        match self.fetcher.fetch(&self.backend).await {
            Ok(descriptor) => Some(PingResponseBuilder::from_live(
                descriptor,
                context,
                config.protocol_source,
            )),
            Err(err) => {
                warn!(
                    backend = %self.backend,
                    issued = err.was_issued(),
                    %err,
                    "error pinging target server, leaving ping response unchanged"
                );
                None
            }
        }
    }
}

fn substitute_static(context: &ClientPingContext, config: &ConfigView) -> PingResponse {
    PingResponseBuilder::from_static(config, configured_icon(config), context)
}

fn configured_icon(config: &ConfigView) -> Option<DecodedIcon> {
    let payload = config.favicon_payload()?;
    match IconDecoder::decode(payload) {
        Ok(icon) => Some(icon),
        Err(err) => {
            warn!(%err, "favicon error, sending static response without an icon");
            None
        }
    }
}
