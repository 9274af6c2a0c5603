pub mod backend;
pub mod config;
mod error;
pub mod listener;
pub mod protocol;
pub mod rewrite;
mod routes;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use pingveil_core::{ConfigView, PingRewriteEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::listener::ListenerSettings;
use crate::rewrite::ConfigError;

/// Shared by the status listener and the admin surface.
pub struct AppState {
    pub engine: PingRewriteEngine,
    pub rewrite_config_path: PathBuf,
    pub listener: ListenerSettings,
    sessions: AtomicU32,
}

impl AppState {
    pub fn new(
        engine: PingRewriteEngine,
        rewrite_config_path: impl Into<PathBuf>,
        listener: ListenerSettings,
    ) -> Self {
        Self {
            engine,
            rewrite_config_path: rewrite_config_path.into(),
            listener,
            sessions: AtomicU32::new(0),
        }
    }

    /// Players currently passed through to the backend.
    pub fn active_sessions(&self) -> u32 {
        self.sessions.load(Ordering::Relaxed)
    }

    pub(crate) fn sessions(&self) -> &AtomicU32 {
        &self.sessions
    }

    /// Re-read the rewrite config file and publish it. On failure the current
    /// snapshot stays in effect.
    pub async fn reload_rewrite_config(&self) -> Result<Arc<ConfigView>, ConfigError> {
        let view = rewrite::load(&self.rewrite_config_path).await?;
        Ok(self.engine.reload(view))
    }
}

/// Rate limiting configuration for the admin surface
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for /reload
    pub reload_per_sec: u64,
    /// Burst size for /reload
    pub reload_burst: u32,
    /// Requests per second for read-only endpoints
    pub general_per_sec: u64,
    /// Burst size for read-only endpoints
    pub general_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reload_per_sec: 1,
            reload_burst: 5,
            general_per_sec: 10,
            general_burst: 20,
        }
    }
}

/// Create the admin router over the shared state
pub fn create_app(
    state: Arc<AppState>,
    request_body_limit: usize,
    request_timeout: Duration,
    rate_limit: RateLimitConfig,
) -> Router {
    // Reloading touches the filesystem, keep it strict
    let reload_governor = GovernorConfigBuilder::default()
        .per_second(rate_limit.reload_per_sec)
        .burst_size(rate_limit.reload_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .unwrap();

    let general_governor = GovernorConfigBuilder::default()
        .per_second(rate_limit.general_per_sec)
        .burst_size(rate_limit.general_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .unwrap();

    let reload_routes = Router::new()
        .route("/reload", post(routes::reload))
        .layer(GovernorLayer::new(reload_governor));

    let general_routes = Router::new()
        .route("/status", get(routes::status))
        .layer(GovernorLayer::new(general_governor));

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .merge(reload_routes)
        .merge(general_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(request_body_limit))
        .with_state(state)
}
