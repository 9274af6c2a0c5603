use anyhow::Context;
use pingveil_core::{BackendStatusFetcher, PingRewriteEngine};
use pingveil_proxy::backend::{BackendRegistry, TcpBackend};
use pingveil_proxy::listener::{self, ListenerSettings};
use pingveil_proxy::{AppState, RateLimitConfig, create_app, rewrite};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = "debug";
    #[cfg(not(debug_assertions))]
    let log_level = "info";

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting pingveil...");

    let config = pingveil_proxy::config::Config::from_env();
    tracing::info!(
        "Configuration: listen={}, admin_port={}, backend={}@{}:{}, fetch_timeout={}ms, rewrite_config={}",
        config.listen_addr,
        config.admin_port,
        config.backend_name,
        config.backend_host,
        config.backend_port,
        config.fetch_timeout.as_millis(),
        config.rewrite_config_path.display()
    );

    let view = rewrite::load_or_init(&config.rewrite_config_path)
        .await
        .context("loading ping rewrite config")?;

    let upstream = Arc::new(TcpBackend::new(
        config.backend_name.clone(),
        config.backend_host.clone(),
        config.backend_port,
    ));
    let registry = Arc::new(BackendRegistry::new());
    registry.register(upstream.clone()).await?;

    let fetcher = BackendStatusFetcher::new(registry, config.fetch_timeout);
    let engine = PingRewriteEngine::new(fetcher, config.backend_name.clone(), view);
    let settings = ListenerSettings {
        fallback_motd: config.fallback_motd.clone(),
        fallback_max_players: config.fallback_max_players,
        fallback_version_name: config.fallback_version_name.clone(),
        handshake_timeout: config.handshake_timeout,
        upstream: Some(upstream),
    };
    let state = Arc::new(AppState::new(
        engine,
        config.rewrite_config_path.clone(),
        settings,
    ));

    let rate_limit = RateLimitConfig {
        reload_per_sec: config.rate_limit_reload_per_sec,
        reload_burst: config.rate_limit_reload_burst,
        general_per_sec: config.rate_limit_general_per_sec,
        general_burst: config.rate_limit_general_burst,
    };
    let app = create_app(
        state.clone(),
        config.request_body_limit,
        config.request_timeout,
        rate_limit,
    );

    let admin_addr = format!("0.0.0.0:{}", config.admin_port);
    let admin_listener = TcpListener::bind(&admin_addr)
        .await
        .with_context(|| format!("binding admin port {admin_addr}"))?;
    tracing::info!("Admin surface listening on {}", admin_addr);

    let game_listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    tokio::spawn(log_reloads(state.clone()));

    tokio::select! {
        result = axum::serve(admin_listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            if let Err(e) = result {
                tracing::error!("Admin server error: {}", e);
            }
        }
        result = listener::serve(game_listener, state.clone()) => {
            if let Err(e) = result {
                tracing::error!("Status listener error: {}", e);
            }
        }
        _ = reload_on_hangup(state.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}

/// Log every snapshot that gets published, whatever triggered it.
async fn log_reloads(state: Arc<AppState>) {
    let mut rx = state.engine.config().subscribe();
    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        tracing::info!(
            mode = ?view.mode,
            protocol_source = ?view.protocol_source,
            favicon = view.favicon_payload().is_some(),
            "new ping rewrite snapshot in effect"
        );
    }
}

/// Reload the rewrite config whenever the process receives SIGHUP.
#[cfg(unix)]
async fn reload_on_hangup(state: Arc<AppState>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::warn!("SIGHUP reload unavailable: {}", e);
            return std::future::pending().await;
        }
    };
    while hangup.recv().await.is_some() {
        if let Err(e) = state.reload_rewrite_config().await {
            tracing::error!("Reload on SIGHUP failed, keeping current settings: {}", e);
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_state: Arc<AppState>) {
    std::future::pending().await
}
