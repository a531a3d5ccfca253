// =============================================================================
// tickerwatch - Main Entry Point
// =============================================================================
//
// Starts one live price stream per configured symbol, the snapshot poller and
// the chart renderer, and serves the resulting dashboard over HTTP. An empty
// bind address runs headless and logs display updates instead.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tickerwatch::api;
use tickerwatch::chart::SvgSurface;
use tickerwatch::dashboard::DashboardState;
use tickerwatch::display::{LogSink, SharedSink};
use tickerwatch::feed_manager::Feed;
use tickerwatch::market_data::WsTransport;
use tickerwatch::provider::HttpDataProvider;
use tickerwatch::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "tickerwatch.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("tickerwatch starting up");

    let config_path =
        std::env::var("TICKERWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(syms) = std::env::var("TICKERWATCH_SYMBOLS") {
        config.set_symbols_from_list(&syms);
    }
    if let Ok(url) = std::env::var("TICKERWATCH_PROVIDER_URL") {
        config.provider_base_url = url;
    }
    if let Ok(url) = std::env::var("TICKERWATCH_WS_URL") {
        config.ws_base_url = url;
    }
    if let Ok(addr) = std::env::var("TICKERWATCH_BIND_ADDR") {
        config.bind_addr = addr;
    }
    let config = config.normalized();

    info!(
        symbols = ?config.symbols,
        provider = %config.provider_base_url,
        stream = %config.ws_base_url,
        chart_symbol = %config.chart.symbol,
        "Configured feed"
    );

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let surface = SvgSurface::new(config.chart.width, config.chart.height);
    let provider = Arc::new(
        HttpDataProvider::new(&config).context("failed to build data provider client")?,
    );

    // ── 3. Dashboard API (optional) ──────────────────────────────────────
    let server_token = CancellationToken::new();
    let (sink, server) = if config.bind_addr.trim().is_empty() {
        info!("No bind address configured, running headless");
        (Arc::new(LogSink) as SharedSink, None)
    } else {
        let dashboard = Arc::new(DashboardState::new(
            &config.symbols,
            config.chart.symbol.clone(),
            surface.frame_slot(),
        ));
        let listener = tokio::net::TcpListener::bind(&config.bind_addr)
            .await
            .with_context(|| format!("failed to bind dashboard API on {}", config.bind_addr))?;
        info!(addr = %config.bind_addr, "Dashboard API listening");

        let app = api::rest::router(Arc::clone(&dashboard));
        let token = server_token.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        });
        (dashboard as SharedSink, Some(server))
    };

    // ── 4. Feed ──────────────────────────────────────────────────────────
    let feed = Feed::start(&config, Arc::new(WsTransport), provider, sink, surface);

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    warn!("Shutdown signal received - closing streams");

    feed.shutdown().await;

    server_token.cancel();
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Dashboard API failed"),
            Err(e) => error!(error = %e, "Dashboard API task panicked"),
        }
    }

    info!("tickerwatch shut down complete.");
    Ok(())
}
