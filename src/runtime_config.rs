// =============================================================================
// Runtime Configuration - feed, polling and dashboard settings
// =============================================================================
//
// Loaded once at startup from a JSON file. Every field carries
// `#[serde(default)]` so that a partial file, or an older file missing newer
// fields, still loads. Environment overrides are applied by `main`.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::market_data::price_store::DEFAULT_HISTORY_CAPACITY;
use crate::market_data::ReconnectPolicy;
use crate::types::Symbol;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<Symbol> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "ADAUSDT".to_string(),
        "DOTUSDT".to_string(),
    ]
}

fn default_provider_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_tickers_path() -> String {
    "/api/v1/market/tickers".to_string()
}

fn default_stats_path() -> String {
    "/api/v1/stats".to_string()
}

fn default_ws_base_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_render_interval_ms() -> u64 {
    1_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_bind_addr() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_channel_capacity() -> usize {
    1_024
}

fn default_chart_symbol() -> Symbol {
    "BTCUSDT".to_string()
}

fn default_chart_width() -> u32 {
    800
}

fn default_chart_height() -> u32 {
    300
}

// =============================================================================
// ChartConfig
// =============================================================================

/// Which symbol the chart follows and the size of its drawing surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_symbol")]
    pub symbol: Symbol,

    #[serde(default = "default_chart_width")]
    pub width: u32,

    #[serde(default = "default_chart_height")]
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            symbol: default_chart_symbol(),
            width: default_chart_width(),
            height: default_chart_height(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Feed -----------------------------------------------------------------

    /// Symbols with a live subscription. Fixed for the life of the process.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<Symbol>,

    /// Base of the live feed; each symbol streams from `{base}/prices/{symbol}`.
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,

    /// Prices kept per symbol.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Buffer of the channel feeding the manager task.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    // --- Data provider --------------------------------------------------------

    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_tickers_path")]
    pub tickers_path: String,

    #[serde(default = "default_stats_path")]
    pub stats_path: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    // --- Chart & dashboard ----------------------------------------------------

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,

    /// Address of the dashboard HTTP/WebSocket server.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            ws_base_url: default_ws_base_url(),
            history_capacity: default_history_capacity(),
            reconnect: ReconnectPolicy::default(),
            channel_capacity: default_channel_capacity(),
            provider_base_url: default_provider_base_url(),
            health_path: default_health_path(),
            tickers_path: default_tickers_path(),
            stats_path: default_stats_path(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            chart: ChartConfig::default(),
            render_interval_ms: default_render_interval_ms(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Replace the symbol list from a comma-separated override.
    pub fn set_symbols_from_list(&mut self, list: &str) {
        self.symbols = list.split(',').map(str::to_string).collect();
    }

    /// Clean up values that would make the feed misbehave.
    ///
    /// Symbols are trimmed, upper-cased and de-duplicated; intervals, the
    /// reconnect delay and the history capacity get floors; the chart falls back to the first tracked
    /// symbol when its own symbol is not tracked.
    pub fn normalized(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.symbols.len());
        for raw in &self.symbols {
            let symbol = raw.trim().to_ascii_uppercase();
            if !symbol.is_empty() && !seen.contains(&symbol) {
                seen.push(symbol);
            }
        }
        if seen.is_empty() {
            warn!("no symbols configured, using defaults");
            seen = default_symbols();
        }
        self.symbols = seen;

        self.history_capacity = self.history_capacity.max(2);
        self.channel_capacity = self.channel_capacity.max(16);
        self.poll_interval_ms = self.poll_interval_ms.max(100);
        self.render_interval_ms = self.render_interval_ms.max(16);
        self.request_timeout_ms = self.request_timeout_ms.max(100);
        self.reconnect.delay_ms = self.reconnect.delay_ms.max(100);
        self.chart.width = self.chart.width.max(1);
        self.chart.height = self.chart.height.max(1);

        self.chart.symbol = self.chart.symbol.trim().to_ascii_uppercase();
        if !self.symbols.contains(&self.chart.symbol) {
            let fallback = self.symbols[0].clone();
            warn!(
                chart_symbol = %self.chart.symbol,
                fallback = %fallback,
                "chart symbol is not tracked, charting the first symbol instead"
            );
            self.chart.symbol = fallback;
        }

        self
    }
}
