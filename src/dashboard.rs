// =============================================================================
// Dashboard State - the production Display Sink
// =============================================================================
//
// Holds the latest display values and ties them together into a single
// serialisable snapshot for the REST API and the WebSocket push feed.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for every mutable field.
//   - The chart frame slot is shared with the SvgSurface that fills it.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::chart::FrameSlot;
use crate::display::DisplaySink;
use crate::types::{
    ChangeClass, ConnectionState, ServiceStatus, StatsDisplay, Symbol, TickerDisplay,
};

// =============================================================================
// Per-symbol view
// =============================================================================

/// What one symbol's card on the dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolView {
    pub connection: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_class: Option<ChangeClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_text: Option<String>,
}

impl SymbolView {
    fn new() -> Self {
        Self {
            connection: ConnectionState::Connecting,
            price: None,
            price_text: None,
            change_percent: None,
            change_text: None,
            change_class: None,
            range_text: None,
        }
    }
}

// =============================================================================
// DashboardState
// =============================================================================

pub struct DashboardState {
    /// Monotonically increasing version counter. Incremented on every display
    /// update; the WebSocket feed uses it to detect changes.
    state_version: AtomicU64,

    symbols: RwLock<BTreeMap<Symbol, SymbolView>>,
    status: RwLock<ServiceStatus>,
    stats: RwLock<StatsDisplay>,
    chart_symbol: Symbol,
    chart: FrameSlot,
    start_time: std::time::Instant,
}

impl DashboardState {
    /// Everything starts offline until the first poll says otherwise.
    pub fn new<'a>(
        symbols: impl IntoIterator<Item = &'a Symbol>,
        chart_symbol: impl Into<Symbol>,
        chart: FrameSlot,
    ) -> Self {
        let symbols = symbols
            .into_iter()
            .map(|s| (s.clone(), SymbolView::new()))
            .collect();

        Self {
            state_version: AtomicU64::new(1),
            symbols: RwLock::new(symbols),
            status: RwLock::new(ServiceStatus::offline()),
            stats: RwLock::new(StatsDisplay::Unavailable),
            chart_symbol: chart_symbol.into(),
            chart,
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Readers ─────────────────────────────────────────────────────────

    /// The last presented chart frame, if any.
    pub fn chart_svg(&self) -> Option<String> {
        self.chart.read().clone()
    }

    pub fn status(&self) -> ServiceStatus {
        *self.status.read()
    }

    pub fn stats(&self) -> StatsDisplay {
        self.stats.read().clone()
    }

    pub fn symbol_view(&self, symbol: &str) -> Option<SymbolView> {
        self.symbols.read().get(symbol).cloned()
    }

    /// Build a complete, serialisable snapshot of the dashboard.
    pub fn build_snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_s: self.start_time.elapsed().as_secs(),
            status: self.status(),
            stats: self.stats(),
            symbols: self.symbols.read().clone(),
            chart_symbol: self.chart_symbol.clone(),
            chart_ready: self.chart.read().is_some(),
        }
    }
}

impl DisplaySink for DashboardState {
    fn show_ticker(&self, ticker: &TickerDisplay) {
        {
            let mut symbols = self.symbols.write();
            let Some(view) = symbols.get_mut(&ticker.symbol) else {
                debug!(symbol = %ticker.symbol, "no dashboard card for symbol");
                return;
            };
            view.price = Some(ticker.price);
            view.price_text = Some(ticker.price_text());
            view.change_percent = Some(ticker.change_percent);
            view.change_text = Some(ticker.change_text());
            view.change_class = Some(ticker.change_class);
            view.range_text = Some(ticker.range_text());
        }
        self.increment_version();
    }

    fn show_status(&self, status: &ServiceStatus) {
        *self.status.write() = *status;
        self.increment_version();
    }

    fn show_stats(&self, stats: &StatsDisplay) {
        *self.stats.write() = stats.clone();
        self.increment_version();
    }

    fn show_connection(&self, symbol: &str, state: ConnectionState) {
        if let Some(view) = self.symbols.write().get_mut(symbol) {
            view.connection = state;
        }
        self.increment_version();
    }
}

// =============================================================================
// Serialisable snapshot
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_s: u64,
    pub status: ServiceStatus,
    pub stats: StatsDisplay,
    pub symbols: BTreeMap<Symbol, SymbolView>,
    pub chart_symbol: Symbol,
    pub chart_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiStatus, LinkStatus, TradingStats};
    use std::sync::Arc;

    fn dashboard() -> DashboardState {
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        DashboardState::new(&symbols, "BTCUSDT", Arc::new(RwLock::new(None)))
    }

    #[test]
    fn starts_offline_and_without_prices() {
        let d = dashboard();
        assert_eq!(d.status(), ServiceStatus::offline());
        assert_eq!(d.stats(), StatsDisplay::Unavailable);
        let view = d.symbol_view("BTCUSDT").unwrap();
        assert_eq!(view.connection, ConnectionState::Connecting);
        assert!(view.price.is_none());
        assert!(d.chart_svg().is_none());
    }

    #[test]
    fn ticker_updates_card_and_bumps_version() {
        let d = dashboard();
        let before = d.current_state_version();
        d.show_ticker(&TickerDisplay {
            symbol: "ETHUSDT".into(),
            price: 2650.0,
            change_percent: 1.25,
            change_class: ChangeClass::Positive,
            low: 2600.0,
            high: 2650.0,
        });
        assert!(d.current_state_version() > before);

        let view = d.symbol_view("ETHUSDT").unwrap();
        assert_eq!(view.price_text.as_deref(), Some("$2650.00"));
        assert_eq!(view.change_text.as_deref(), Some("1.25%"));
        assert_eq!(view.change_class, Some(ChangeClass::Positive));
        assert_eq!(view.range_text.as_deref(), Some("$2600.00 - $2650.00"));
    }

    #[test]
    fn unknown_symbol_is_ignored() {
        let d = dashboard();
        let before = d.current_state_version();
        d.show_ticker(&TickerDisplay {
            symbol: "DOGEUSDT".into(),
            price: 0.1,
            change_percent: 0.0,
            change_class: ChangeClass::Neutral,
            low: 0.1,
            high: 0.1,
        });
        assert_eq!(d.current_state_version(), before);
        assert!(d.symbol_view("DOGEUSDT").is_none());
    }

    #[test]
    fn status_and_stats_round_trip_into_snapshot() {
        let d = dashboard();
        d.show_status(&ServiceStatus::online());
        d.show_stats(&StatsDisplay::Available(TradingStats {
            active_orders: Some(3),
            ..TradingStats::default()
        }));
        d.show_connection("BTCUSDT", ConnectionState::Open);

        let snap = d.build_snapshot();
        assert_eq!(snap.status.api, ApiStatus::Online);
        assert_eq!(snap.status.cache, LinkStatus::Connected);
        assert_eq!(snap.symbols["BTCUSDT"].connection, ConnectionState::Open);
        assert!(!snap.chart_ready);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["stats"]["state"], "available");
        assert_eq!(json["stats"]["stats"]["active_orders"], 3);
        assert_eq!(json["status"]["api"], "Online");
    }
}
