use std::sync::Arc;

use tracing::{debug, info};

use crate::types::{ConnectionState, ServiceStatus, StatsDisplay, TickerDisplay};

/// Fire-and-forget receiver of everything the dashboard shows.
pub trait DisplaySink: Send + Sync {
    fn show_ticker(&self, ticker: &TickerDisplay);
    fn show_status(&self, status: &ServiceStatus);
    fn show_stats(&self, stats: &StatsDisplay);
    fn show_connection(&self, symbol: &str, state: ConnectionState);
}

pub type SharedSink = Arc<dyn DisplaySink>;

/// Writes every display update to the log. Useful when running headless.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DisplaySink for LogSink {
    fn show_ticker(&self, ticker: &TickerDisplay) {
        info!(
            symbol = %ticker.symbol,
            price = %ticker.price_text(),
            change = %ticker.change_text(),
            class = %ticker.change_class,
            range = %ticker.range_text(),
            "ticker"
        );
    }

    fn show_status(&self, status: &ServiceStatus) {
        info!(api = ?status.api, database = ?status.database, cache = ?status.cache, "service status");
    }

    fn show_stats(&self, stats: &StatsDisplay) {
        debug!(stats = ?stats, "trading stats");
    }

    fn show_connection(&self, symbol: &str, state: ConnectionState) {
        debug!(symbol = %symbol, state = %state, "connection state");
    }
}
