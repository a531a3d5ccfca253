// =============================================================================
// Shared types used across the tickerwatch feed
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exchange symbol such as `BTCUSDT`. Always upper-case once normalised.
pub type Symbol = String;

/// Where a ticker update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateSource {
    Stream,
    Poll,
}

impl std::fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Poll => write!(f, "poll"),
        }
    }
}

/// A single observed price for one symbol, stamped on arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerUpdate {
    pub symbol: Symbol,
    pub price: f64,
    pub received_at: DateTime<Utc>,
    pub source: UpdateSource,
}

impl TickerUpdate {
    pub fn new(symbol: impl Into<Symbol>, price: f64, source: UpdateSource) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            received_at: Utc::now(),
            source,
        }
    }
}

/// Lifecycle of one live stream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    ReconnectPending,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
            Self::ReconnectPending => write!(f, "ReconnectPending"),
        }
    }
}

/// Direction of the last price move, derived from the rounded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeClass {
    Positive,
    Negative,
    Neutral,
}

impl ChangeClass {
    /// Classify an already-rounded percent change. `-0.0` is neutral.
    pub fn from_change(change_percent: f64) -> Self {
        if change_percent > 0.0 {
            Self::Positive
        } else if change_percent < 0.0 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// What the display shows for one symbol after an accepted update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerDisplay {
    pub symbol: Symbol,
    pub price: f64,
    pub change_percent: f64,
    pub change_class: ChangeClass,
    /// Lowest price in the rolling window, this update included.
    pub low: f64,
    /// Highest price in the rolling window, this update included.
    pub high: f64,
}

impl TickerDisplay {
    /// `$1234.56`
    pub fn price_text(&self) -> String {
        format!("${:.2}", self.price)
    }

    /// `1.23%`
    pub fn change_text(&self) -> String {
        format!("{:.2}%", self.change_percent)
    }

    /// `$1200.00 - $1250.00`
    pub fn range_text(&self) -> String {
        format!("${:.2} - ${:.2}", self.low, self.high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// Service health as shown on the dashboard status panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub api: ApiStatus,
    pub database: LinkStatus,
    pub cache: LinkStatus,
}

impl ServiceStatus {
    pub fn online() -> Self {
        Self {
            api: ApiStatus::Online,
            database: LinkStatus::Connected,
            cache: LinkStatus::Connected,
        }
    }

    pub fn offline() -> Self {
        Self {
            api: ApiStatus::Offline,
            database: LinkStatus::Disconnected,
            cache: LinkStatus::Disconnected,
        }
    }
}

/// Aggregate counters reported by the data provider. Values are opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    #[serde(default)]
    pub active_orders: Option<u64>,
    #[serde(default)]
    pub trades_today: Option<u64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default, alias = "cpu_usage")]
    pub cpu_usage_pct: Option<f64>,
    #[serde(default, alias = "memory_usage")]
    pub memory_usage_pct: Option<f64>,
    #[serde(default, alias = "response_time")]
    pub response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "stats", rename_all = "lowercase")]
pub enum StatsDisplay {
    Available(TradingStats),
    Unavailable,
}

/// Everything that flows into the feed manager task. Stream connections and
/// the snapshot poller only ever talk to the manager through these.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Ticker(TickerUpdate),
    Connection {
        symbol: Symbol,
        state: ConnectionState,
    },
    Health(ServiceStatus),
    Stats(StatsDisplay),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_zero_is_neutral() {
        assert_eq!(ChangeClass::from_change(-0.0), ChangeClass::Neutral);
        assert_eq!(ChangeClass::from_change(0.0), ChangeClass::Neutral);
        assert_eq!(ChangeClass::from_change(0.01), ChangeClass::Positive);
        assert_eq!(ChangeClass::from_change(-0.01), ChangeClass::Negative);
    }

    #[test]
    fn display_text_uses_two_decimals() {
        let display = TickerDisplay {
            symbol: "BTCUSDT".into(),
            price: 43250.5,
            change_percent: -1.5,
            change_class: ChangeClass::Negative,
            low: 43000.0,
            high: 44012.345,
        };
        assert_eq!(display.price_text(), "$43250.50");
        assert_eq!(display.change_text(), "-1.50%");
        assert_eq!(display.range_text(), "$43000.00 - $44012.35");
    }

    #[test]
    fn stats_accept_alternate_field_names() {
        let json = r#"{ "active_orders": 42, "cpu_usage": 31.0, "response_time": 18 }"#;
        let stats: TradingStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.active_orders, Some(42));
        assert_eq!(stats.cpu_usage_pct, Some(31.0));
        assert_eq!(stats.response_time_ms, Some(18.0));
        assert_eq!(stats.trades_today, None);
    }
}
