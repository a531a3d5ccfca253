//! Real-time market-data feed: one self-healing live subscription per symbol,
//! a periodic REST snapshot poller, a bounded rolling price history and a
//! chart renderer, all feeding a dashboard view.

pub mod api;
pub mod chart;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod feed_manager;
pub mod market_data;
pub mod poller;
pub mod provider;
pub mod runtime_config;
pub mod types;
