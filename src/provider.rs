// =============================================================================
// Data Provider - REST snapshots of health, tickers and trading stats
// =============================================================================
//
// Any transport failure or non-2xx response is reported as
// `FeedError::ProviderUnavailable`; the poller turns that into the offline
// representation on the dashboard.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{FeedError, FeedResult};
use crate::market_data::stream::parse_price;
use crate::runtime_config::RuntimeConfig;
use crate::types::{LinkStatus, ServiceStatus, TradingStats};

/// Body of `GET /health`. Component fields are optional; a healthy response
/// without them means every component is up.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthSnapshot {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default, alias = "redis")]
    pub cache: Option<String>,
}

impl HealthSnapshot {
    pub fn service_status(&self) -> ServiceStatus {
        ServiceStatus {
            database: link_status(self.database.as_deref()),
            cache: link_status(self.cache.as_deref()),
            ..ServiceStatus::online()
        }
    }
}

fn link_status(field: Option<&str>) -> LinkStatus {
    match field {
        None => LinkStatus::Connected,
        Some(value) => {
            let value = value.trim();
            let up = ["ok", "healthy", "connected", "up"]
                .iter()
                .any(|v| value.eq_ignore_ascii_case(v));
            if up {
                LinkStatus::Connected
            } else {
                LinkStatus::Disconnected
            }
        }
    }
}

/// One entry of `GET /market/tickers`.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSnapshot {
    pub symbol: String,
    pub price: f64,
}

/// Point-in-time snapshots consumed by the poller.
pub trait DataProvider: Send + Sync + 'static {
    fn fetch_health(&self) -> impl Future<Output = FeedResult<HealthSnapshot>> + Send;
    fn fetch_tickers(&self) -> impl Future<Output = FeedResult<Vec<TickerSnapshot>>> + Send;
    fn fetch_stats(&self) -> impl Future<Output = FeedResult<TradingStats>> + Send;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct HttpDataProvider {
    health_url: String,
    tickers_url: String,
    stats_url: String,
    client: reqwest::Client,
}

impl HttpDataProvider {
    pub fn new(config: &RuntimeConfig) -> FeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        let base = config.provider_base_url.trim_end_matches('/');
        debug!(base_url = %base, "HttpDataProvider initialised");

        Ok(Self {
            health_url: join_url(base, &config.health_path),
            tickers_url: join_url(base, &config.tickers_path),
            stats_url: join_url(base, &config.stats_path),
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> FeedResult<T> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::ProviderUnavailable(format!(
                "GET {url} returned {status}"
            )));
        }
        Ok(resp.json::<T>().await?)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base, path.trim_start_matches('/'))
}

impl DataProvider for HttpDataProvider {
    #[instrument(skip(self), name = "provider::fetch_health")]
    async fn fetch_health(&self) -> FeedResult<HealthSnapshot> {
        self.get_json(&self.health_url).await
    }

    #[instrument(skip(self), name = "provider::fetch_tickers")]
    async fn fetch_tickers(&self) -> FeedResult<Vec<TickerSnapshot>> {
        let body: serde_json::Value = self.get_json(&self.tickers_url).await?;
        parse_tickers(&body)
    }

    #[instrument(skip(self), name = "provider::fetch_stats")]
    async fn fetch_stats(&self) -> FeedResult<TradingStats> {
        self.get_json(&self.stats_url).await
    }
}

/// Parse the tickers array. Entries that cannot be read are skipped with a
/// diagnostic; a body that is not an array is a parse error.
pub fn parse_tickers(body: &serde_json::Value) -> FeedResult<Vec<TickerSnapshot>> {
    let entries = body
        .as_array()
        .ok_or_else(|| FeedError::Parse("tickers body is not an array".to_string()))?;

    let mut tickers = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(symbol) = entry.get("symbol").and_then(|s| s.as_str()) else {
            debug!(entry = %entry, "skipping ticker without symbol");
            continue;
        };
        match parse_price(&entry["price"]) {
            Ok(price) => tickers.push(TickerSnapshot {
                symbol: symbol.to_ascii_uppercase(),
                price,
            }),
            Err(e) => debug!(symbol = %symbol, error = %e, "skipping unreadable ticker"),
        }
    }
    Ok(tickers)
}
