// =============================================================================
// Snapshot Poller - periodic health / ticker / stats baseline
// =============================================================================
//
// The first tick fires immediately so the dashboard has prices and a status
// before any live message arrives. A failed fetch never stops the loop: the
// affected display fields switch to their offline representation and the next
// tick tries again.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provider::DataProvider;
use crate::types::{FeedEvent, ServiceStatus, StatsDisplay, TickerUpdate, UpdateSource};

pub struct SnapshotPoller<P> {
    provider: Arc<P>,
    events: mpsc::Sender<FeedEvent>,
    interval: Duration,
    cancel: CancellationToken,
}

/// The manager task is gone; polling is pointless.
#[derive(Debug)]
struct Hangup;

impl<P: DataProvider> SnapshotPoller<P> {
    pub fn new(
        provider: Arc<P>,
        events: mpsc::Sender<FeedEvent>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            events,
            interval,
            cancel,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "snapshot poller started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                polled = self.poll_once() => polled,
            };
            if polled.is_err() {
                break;
            }
        }

        info!("snapshot poller stopped");
    }

    async fn poll_once(&self) -> Result<(), Hangup> {
        let status = match self.provider.fetch_health().await {
            Ok(health) => health.service_status(),
            Err(e) => {
                warn!(error = %e, "health check failed, marking services offline");
                ServiceStatus::offline()
            }
        };
        self.emit(FeedEvent::Health(status)).await?;

        match self.provider.fetch_tickers().await {
            Ok(tickers) => {
                debug!(count = tickers.len(), "ticker snapshot received");
                for ticker in tickers {
                    let update = TickerUpdate::new(ticker.symbol, ticker.price, UpdateSource::Poll);
                    self.emit(FeedEvent::Ticker(update)).await?;
                }
            }
            Err(e) => warn!(error = %e, "ticker snapshot failed"),
        }

        let stats = match self.provider.fetch_stats().await {
            Ok(stats) => StatsDisplay::Available(stats),
            Err(e) => {
                warn!(error = %e, "stats fetch failed, marking stats unavailable");
                StatsDisplay::Unavailable
            }
        };
        self.emit(FeedEvent::Stats(stats)).await
    }

    async fn emit(&self, event: FeedEvent) -> Result<(), Hangup> {
        self.events.send(event).await.map_err(|_| Hangup)
    }
}
