// =============================================================================
// Feed Manager - single owner of price history and display derivation
// =============================================================================
//
// Stream connections and the snapshot poller run as independent tasks and
// talk to the manager only through one mpsc channel, so the rolling store and
// the previous-price table are mutated from exactly one task and need no
// locks. The manager also owns the chart renderer: it redraws on its own
// interval and immediately after every accepted update for the chart symbol.
//
// Shutdown cancels a single root token. Every connection, the poller and the
// manager observe a token derived from it.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chart::{ChartRenderer, RenderSurface};
use crate::display::SharedSink;
use crate::error::{FeedError, FeedResult};
use crate::market_data::stream::stream_endpoint;
use crate::market_data::{FeedTransport, PriceStore, StreamConnection};
use crate::poller::SnapshotPoller;
use crate::provider::DataProvider;
use crate::runtime_config::RuntimeConfig;
use crate::types::{ChangeClass, FeedEvent, Symbol, TickerDisplay, TickerUpdate};

/// `(current - previous) / previous * 100`, rounded to two decimals.
pub fn change_percent(previous: f64, current: f64) -> f64 {
    let raw = (current - previous) / previous * 100.0;
    (raw * 100.0).round() / 100.0
}

// =============================================================================
// FeedManager
// =============================================================================

pub struct FeedManager<S> {
    store: PriceStore,
    previous: HashMap<Symbol, f64>,
    sink: SharedSink,
    chart: ChartRenderer<S>,
}

impl<S: RenderSurface> FeedManager<S> {
    pub fn new(
        symbols: &[Symbol],
        history_capacity: usize,
        sink: SharedSink,
        chart: ChartRenderer<S>,
    ) -> Self {
        Self {
            store: PriceStore::new(symbols.iter().cloned(), history_capacity),
            previous: HashMap::with_capacity(symbols.len()),
            sink,
            chart,
        }
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    pub fn chart(&self) -> &ChartRenderer<S> {
        &self.chart
    }

    /// Last displayed price for `symbol`.
    pub fn previous_price(&self, symbol: &str) -> Option<f64> {
        self.previous.get(symbol).copied()
    }

    /// Run one ticker update through validation, change computation, the
    /// rolling store and the display. Rejected updates leave every table
    /// untouched.
    pub fn apply_update(&mut self, update: &TickerUpdate) -> FeedResult<TickerDisplay> {
        if !self.store.contains(&update.symbol) {
            return Err(FeedError::UnknownSymbol(update.symbol.clone()));
        }
        let current = update.price;
        if !current.is_finite() || current <= 0.0 {
            return Err(FeedError::Validation {
                symbol: update.symbol.clone(),
                price: current,
            });
        }

        let previous = self.previous_price(&update.symbol).unwrap_or(current);
        let change = change_percent(previous, current);

        self.previous.insert(update.symbol.clone(), current);
        self.store.push(&update.symbol, current);
        let (low, high) = self.store.range(&update.symbol).unwrap_or((current, current));

        let display = TickerDisplay {
            symbol: update.symbol.clone(),
            price: current,
            change_percent: change,
            change_class: ChangeClass::from_change(change),
            low,
            high,
        };
        self.sink.show_ticker(&display);

        if update.symbol == self.chart.symbol() {
            self.render();
        }
        Ok(display)
    }

    pub fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Ticker(update) => match self.apply_update(&update) {
                Ok(shown) => debug!(
                    symbol = %shown.symbol,
                    price = shown.price,
                    change = shown.change_percent,
                    source = %update.source,
                    "ticker applied"
                ),
                Err(FeedError::UnknownSymbol(symbol)) => {
                    debug!(symbol = %symbol, "ignoring update for untracked symbol");
                }
                Err(e) => warn!(error = %e, source = %update.source, "dropping ticker update"),
            },
            FeedEvent::Connection { symbol, state } => {
                self.sink.show_connection(&symbol, state);
            }
            FeedEvent::Health(status) => self.sink.show_status(&status),
            FeedEvent::Stats(stats) => self.sink.show_stats(&stats),
        }
    }

    /// Redraw the chart from the current history of the chart symbol.
    pub fn render(&mut self) -> bool {
        let history = self.store.history(self.chart.symbol());
        self.chart.redraw(&history)
    }

    /// Process events until cancelled or until every producer is gone.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<FeedEvent>,
        render_interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut render = tokio::time::interval(render_interval.max(Duration::from_millis(1)));
        render.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut symbols: Vec<&str> = self.store.symbols().collect();
        symbols.sort_unstable();
        info!(symbols = ?symbols, "feed manager started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("all feed producers are gone");
                        break;
                    }
                },
                _ = render.tick() => {
                    self.render();
                }
            }
        }

        info!("feed manager stopped");
    }
}

// =============================================================================
// Feed - wiring and lifecycle
// =============================================================================

pub struct Feed;

impl Feed {
    /// Spawn one stream connection per tracked symbol, the snapshot poller and
    /// the feed manager. `config` is normalised first, so zero intervals and
    /// untracked chart symbols are safe to pass.
    pub fn start<T, P, S>(
        config: &RuntimeConfig,
        transport: Arc<T>,
        provider: Arc<P>,
        sink: SharedSink,
        surface: S,
    ) -> FeedHandle
    where
        T: FeedTransport,
        P: DataProvider,
        S: RenderSurface + Send + 'static,
    {
        let config = config.clone().normalized();
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let root = CancellationToken::new();
        let mut connections = HashMap::with_capacity(config.symbols.len());
        let mut tasks = Vec::with_capacity(config.symbols.len() + 2);

        for symbol in &config.symbols {
            let token = root.child_token();
            let url = stream_endpoint(&config.ws_base_url, symbol);
            let conn = StreamConnection::new(
                symbol.clone(),
                url,
                Arc::clone(&transport),
                config.reconnect,
                tx.clone(),
                token.clone(),
            );
            tasks.push(tokio::spawn(conn.run()));
            connections.insert(symbol.clone(), token);
        }

        let poller = SnapshotPoller::new(
            provider,
            tx,
            Duration::from_millis(config.poll_interval_ms),
            root.child_token(),
        );
        tasks.push(tokio::spawn(poller.run()));

        let chart = ChartRenderer::new(config.chart.symbol.clone(), surface);
        let manager = FeedManager::new(&config.symbols, config.history_capacity, sink, chart);
        tasks.push(tokio::spawn(manager.run(
            rx,
            Duration::from_millis(config.render_interval_ms),
            root.child_token(),
        )));

        info!(symbols = ?config.symbols, "feed started");
        FeedHandle {
            root,
            connections,
            tasks,
        }
    }
}

pub struct FeedHandle {
    root: CancellationToken,
    connections: HashMap<Symbol, CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

impl FeedHandle {
    /// Permanently tear down one symbol's connection. Returns `false` for an
    /// unknown symbol.
    pub fn disconnect(&self, symbol: &str) -> bool {
        match self.connections.get(symbol) {
            Some(token) => {
                info!(symbol = %symbol, "tearing down price stream");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Close every connection, stop polling and rendering, and wait for all
    /// tasks to finish.
    pub async fn shutdown(self) {
        self.root.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "feed task ended abnormally");
            }
        }
        info!("feed shut down");
    }
}

// =============================================================================
// Tests
// =============================================================================
