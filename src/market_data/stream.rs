// =============================================================================
// Stream Connection - one self-healing price subscription per symbol
// =============================================================================
//
// State machine:
//
//   Connecting ──handshake ok──▶ Open ──close / error──▶ Closed
//        │                                                 │
//        └────────────handshake failed────────────────────▶│
//                                                          ▼
//   Connecting ◀──────────delay elapsed────────── ReconnectPending
//
// A session returns exactly once, so a transport error followed by a close
// still produces a single reconnect. Cancellation is checked around the
// handshake, every read and the reconnect sleep; a torn-down connection
// closes its socket, reports Closed once and never reconnects.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FeedError, FeedResult};
use crate::market_data::reconnect::ReconnectPolicy;
use crate::types::{ConnectionState, FeedEvent, Symbol, TickerUpdate, UpdateSource};

/// Text frames received from one live subscription.
pub type MessageStream = BoxStream<'static, FeedResult<String>>;

/// Upper bound on a locally initiated close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One open subscription. The message stream ends when the remote side
/// closes; an `Err` item means the transport failed.
pub struct FeedSession {
    messages: MessageStream,
    close: Option<BoxFuture<'static, ()>>,
}

impl FeedSession {
    pub fn new(messages: MessageStream) -> Self {
        Self {
            messages,
            close: None,
        }
    }

    /// `close` runs only when the subscription is torn down from our side.
    pub fn on_close(mut self, close: impl Future<Output = ()> + Send + 'static) -> Self {
        self.close = Some(Box::pin(close));
        self
    }

    pub async fn next(&mut self) -> Option<FeedResult<String>> {
        self.messages.next().await
    }

    pub async fn close(self) {
        let Some(close) = self.close else {
            return;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
            debug!("price stream close timed out");
        }
    }
}

/// Opens live price subscriptions.
pub trait FeedTransport: Send + Sync + 'static {
    fn connect(&self, url: &str) -> impl Future<Output = FeedResult<FeedSession>> + Send;
}

/// `"{base}/prices/{SYMBOL}"`
pub fn stream_endpoint(ws_base_url: &str, symbol: &str) -> String {
    format!(
        "{}/prices/{}",
        ws_base_url.trim_end_matches('/'),
        symbol.to_ascii_uppercase()
    )
}

// ---------------------------------------------------------------------------
// WebSocket transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl FeedTransport for WsTransport {
    async fn connect(&self, url: &str) -> FeedResult<FeedSession> {
        let (ws_stream, _response) = connect_async(url).await?;
        let (mut write, read) = ws_stream.split();

        let messages = read.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "price WebSocket close frame received");
                    None
                }
                // tungstenite answers pings itself.
                Ok(_) => None,
                Err(e) => Some(Err(FeedError::from(e))),
            }
        });
        Ok(FeedSession::new(messages.boxed()).on_close(async move {
            if let Err(e) = write.send(Message::Close(None)).await {
                debug!(error = %e, "price WebSocket close frame not sent");
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// Message parsing
// ---------------------------------------------------------------------------

/// Parse one inbound ticker message.
///
/// Expected shape (price may be a string or a number):
/// ```json
/// { "symbol": "BTCUSDT", "price": "43250.12", "volume": "1000.0" }
/// ```
/// A message without `symbol` is attributed to `expected`; a message for any
/// other symbol is rejected.
pub fn parse_ticker_message(text: &str, expected: &str) -> FeedResult<TickerUpdate> {
    let root: serde_json::Value = serde_json::from_str(text)?;

    let symbol = match root.get("symbol") {
        Some(serde_json::Value::String(s)) => s.to_ascii_uppercase(),
        Some(other) => {
            return Err(FeedError::Parse(format!(
                "field symbol has unexpected JSON type: {other}"
            )))
        }
        None => expected.to_ascii_uppercase(),
    };
    if !symbol.eq_ignore_ascii_case(expected) {
        return Err(FeedError::Parse(format!(
            "message for {symbol} on the {expected} stream"
        )));
    }

    let price = parse_price(&root["price"])?;
    Ok(TickerUpdate::new(symbol, price, UpdateSource::Stream))
}

/// The provider sends decimals as JSON strings; plain numbers are accepted too.
pub(crate) fn parse_price(val: &serde_json::Value) -> FeedResult<f64> {
    match val {
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| FeedError::Parse(format!("failed to parse price {s:?}: {e}"))),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FeedError::Parse(format!("price {n} is not a valid f64"))),
        serde_json::Value::Null => Err(FeedError::Parse("missing field price".to_string())),
        other => Err(FeedError::Parse(format!(
            "field price has unexpected JSON type: {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// StreamConnection
// ---------------------------------------------------------------------------

enum SessionEnd {
    Closed,
    Failed(FeedError),
    /// The feed manager hung up; nobody wants these updates anymore.
    Abandoned,
    Cancelled,
}

pub struct StreamConnection<T> {
    symbol: Symbol,
    url: String,
    transport: Arc<T>,
    policy: ReconnectPolicy,
    events: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
}

impl<T: FeedTransport> StreamConnection<T> {
    pub fn new(
        symbol: impl Into<Symbol>,
        url: impl Into<String>,
        transport: Arc<T>,
        policy: ReconnectPolicy,
        events: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            url: url.into(),
            transport,
            policy,
            events,
            cancel,
        }
    }

    /// Keep the subscription alive until cancelled or the feed manager goes
    /// away.
    pub async fn run(self) {
        let mut attempt: u32 = 0;

        loop {
            if !self.report(ConnectionState::Connecting).await {
                break;
            }

            match self.session(&mut attempt).await {
                SessionEnd::Closed => {
                    warn!(symbol = %self.symbol, "price stream closed");
                }
                SessionEnd::Failed(e) => {
                    warn!(symbol = %self.symbol, error = %e, "price stream failed");
                }
                SessionEnd::Abandoned | SessionEnd::Cancelled => break,
            }

            if !self.report(ConnectionState::Closed).await {
                break;
            }

            let delay = self.policy.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            if !self.report(ConnectionState::ReconnectPending).await {
                break;
            }
            info!(
                symbol = %self.symbol,
                delay_ms = delay.as_millis() as u64,
                attempt,
                "reconnect scheduled"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if self.cancel.is_cancelled() {
            // Best effort: the manager may already be gone or busy.
            let closed = FeedEvent::Connection {
                symbol: self.symbol.clone(),
                state: ConnectionState::Closed,
            };
            if self.events.try_send(closed).is_err() {
                debug!(symbol = %self.symbol, "final Closed state not delivered");
            }
        }
        info!(symbol = %self.symbol, "price stream torn down");
    }

    async fn session(&self, attempt: &mut u32) -> SessionEnd {
        info!(url = %self.url, symbol = %self.symbol, "connecting to price stream");

        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
            connected = self.transport.connect(&self.url) => connected,
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(e) => return SessionEnd::Failed(e),
        };

        info!(symbol = %self.symbol, "price stream connected");
        *attempt = 0;
        if !self.report(ConnectionState::Open).await {
            session.close().await;
            return SessionEnd::Abandoned;
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = session.next() => Some(next),
            };
            let Some(next) = next else {
                debug!(symbol = %self.symbol, "closing price stream");
                session.close().await;
                return SessionEnd::Cancelled;
            };

            match next {
                Some(Ok(text)) => match parse_ticker_message(&text, &self.symbol) {
                    Ok(update) => {
                        if self.events.send(FeedEvent::Ticker(update)).await.is_err() {
                            session.close().await;
                            return SessionEnd::Abandoned;
                        }
                    }
                    Err(e) => {
                        warn!(symbol = %self.symbol, error = %e, "dropping malformed price message");
                    }
                },
                Some(Err(e)) => return SessionEnd::Failed(e),
                None => return SessionEnd::Closed,
            }
        }
    }

    async fn report(&self, state: ConnectionState) -> bool {
        debug!(symbol = %self.symbol, state = %state, "connection state");
        self.events
            .send(FeedEvent::Connection {
                symbol: self.symbol.clone(),
                state,
            })
            .await
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
