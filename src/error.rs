// =============================================================================
// Feed error taxonomy
// =============================================================================
//
// None of these are fatal. Transport errors end a stream session and lead to
// a reconnect, parse and validation errors drop a single update, provider
// errors flip the dashboard to its offline representation until the next
// successful poll.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid price {price} for {symbol}")]
    Validation { symbol: String, price: f64 },
    #[error("untracked symbol: {0}")]
    UnknownSymbol(String),
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(value: reqwest::Error) -> Self {
        Self::ProviderUnavailable(value.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;
