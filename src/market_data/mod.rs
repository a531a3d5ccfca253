pub mod price_store;
pub mod reconnect;
pub mod stream;

pub use price_store::PriceStore;
pub use reconnect::ReconnectPolicy;
pub use stream::{FeedSession, FeedTransport, StreamConnection, WsTransport};
