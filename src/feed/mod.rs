pub mod connection;
pub mod connector;

pub use connection::{FeedConnectionManager, FeedState};
pub use connector::{FeedConnector, FeedSession, WsConnector};
