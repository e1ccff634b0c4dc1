pub mod router;
pub mod types;

pub use router::{EventRouter, RouterStats};
pub use types::{decode_message, Channel, FeedEvent, MigrationEvent, SubscribeRequest, TradeEvent};
