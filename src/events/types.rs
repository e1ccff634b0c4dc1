/// Feed wire format and the typed events handed to the processing side
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};

/// Streams the feed can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Migration,
    TokenTrade,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Migration, Channel::TokenTrade];

    pub fn method(&self) -> &'static str {
        match self {
            Channel::Migration => "subscribeMigration",
            Channel::TokenTrade => "subscribeTokenTrade",
        }
    }

    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "subscribeMigration" => Some(Channel::Migration),
            "subscribeTokenTrade" => Some(Channel::TokenTrade),
            _ => None,
        }
    }
}

/// Outbound `{method, params: []}` subscription request
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub method: &'static str,
    pub params: Vec<Value>,
}

impl SubscribeRequest {
    pub fn new(channel: Channel) -> Self {
        SubscribeRequest {
            method: channel.method(),
            params: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    method: Option<String>,
    #[serde(default)]
    params: Vec<Value>,
    /// Acknowledgements carry a human-readable `message` and no method
    message: Option<String>,
}

/// A token graduating to the AMM
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MigrationEvent {
    pub mint: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "bondingCurveCap")]
    pub bonding_curve_cap: Option<f64>,
}

/// A trade on a tracked token. The raw payload is kept for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub mint: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Migration(MigrationEvent),
    Trade(TradeEvent),
}

impl FeedEvent {
    pub fn mint(&self) -> &str {
        match self {
            FeedEvent::Migration(event) => &event.mint,
            FeedEvent::Trade(event) => &event.mint,
        }
    }
}

fn payload_mint(payload: &Value) -> Result<String> {
    match payload.get("mint").and_then(Value::as_str) {
        Some(mint) if !mint.trim().is_empty() => Ok(mint.trim().to_string()),
        _ => Err(EngineError::InvalidMessage(
            "payload has no mint address".to_string(),
        )),
    }
}

/// Decode one inbound text frame.
///
/// `Ok(None)` means a well-formed message that carries no event
/// (acknowledgements, methods we do not consume).
pub fn decode_message(text: &str) -> Result<Option<FeedEvent>> {
    let message: InboundMessage = serde_json::from_str(text)?;

    let method = match message.method {
        Some(method) => method,
        None if message.message.is_some() => return Ok(None),
        None => return Err(EngineError::InvalidMessage("missing method".to_string())),
    };

    let channel = match Channel::from_method(&method) {
        Some(channel) => channel,
        None => return Ok(None),
    };

    let payload = message
        .params
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::InvalidMessage(format!("{} without payload", method)))?;

    let mint = payload_mint(&payload)?;

    let event = match channel {
        Channel::Migration => {
            let mut event: MigrationEvent = serde_json::from_value(payload)?;
            event.mint = mint;
            FeedEvent::Migration(event)
        }
        Channel::TokenTrade => FeedEvent::Trade(TradeEvent { mint, payload }),
    };

    Ok(Some(event))
}
