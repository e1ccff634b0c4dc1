pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::types::{Alert, Position, Token, TradingSignal};

pub use memory::InMemoryStore;

/// Persistence contract. The store is a best-effort sink: callers log and
/// swallow failures instead of retrying.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save_token(&self, token: &Token) -> Result<()>;

    async fn save_trade_data(&self, payload: &Value) -> Result<()>;

    async fn create_alert(&self, alert: Alert) -> Result<()>;

    async fn get_active_tokens(&self) -> Result<Vec<Token>>;

    async fn get_active_positions(&self) -> Result<Vec<Position>>;

    async fn get_recent_signals(&self) -> Result<Vec<TradingSignal>>;

    async fn get_recent_alerts(&self) -> Result<Vec<Alert>>;

    async fn remove_token(&self, mint: &str) -> Result<()>;
}

/// Log a failed store call and carry on
pub fn log_store_failure(operation: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("Store {} failed: {} ({})", operation, e, e.error_code());
    }
}
