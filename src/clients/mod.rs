pub mod jupiter;
pub mod solana_tracker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::Tick;

pub use jupiter::JupiterClient;
pub use solana_tracker::SolanaTrackerClient;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganicAssessment {
    pub score: Option<f64>,
    pub label: String,
    pub liquidity: f64,
}

/// Latest market snapshot for one mint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSnapshot {
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub buy_volume: Option<f64>,
    pub sell_volume: Option<f64>,
    pub trade_count: Option<u64>,
}

impl PriceSnapshot {
    pub fn into_tick(self, at: DateTime<Utc>) -> Tick {
        Tick {
            timestamp: at,
            timestamp_ms: at.timestamp_millis(),
            price: self.price,
            volume_24h: self.volume_24h,
            market_cap: self.market_cap,
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            trade_count: self.trade_count,
        }
    }
}

#[async_trait]
pub trait RiskAssessor: Send + Sync {
    async fn risk_score(&self, mint: &str) -> Result<RiskAssessment>;
}

#[async_trait]
pub trait OrganicAssessor: Send + Sync {
    async fn organic_score(&self, mint: &str) -> Result<OrganicAssessment>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest_price(&self, mint: &str) -> Result<PriceSnapshot>;
}
