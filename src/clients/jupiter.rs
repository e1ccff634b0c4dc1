/// Jupiter token metadata (organic score) and price API client
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::clients::{OrganicAssessment, OrganicAssessor, PriceSnapshot, PriceSource};
use crate::error::{EngineError, Result};
use crate::utils::RateLimiter;

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    #[serde(rename = "organicScore")]
    organic_score: Option<f64>,
    #[serde(rename = "organicScoreLabel")]
    organic_score_label: Option<String>,
    liquidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
    #[serde(rename = "volume24h")]
    volume_24h: Option<f64>,
    #[serde(rename = "marketCap")]
    market_cap: Option<f64>,
    #[serde(rename = "buyVolume")]
    buy_volume: Option<f64>,
    #[serde(rename = "sellVolume")]
    sell_volume: Option<f64>,
    #[serde(rename = "tradeCount")]
    trade_count: Option<u64>,
}

impl From<TokenInfoResponse> for OrganicAssessment {
    fn from(body: TokenInfoResponse) -> Self {
        OrganicAssessment {
            score: body.organic_score,
            label: body.organic_score_label.unwrap_or_default(),
            liquidity: body.liquidity.unwrap_or(0.0),
        }
    }
}

impl From<PriceResponse> for PriceSnapshot {
    fn from(body: PriceResponse) -> Self {
        PriceSnapshot {
            price: body.price,
            volume_24h: body.volume_24h,
            market_cap: body.market_cap,
            buy_volume: body.buy_volume,
            sell_volume: body.sell_volume,
            trade_count: body.trade_count,
        }
    }
}

/// Organic lookups are throttled here. Price lookups are throttled by the
/// polling coordinator, outside its per-fetch timeout.
pub struct JupiterClient {
    client: Client,
    base_url: String,
    organic_limiter: RateLimiter,
}

impl JupiterClient {
    pub fn new(base_url: &str, timeout: Duration, organic_per_second: u32) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(JupiterClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            organic_limiter: RateLimiter::new(organic_per_second),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::HttpStatus {
                endpoint: url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl OrganicAssessor for JupiterClient {
    async fn organic_score(&self, mint: &str) -> Result<OrganicAssessment> {
        self.organic_limiter.acquire().await;
        let body: TokenInfoResponse = self
            .get_json(format!("{}/token/{}", self.base_url, mint))
            .await?;
        let assessment = OrganicAssessment::from(body);

        debug!(
            mint = %mint,
            "Organic score: {:?} ({})", assessment.score, assessment.label
        );
        Ok(assessment)
    }
}

#[async_trait]
impl PriceSource for JupiterClient {
    async fn latest_price(&self, mint: &str) -> Result<PriceSnapshot> {
        let body: PriceResponse = self
            .get_json(format!("{}/price/{}", self.base_url, mint))
            .await?;
        Ok(body.into())
    }
}
