/// Solana Tracker risk API client
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::clients::{RiskAssessment, RiskAssessor};
use crate::error::{EngineError, Result};

#[derive(Debug, Deserialize)]
struct RiskResponse {
    #[serde(rename = "riskScore", alias = "score")]
    risk_score: f64,
}

pub struct SolanaTrackerClient {
    client: Client,
    base_url: String,
}

impl SolanaTrackerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(SolanaTrackerClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn risk_url(&self, mint: &str) -> String {
        format!("{}/risk/{}", self.base_url, mint)
    }
}

#[async_trait]
impl RiskAssessor for SolanaTrackerClient {
    async fn risk_score(&self, mint: &str) -> Result<RiskAssessment> {
        let url = self.risk_url(mint);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::HttpStatus {
                endpoint: url,
                status: response.status().as_u16(),
            });
        }

        let body: RiskResponse = response.json().await?;
        debug!(mint = %mint, "Risk score: {}", body.risk_score);

        Ok(RiskAssessment {
            score: body.risk_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_url() {
        let client =
            SolanaTrackerClient::new("https://data.solanatracker.io/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.risk_url("Mint111"),
            "https://data.solanatracker.io/risk/Mint111"
        );
    }

    #[test]
    fn test_parse_risk_response() {
        let body: RiskResponse = serde_json::from_str(r#"{"riskScore": 7, "extra": true}"#).unwrap();
        assert_eq!(body.risk_score, 7.0);
    }
}
