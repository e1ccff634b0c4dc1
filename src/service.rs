/// Synchronous read surface for the signal and presentation layers
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::data::{Resolution, WindowManager};
use crate::discovery::TokenLifecycleGate;
use crate::error::Result;
use crate::feed::{FeedConnectionManager, FeedState};
use crate::polling::PollingCoordinator;
use crate::store::{log_store_failure, TokenStore};
use crate::types::{Candle, Tick};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStatus {
    pub tracked_tokens: usize,
    pub pending_tokens: usize,
    pub admitted_total: u64,
    pub rejected_total: u64,
    pub feed_state: FeedState,
    pub polling_cycles: u64,
}

pub struct MarketDataService {
    windows: Arc<WindowManager>,
    poller: Arc<PollingCoordinator>,
    gate: Arc<TokenLifecycleGate>,
    feed: Arc<FeedConnectionManager>,
    store: Arc<dyn TokenStore>,
}

impl MarketDataService {
    pub fn new(
        windows: Arc<WindowManager>,
        poller: Arc<PollingCoordinator>,
        gate: Arc<TokenLifecycleGate>,
        feed: Arc<FeedConnectionManager>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        MarketDataService {
            windows,
            poller,
            gate,
            feed,
            store,
        }
    }

    pub fn latest_one_second_candle(&self, mint: &str) -> Option<Candle> {
        self.windows.latest_candle(mint, Resolution::OneSecond)
    }

    pub fn latest_fifteen_second_candle(&self, mint: &str) -> Option<Candle> {
        self.windows.latest_candle(mint, Resolution::FifteenSeconds)
    }

    /// Oldest first. Empty when the mint is unknown.
    pub fn one_second_history(&self, mint: &str) -> Vec<Candle> {
        self.windows.candles(mint, Resolution::OneSecond)
    }

    pub fn fifteen_second_history(&self, mint: &str) -> Vec<Candle> {
        self.windows.candles(mint, Resolution::FifteenSeconds)
    }

    pub fn ticks(&self, mint: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<Tick> {
        self.windows.window(mint, since, until)
    }

    pub fn current_market_cap(&self, mint: &str) -> Option<f64> {
        self.windows.current_market_cap(mint)
    }

    /// Start tracking `mint` without assessment. Fails for rejected mints.
    pub fn add_token(&self, mint: &str) -> Result<bool> {
        self.gate.track(mint)
    }

    /// Stop tracking `mint` and forget it in the store
    pub async fn remove_token(&self, mint: &str) -> bool {
        let removed = self.gate.remove(mint);
        if removed {
            log_store_failure("remove_token", self.store.remove_token(mint).await);
            info!(mint = %mint, "Unsubscribed");
        }
        removed
    }

    pub fn status(&self) -> TrackerStatus {
        TrackerStatus {
            tracked_tokens: self.poller.tracked_count(),
            pending_tokens: self.gate.pending_count(),
            admitted_total: self.gate.admitted_count(),
            rejected_total: self.gate.rejected_count(),
            feed_state: self.feed.state(),
            polling_cycles: self.poller.cycle_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{
        OrganicAssessment, OrganicAssessor, PriceSnapshot, PriceSource, RiskAssessment,
        RiskAssessor,
    };
    use crate::error::EngineError;
    use crate::events::MigrationEvent;
    use crate::feed::{FeedConnector, FeedSession};
    use crate::store::InMemoryStore;
    use crate::time::{Clock, ManualClock};
    use crate::types::{FeedConfig, GateConfig, PollingConfig, WindowConfig};
    use crate::discovery::GateOutcome;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    struct Stub {
        risk: f64,
    }

    #[async_trait]
    impl RiskAssessor for Stub {
        async fn risk_score(&self, _mint: &str) -> Result<RiskAssessment> {
            Ok(RiskAssessment { score: self.risk })
        }
    }

    #[async_trait]
    impl OrganicAssessor for Stub {
        async fn organic_score(&self, _mint: &str) -> Result<OrganicAssessment> {
            Ok(OrganicAssessment {
                score: Some(90.0),
                label: "high".to_string(),
                liquidity: 10.0,
            })
        }
    }

    #[async_trait]
    impl PriceSource for Stub {
        async fn latest_price(&self, _mint: &str) -> Result<PriceSnapshot> {
            Ok(PriceSnapshot {
                price: 2.0,
                market_cap: Some(42_000.0),
                ..PriceSnapshot::default()
            })
        }
    }

    struct Offline;

    #[async_trait]
    impl FeedConnector for Offline {
        async fn connect(&self, _url: &str) -> Result<Box<dyn FeedSession>> {
            Err(EngineError::WebSocketDisconnected("offline".to_string()))
        }
    }

    fn service(risk: f64) -> (MarketDataService, Arc<TokenLifecycleGate>, Arc<PollingCoordinator>) {
        let windows = Arc::new(WindowManager::new(WindowConfig::default()));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 3).unwrap(),
        ));
        let stub = Arc::new(Stub { risk });
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryStore::new());
        let poller = Arc::new(PollingCoordinator::new(
            stub.clone(),
            Arc::clone(&windows),
            Arc::clone(&clock),
            PollingConfig::default(),
        ));
        let gate = Arc::new(TokenLifecycleGate::new(
            stub.clone(),
            stub,
            Arc::clone(&poller),
            Arc::clone(&windows),
            Arc::clone(&store),
            Arc::clone(&clock),
            GateConfig::default(),
        ));
        let (tx, _rx) = mpsc::channel(4);
        let feed = Arc::new(FeedConnectionManager::new(
            Arc::new(Offline),
            FeedConfig::default(),
            tx,
            Arc::clone(&store),
            clock,
        ));
        let service = MarketDataService::new(
            windows,
            Arc::clone(&poller),
            Arc::clone(&gate),
            feed,
            store,
        );
        (service, gate, poller)
    }

    #[tokio::test]
    async fn test_reads_after_poll() {
        let (service, _gate, poller) = service(1.0);

        assert!(service.latest_one_second_candle("M").is_none());
        assert!(service.one_second_history("M").is_empty());

        assert!(service.add_token("M").unwrap());
        poller.run_cycle().await.unwrap();

        assert_eq!(service.current_market_cap("M"), Some(42_000.0));
        assert_eq!(service.latest_one_second_candle("M").unwrap().close, 2.0);
        assert_eq!(service.fifteen_second_history("M").len(), 1);
        assert_eq!(service.status().tracked_tokens, 1);
        assert_eq!(service.status().feed_state, FeedState::Idle);

        assert!(service.remove_token("M").await);
        assert!(service.latest_fifteen_second_candle("M").is_none());
        assert_eq!(service.status().tracked_tokens, 0);
    }

    #[tokio::test]
    async fn test_add_refuses_rejected_mint() {
        let (service, gate, _poller) = service(9.0);

        let discovery = gate
            .on_migration(MigrationEvent {
                mint: "Bad".to_string(),
                name: None,
                symbol: None,
                description: None,
                bonding_curve_cap: None,
            })
            .unwrap();
        assert!(matches!(
            discovery.assessment.await.unwrap(),
            GateOutcome::Rejected(_)
        ));

        assert!(matches!(
            service.add_token("Bad"),
            Err(EngineError::ScamToken(_))
        ));
        assert_eq!(service.status().rejected_total, 1);
    }
}
