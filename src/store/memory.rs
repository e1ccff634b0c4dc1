/// In-process store used when no external persistence is wired in
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::store::TokenStore;
use crate::types::{Alert, Position, PositionStatus, Token, TradingSignal};

const RECENT_LIMIT: usize = 100;
const TRADE_LIMIT: usize = 10_000;

#[derive(Default)]
struct StoreState {
    tokens: HashMap<String, Token>,
    trades: VecDeque<Value>,
    alerts: VecDeque<Alert>,
    alert_keys: HashSet<String>,
    signals: VecDeque<TradingSignal>,
    positions: HashMap<String, Position>,
}

/// Bounded in-memory implementation of [`TokenStore`]
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a signal produced by the strategy layer
    pub async fn record_signal(&self, signal: TradingSignal) {
        let mut state = self.state.write().await;
        if state.signals.len() >= RECENT_LIMIT {
            state.signals.pop_front();
        }
        state.signals.push_back(signal);
    }

    /// Record or update a position reported by the execution layer
    pub async fn record_position(&self, position: Position) {
        let mut state = self.state.write().await;
        state.positions.insert(position.id.clone(), position);
    }

    pub async fn token(&self, mint: &str) -> Option<Token> {
        self.state.read().await.tokens.get(mint).cloned()
    }

    pub async fn trade_count(&self) -> usize {
        self.state.read().await.trades.len()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.state.read().await.alerts.iter().cloned().collect()
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn save_token(&self, token: &Token) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .tokens
            .insert(token.mint_address.clone(), token.clone());
        Ok(())
    }

    async fn save_trade_data(&self, payload: &Value) -> Result<()> {
        let mut state = self.state.write().await;
        if state.trades.len() >= TRADE_LIMIT {
            state.trades.pop_front();
        }
        state.trades.push_back(payload.clone());
        Ok(())
    }

    async fn create_alert(&self, alert: Alert) -> Result<()> {
        let mut state = self.state.write().await;

        // At-least-once callers may redeliver
        if !state.alert_keys.insert(alert.idempotency_key.clone()) {
            debug!("Duplicate alert ignored: {}", alert.idempotency_key);
            return Ok(());
        }

        if state.alerts.len() >= RECENT_LIMIT {
            if let Some(evicted) = state.alerts.pop_front() {
                state.alert_keys.remove(&evicted.idempotency_key);
            }
        }
        state.alerts.push_back(alert);
        Ok(())
    }

    async fn get_active_tokens(&self) -> Result<Vec<Token>> {
        let state = self.state.read().await;
        let mut tokens: Vec<Token> = state
            .tokens
            .values()
            .filter(|token| token.is_active)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn get_active_positions(&self) -> Result<Vec<Position>> {
        let state = self.state.read().await;
        Ok(state
            .positions
            .values()
            .filter(|position| position.status == PositionStatus::Open)
            .cloned()
            .collect())
    }

    async fn get_recent_signals(&self) -> Result<Vec<TradingSignal>> {
        let state = self.state.read().await;
        Ok(state.signals.iter().rev().cloned().collect())
    }

    async fn get_recent_alerts(&self) -> Result<Vec<Alert>> {
        let state = self.state.read().await;
        Ok(state.alerts.iter().rev().cloned().collect())
    }

    async fn remove_token(&self, mint: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.tokens.remove(mint);
        Ok(())
    }
}
