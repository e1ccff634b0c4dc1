/// Core type definitions for the migration tracker
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a discovered token.
///
/// `Pending -> RiskChecked -> OrganicChecked -> Admitted`, with `Rejected`
/// reachable from any non-terminal state and `Removed` reachable from all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
    Pending,
    RiskChecked,
    OrganicChecked,
    Admitted,
    Rejected,
    Removed,
}

impl TokenStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TokenStatus::Pending => "PENDING",
            TokenStatus::RiskChecked => "RISK_CHECKED",
            TokenStatus::OrganicChecked => "ORGANIC_CHECKED",
            TokenStatus::Admitted => "ADMITTED",
            TokenStatus::Rejected => "REJECTED",
            TokenStatus::Removed => "REMOVED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TokenStatus::Admitted | TokenStatus::Rejected | TokenStatus::Removed
        )
    }
}

/// Bonding curve completion cap assumed when a migration does not carry one
pub const DEFAULT_BONDING_CURVE_CAP: f64 = 75_000.0;

/// Why the lifecycle gate turned a token away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    RiskScore,
    LowOrganicScore,
    RiskUnavailable,
    OrganicUnavailable,
}

impl RejectReason {
    pub fn as_str(&self) -> &str {
        match self {
            RejectReason::RiskScore => "RISK_SCORE",
            RejectReason::LowOrganicScore => "LOW_ORGANIC_SCORE",
            RejectReason::RiskUnavailable => "RISK_UNAVAILABLE",
            RejectReason::OrganicUnavailable => "ORGANIC_UNAVAILABLE",
        }
    }
}

/// A token discovered through a migration event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub mint_address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    /// Curve completion cap, `DEFAULT_BONDING_CURVE_CAP` when the feed omits it
    pub bonding_curve_cap: Option<f64>,
    pub status: TokenStatus,
    pub reject_reason: Option<RejectReason>,
    pub risk_score: Option<f64>,
    pub organic_score: Option<f64>,
    pub organic_label: Option<String>,
    pub scam_detected: bool,
    pub liquidity_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Token {
    pub fn pending(mint_address: String, now: DateTime<Utc>) -> Self {
        Token {
            mint_address,
            name: None,
            symbol: None,
            description: None,
            bonding_curve_cap: None,
            status: TokenStatus::Pending,
            reject_reason: None,
            risk_score: None,
            organic_score: None,
            organic_label: None,
            scam_detected: false,
            liquidity_verified: false,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_seen: Some(now),
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.name, &self.symbol) {
            (Some(name), Some(symbol)) => format!("{} ({})", name, symbol),
            (Some(name), None) => name.clone(),
            (None, Some(symbol)) => symbol.clone(),
            (None, None) => self.mint_address.clone(),
        }
    }
}

/// Price/volume observation for a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub timestamp_ms: i64,
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub buy_volume: Option<f64>,
    pub sell_volume: Option<f64>,
    pub trade_count: Option<u64>,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Tick {
            timestamp,
            timestamp_ms: timestamp.timestamp_millis(),
            price,
            volume_24h: None,
            market_cap: None,
            buy_volume: None,
            sell_volume: None,
            trade_count: None,
        }
    }
}

/// OHLCV candle, keyed by the start of its bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    TokenDiscovered,
    RiskAlert,
    TradeExecuted,
    EmergencyStop,
    SignalGenerated,
}

impl AlertType {
    pub fn as_str(&self) -> &str {
        match self {
            AlertType::TokenDiscovered => "TOKEN_DISCOVERED",
            AlertType::RiskAlert => "RISK_ALERT",
            AlertType::TradeExecuted => "TRADE_EXECUTED",
            AlertType::EmergencyStop => "EMERGENCY_STOP",
            AlertType::SignalGenerated => "SIGNAL_GENERATED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Operator-facing notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub mint_address: Option<String>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl Alert {
    pub fn new(
        mint_address: Option<String>,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        idempotency_key: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Alert {
            id: uuid::Uuid::new_v4().to_string(),
            mint_address,
            alert_type,
            severity,
            message,
            idempotency_key,
            created_at,
            is_read: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    Buy,
    SellPartial,
    SellFull,
    StopLoss,
}

/// Signal produced by the downstream strategy layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub id: String,
    pub mint_address: String,
    pub signal_type: SignalType,
    pub signal_strength: Option<f64>,
    pub entry_price: Option<f64>,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub generated_at: DateTime<Utc>,
    pub is_executed: bool,
    pub executed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    None,
    Open,
    Closed,
    Cancelled,
}

/// Position held by the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub mint_address: String,
    pub signal_id: Option<String>,
    pub entry_price: f64,
    pub entry_size: f64,
    pub current_price: Option<f64>,
    pub current_size: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: Option<DateTime<Utc>>,
    pub status: PositionStatus,
    pub realized_pnl: Option<f64>,
    pub unrealized_pnl: Option<f64>,
}

/// Configuration for the tracker
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub gate: GateConfig,
    pub polling: PollingConfig,
    pub windows: WindowConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub ws_url: String,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub event_queue_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            ws_url: "wss://pumpportal.fun/api/data".to_string(),
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 10,
            event_queue_capacity: 10_000,
        }
    }
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Scores strictly above this are rejected
    pub risk_threshold: f64,
    pub rejected_organic_label: String,
    pub assessment_timeout_ms: u64,
    /// Rejected mints remembered before the oldest are forgotten
    pub max_rejected_mints: usize,
    /// Budget for the organic-score endpoint
    pub max_requests_per_second: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            risk_threshold: 4.0,
            rejected_organic_label: "low".to_string(),
            assessment_timeout_ms: 5000,
            max_rejected_mints: 10_000,
            max_requests_per_second: 10,
        }
    }
}

impl GateConfig {
    pub fn assessment_timeout(&self) -> Duration {
        Duration::from_millis(self.assessment_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub error_backoff_ms: u64,
    pub fetch_timeout_ms: u64,
    pub max_requests_per_second: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval_ms: 1000,
            error_backoff_ms: 5000,
            fetch_timeout_ms: 5000,
            max_requests_per_second: 50,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub max_ticks: usize,
    pub max_one_second_candles: usize,
    pub max_fifteen_second_candles: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            max_ticks: 60,
            max_one_second_candles: 900,
            max_fifteen_second_candles: 400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub solana_tracker_url: String,
    pub jupiter_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            solana_tracker_url: "https://data.solanatracker.io".to_string(),
            jupiter_url: "https://api.jup.ag".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}
