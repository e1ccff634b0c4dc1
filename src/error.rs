/// Centralized error types for the tracker
use thiserror::Error;

/// Coarse classification used to decide how a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Feed disconnect, HTTP failure, timeout. Retried or backed off.
    Transport,
    /// Malformed inbound data. Logged and dropped.
    Validation,
    /// Token failed an admission check. A normal outcome.
    GateRejection,
    /// Retry budget spent. Fatal to the component that owns it.
    ResourceExhaustion,
    Internal,
}

#[derive(Error, Debug)]
pub enum EngineError {
    // Network Errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("WebSocket disconnected: {0}")]
    WebSocketDisconnected(String),

    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    // Data Errors
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Missing data: {0}")]
    MissingData(String),

    // Gate outcomes
    #[error("Risk score {score} above threshold {threshold} for {mint}")]
    RiskRejected {
        mint: String,
        score: f64,
        threshold: f64,
    },

    #[error("Organic score label '{label}' rejected for {mint}")]
    OrganicRejected { mint: String, label: String },

    #[error("Token flagged as scam: {0}")]
    ScamToken(String),

    // Exhaustion
    #[error("Reconnect attempts exhausted after {0} attempts")]
    ReconnectExhausted(u32),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    // System Errors
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Component stopped: {0}")]
    Stopped(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::HttpError(_)
            | EngineError::HttpStatus { .. }
            | EngineError::WebSocketError(_)
            | EngineError::WebSocketDisconnected(_)
            | EngineError::NetworkTimeout(_) => ErrorKind::Transport,
            EngineError::InvalidMessage(_)
            | EngineError::DeserializationError(_)
            | EngineError::MissingData(_) => ErrorKind::Validation,
            EngineError::RiskRejected { .. }
            | EngineError::OrganicRejected { .. }
            | EngineError::ScamToken(_) => ErrorKind::GateRejection,
            EngineError::ReconnectExhausted(_) => ErrorKind::ResourceExhaustion,
            EngineError::ConfigError(_)
            | EngineError::FileError(_)
            | EngineError::ChannelClosed(_)
            | EngineError::Stopped(_) => ErrorKind::Internal,
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Validation)
    }

    /// Check if error ends the owning component
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::ResourceExhaustion)
            || matches!(self, EngineError::ConfigError(_))
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            EngineError::HttpError(_) => "NET_001",
            EngineError::HttpStatus { .. } => "NET_002",
            EngineError::WebSocketError(_) => "NET_003",
            EngineError::WebSocketDisconnected(_) => "NET_004",
            EngineError::NetworkTimeout(_) => "NET_005",
            EngineError::InvalidMessage(_) => "DATA_001",
            EngineError::DeserializationError(_) => "DATA_002",
            EngineError::MissingData(_) => "DATA_003",
            EngineError::RiskRejected { .. } => "GATE_001",
            EngineError::OrganicRejected { .. } => "GATE_002",
            EngineError::ScamToken(_) => "GATE_003",
            EngineError::ReconnectExhausted(_) => "FEED_001",
            EngineError::ConfigError(_) => "CFG_001",
            EngineError::FileError(_) => "FILE_001",
            EngineError::ChannelClosed(_) => "SYS_001",
            EngineError::Stopped(_) => "SYS_002",
        }
    }
}
