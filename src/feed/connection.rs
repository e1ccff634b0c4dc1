/// Feed connection manager
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, ErrorKind};
use crate::events::{decode_message, Channel, FeedEvent, SubscribeRequest};
use crate::feed::{FeedConnector, FeedSession};
use crate::store::{log_store_failure, TokenStore};
use crate::time::Clock;
use crate::types::{Alert, AlertSeverity, AlertType, FeedConfig};
use crate::utils::generate_idempotency_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Stopped,
    /// Reconnect budget spent. Needs an operator.
    Exhausted,
}

impl FeedState {
    pub fn as_str(&self) -> &str {
        match self {
            FeedState::Idle => "IDLE",
            FeedState::Connecting => "CONNECTING",
            FeedState::Connected => "CONNECTED",
            FeedState::Reconnecting { .. } => "RECONNECTING",
            FeedState::Stopped => "STOPPED",
            FeedState::Exhausted => "EXHAUSTED",
        }
    }
}

enum SessionEnd {
    Stopped,
    Disconnected(String),
}

/// Owns the single feed session. It subscribes on every open, turns inbound
/// frames into [`FeedEvent`]s on a bounded queue and reconnects after a fixed
/// delay. The reconnect budget counts consecutive failed reconnections and is
/// refilled by every successful open. Once spent the manager parks in
/// [`FeedState::Exhausted`] and raises a critical alert.
pub struct FeedConnectionManager {
    connector: Arc<dyn FeedConnector>,
    config: FeedConfig,
    events_tx: mpsc::Sender<FeedEvent>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    state_tx: watch::Sender<FeedState>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    connects: AtomicU32,
    dropped: AtomicU64,
}

impl FeedConnectionManager {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        config: FeedConfig,
        events_tx: mpsc::Sender<FeedEvent>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(FeedState::Idle);

        FeedConnectionManager {
            connector,
            config,
            events_tx,
            store,
            clock,
            state_tx,
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
            connects: AtomicU32::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    /// Connection attempts made so far, the initial one included
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Events dropped because the queue was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Spawn the connection loop. A no-op while a loop is already running.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                debug!("Feed already running");
                return;
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.shutdown.lock() = Some(stop_tx);

        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move { this.run(stop_rx).await }));
        info!("🚀 Feed started: {}", self.config.ws_url);
    }

    /// Stop the loop and close the session. No reconnect happens afterwards.
    pub async fn stop(&self) {
        if let Some(stop_tx) = self.shutdown.lock().take() {
            let _ = stop_tx.send(true);
        }

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Feed task ended abnormally: {}", e);
            }
        }

        self.state_tx.send_modify(|state| {
            if *state != FeedState::Exhausted {
                *state = FeedState::Stopped;
            }
        });
        info!("🛑 Feed stopped");
    }

    fn set_state(&self, state: FeedState) {
        self.state_tx.send_replace(state);
    }

    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;

        loop {
            if *stop.borrow() {
                break;
            }

            if attempt == 0 {
                self.set_state(FeedState::Connecting);
            }
            self.connects.fetch_add(1, Ordering::Relaxed);

            let connected = tokio::select! {
                result = self.connector.connect(&self.config.ws_url) => result,
                _ = stop.changed() => break,
            };

            match connected {
                Ok(mut session) => {
                    attempt = 0;
                    match self.serve(session.as_mut(), &mut stop).await {
                        SessionEnd::Stopped => {
                            session.close().await;
                            break;
                        }
                        SessionEnd::Disconnected(reason) => {
                            warn!("⚠️ Feed disconnected: {}", reason);
                        }
                    }
                }
                Err(e) => {
                    warn!("⚠️ Feed connection failed: {} ({})", e, e.error_code());
                }
            }

            if attempt >= self.config.max_reconnect_attempts {
                self.exhaust().await;
                return;
            }

            attempt += 1;
            self.set_state(FeedState::Reconnecting { attempt });
            info!(
                "🔄 Reconnecting in {:?} (attempt {}/{})",
                self.config.reconnect_delay(),
                attempt,
                self.config.max_reconnect_attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay()) => {}
                _ = stop.changed() => break,
            }
        }

        self.set_state(FeedState::Stopped);
    }

    async fn serve(
        &self,
        session: &mut dyn FeedSession,
        stop: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        self.set_state(FeedState::Connected);
        info!("✅ Feed connected");

        for channel in Channel::ALL {
            let request = match SubscribeRequest::new(channel).to_json() {
                Ok(request) => request,
                Err(e) => return SessionEnd::Disconnected(e.to_string()),
            };
            if let Err(e) = session.send_text(request).await {
                return SessionEnd::Disconnected(e.to_string());
            }
            info!("📡 Subscribed: {}", channel.method());
        }

        loop {
            let next = tokio::select! {
                next = session.next_text() => next,
                _ = stop.changed() => return SessionEnd::Stopped,
            };

            match next {
                None => return SessionEnd::Disconnected("closed by server".to_string()),
                Some(Ok(text)) => self.dispatch(&text),
                Some(Err(e)) if e.kind() == ErrorKind::Validation => {
                    warn!("Dropping unreadable frame: {}", e);
                }
                Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let event = match decode_message(text) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("Ignoring non-event message");
                return;
            }
            Err(e) => {
                warn!("Dropping malformed feed message: {} ({})", e, e.error_code());
                return;
            }
        };

        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(mint = %event.mint(), "Event queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                let err = EngineError::ChannelClosed("feed event queue".to_string());
                warn!(mint = %event.mint(), "Dropping event: {} ({})", err, err.error_code());
            }
        }
    }

    async fn exhaust(&self) {
        let err = EngineError::ReconnectExhausted(self.config.max_reconnect_attempts);
        error!("🚨 {} - operator intervention required", err);

        let now = self.clock.now();
        let alert = Alert::new(
            None,
            AlertType::EmergencyStop,
            AlertSeverity::Critical,
            format!("Feed offline: {}", err),
            generate_idempotency_key(&["feed_exhausted", &now.timestamp_millis().to_string()]),
            now,
        );
        log_store_failure("create_alert", self.store.create_alert(alert).await);

        self.set_state(FeedState::Exhausted);
    }
}
