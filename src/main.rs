/// Main entry point for the migration tracker
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mint_pulse::{
    clients::{JupiterClient, SolanaTrackerClient},
    config::{load_or_default, ConfigSource},
    data::WindowManager,
    discovery::TokenLifecycleGate,
    events::{EventRouter, FeedEvent},
    feed::{FeedConnectionManager, FeedState, WsConnector},
    polling::PollingCoordinator,
    service::MarketDataService,
    store::{InMemoryStore, TokenStore},
    time::{Clock, SystemClock},
    Config, LoggingConfig,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Application state
pub struct TrackerApp {
    feed: Arc<FeedConnectionManager>,
    poller: Arc<PollingCoordinator>,
    router: Arc<EventRouter>,
    service: Arc<MarketDataService>,
    events: Option<mpsc::Receiver<FeedEvent>>,
}

impl TrackerApp {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryStore::new());
        let windows = Arc::new(WindowManager::new(config.windows));

        let jupiter = Arc::new(
            JupiterClient::new(
                &config.api.jupiter_url,
                config.polling.fetch_timeout(),
                config.gate.max_requests_per_second,
            )
            .context("failed to build Jupiter client")?,
        );
        let risk = Arc::new(
            SolanaTrackerClient::new(
                &config.api.solana_tracker_url,
                config.gate.assessment_timeout(),
            )
            .context("failed to build Solana Tracker client")?,
        );

        let poller = Arc::new(PollingCoordinator::new(
            jupiter.clone(),
            Arc::clone(&windows),
            Arc::clone(&clock),
            config.polling.clone(),
        ));

        let gate = Arc::new(TokenLifecycleGate::new(
            risk,
            jupiter,
            Arc::clone(&poller),
            Arc::clone(&windows),
            Arc::clone(&store),
            Arc::clone(&clock),
            config.gate.clone(),
        ));

        let (events_tx, events_rx) = mpsc::channel(config.feed.event_queue_capacity);
        let feed = Arc::new(FeedConnectionManager::new(
            Arc::new(WsConnector),
            config.feed.clone(),
            events_tx,
            Arc::clone(&store),
            clock,
        ));

        let router = Arc::new(EventRouter::new(Arc::clone(&gate), Arc::clone(&store)));
        let service = Arc::new(MarketDataService::new(
            windows,
            Arc::clone(&poller),
            gate,
            Arc::clone(&feed),
            store,
        ));

        Ok(TrackerApp {
            feed,
            poller,
            router,
            service,
            events: Some(events_rx),
        })
    }

    /// Run until Ctrl+C
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("Migration tracker starting...");

        let events = self.events.take().context("event queue already taken")?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let router = Arc::clone(&self.router);
        let router_task = tokio::spawn(async move { router.run(events, stop_rx).await });

        self.poller.start();
        self.feed.start();

        let mut feed_state = self.feed.subscribe_state();
        let mut status_timer = tokio::time::interval(STATUS_INTERVAL);

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for Ctrl+C")?;
                    info!("Ctrl+C received - initiating graceful shutdown");
                    break;
                }
                Ok(()) = feed_state.changed() => {
                    let state = *feed_state.borrow_and_update();
                    if state == FeedState::Exhausted {
                        error!(
                            "🚨 Feed exhausted - tracked tokens keep polling, \
                             discovery resumes only after a restart"
                        );
                    }
                }
                _ = status_timer.tick() => {
                    let status = self.service.status();
                    info!(
                        "📊 {} tracked, {} pending, {} admitted, {} rejected, feed {}, {} cycles",
                        status.tracked_tokens,
                        status.pending_tokens,
                        status.admitted_total,
                        status.rejected_total,
                        status.feed_state.as_str(),
                        status.polling_cycles
                    );
                }
            }
        }

        self.shutdown_sequence(stop_tx, router_task).await;
        Ok(())
    }

    /// Feed first so nothing new is queued, then polling, then the router
    async fn shutdown_sequence(&self, stop_tx: watch::Sender<bool>, router_task: JoinHandle<()>) {
        info!("Starting shutdown sequence...");

        self.feed.stop().await;
        self.poller.stop().await;

        let _ = stop_tx.send(true);
        if let Err(e) = router_task.await {
            error!("Router task ended abnormally: {}", e);
        }

        let stats = self.router.stats();
        info!(
            "Shutdown complete: {} migrations, {} trades routed, {} events discarded",
            stats.migrations, stats.trades, stats.discarded
        );
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let (config, source) = load_or_default(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;
    init_tracing(&config.logging);

    match source {
        ConfigSource::File(path) => info!("Configuration loaded from {}", path.display()),
        ConfigSource::Defaults => warn!("Config file {} not found - using defaults", config_path),
    }
    info!("Feed {}", config.feed.ws_url);

    let app = TrackerApp::new(config)?;
    app.run().await?;

    Ok(())
}
