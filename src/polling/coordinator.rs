/// Fixed-interval price polling for admitted tokens
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clients::PriceSource;
use crate::data::{CandleAggregator, WindowManager};
use crate::error::{EngineError, Result};
use crate::time::Clock;
use crate::types::PollingConfig;
use crate::utils::RateLimiter;

/// Outcome of a single polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Fetched, but the token was dropped while the fetch was in flight
    pub discarded: usize,
}

/// One cycle fetches every tracked token concurrently, each under its own
/// timeout, stamps the result with the completion time and feeds it to the
/// window manager and candle aggregator. One failed token never fails the
/// others. A cycle where every fetch failed makes the loop back off.
pub struct PollingCoordinator {
    tracked: RwLock<BTreeSet<String>>,
    source: Arc<dyn PriceSource>,
    limiter: RateLimiter,
    windows: Arc<WindowManager>,
    aggregator: CandleAggregator,
    clock: Arc<dyn Clock>,
    config: PollingConfig,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    stopping: AtomicBool,
    cycles: AtomicU64,
}

impl PollingCoordinator {
    pub fn new(
        source: Arc<dyn PriceSource>,
        windows: Arc<WindowManager>,
        clock: Arc<dyn Clock>,
        config: PollingConfig,
    ) -> Self {
        PollingCoordinator {
            tracked: RwLock::new(BTreeSet::new()),
            source,
            limiter: RateLimiter::new(config.max_requests_per_second),
            aggregator: CandleAggregator::new(Arc::clone(&windows)),
            windows,
            clock,
            config,
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
            stopping: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn add_token(&self, mint: &str) -> bool {
        let added = self.tracked.write().insert(mint.to_string());
        if added {
            info!(mint = %mint, "📈 Polling started");
        }
        added
    }

    pub fn remove_token(&self, mint: &str) -> bool {
        let removed = self.tracked.write().remove(mint);
        if removed {
            info!(mint = %mint, "Polling stopped");
        }
        removed
    }

    pub fn is_tracked(&self, mint: &str) -> bool {
        self.tracked.read().contains(mint)
    }

    pub fn tracked_tokens(&self) -> Vec<String> {
        self.tracked.read().iter().cloned().collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.read().len()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Poll every tracked token once.
    ///
    /// Errors only when every fetch failed, or with [`EngineError::Stopped`]
    /// when a stop arrived while fetches were in flight (results are dropped).
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mints = self.tracked_tokens();
        let mut report = CycleReport {
            attempted: mints.len(),
            ..CycleReport::default()
        };
        self.cycles.fetch_add(1, Ordering::Relaxed);

        if mints.is_empty() {
            return Ok(report);
        }

        let timeout = self.config.fetch_timeout();
        let fetches = mints.iter().map(move |mint| async move {
            // Waiting for a slot does not count against the fetch timeout
            self.limiter.acquire().await;
            let result = match tokio::time::timeout(timeout, self.source.latest_price(mint)).await
            {
                Ok(result) => result,
                Err(_) => Err(EngineError::NetworkTimeout(format!(
                    "price fetch exceeded {:?}",
                    timeout
                ))),
            };
            (mint, result.map(|snapshot| snapshot.into_tick(self.clock.now())))
        });
        let results = join_all(fetches).await;

        if self.stopping.load(Ordering::SeqCst) {
            return Err(EngineError::Stopped("polling".to_string()));
        }

        let mut last_error = None;
        for (mint, result) in results {
            match result {
                Ok(tick) => {
                    let at = tick.timestamp;
                    if !self.is_tracked(mint) || !self.windows.push(mint, tick) {
                        report.discarded += 1;
                        continue;
                    }
                    self.aggregator.refresh(mint, at);
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!(mint = %mint, "Price fetch failed: {} ({})", e, e.error_code());
                    report.failed += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if report.failed == report.attempted => Err(e),
            _ => Ok(report),
        }
    }

    /// Spawn the polling loop. A no-op while a loop is already running.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                debug!("Polling already running");
                return;
            }
        }

        self.stopping.store(false, Ordering::SeqCst);
        let (stop_tx, stop_rx) = watch::channel(false);
        *self.shutdown.lock() = Some(stop_tx);

        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move { this.run(stop_rx).await }));
        info!("🚀 Polling every {:?}", self.config.interval());
    }

    /// Stop the loop. Results of an in-flight cycle are discarded.
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(stop_tx) = self.shutdown.lock().take() {
            let _ = stop_tx.send(true);
        }

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Polling task ended abnormally: {}", e);
            }
        }
        info!("🛑 Polling stopped");
    }

    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }

            let cycle = tokio::select! {
                cycle = self.run_cycle() => cycle,
                _ = stop.changed() => break,
            };

            let pause = match cycle {
                Ok(report) => {
                    debug!(
                        "Cycle: {}/{} ok, {} failed, {} discarded",
                        report.succeeded, report.attempted, report.failed, report.discarded
                    );
                    self.config.interval()
                }
                Err(EngineError::Stopped(_)) => break,
                Err(e) => {
                    warn!(
                        "⚠️ Polling cycle failed: {}, backing off {:?}",
                        e,
                        self.config.error_backoff()
                    );
                    self.config.error_backoff()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = stop.changed() => break,
            }
        }
    }
}
