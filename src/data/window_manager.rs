/// Keyed per-token store for ticks and candle histories
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::data::candle_aggregator::Resolution;
use crate::data::{CandleHistory, TickBuffer, TickWindow};
use crate::types::{Candle, Tick, WindowConfig};

/// All rolling state for one token
#[derive(Debug)]
pub struct TokenSeries {
    pub ticks: TickBuffer,
    pub one_second: CandleHistory,
    pub fifteen_second: CandleHistory,
}

impl TokenSeries {
    pub fn new(limits: &WindowConfig) -> Self {
        TokenSeries {
            ticks: TickBuffer::new(limits.max_ticks),
            one_second: CandleHistory::new(limits.max_one_second_candles),
            fifteen_second: CandleHistory::new(limits.max_fifteen_second_candles),
        }
    }

    pub fn history(&self, resolution: Resolution) -> &CandleHistory {
        match resolution {
            Resolution::OneSecond => &self.one_second,
            Resolution::FifteenSeconds => &self.fifteen_second,
        }
    }
}

/// Each mint owns one [`TokenSeries`] behind its own mutex, so work on
/// different tokens never contends while work on the same token is serialized.
pub struct WindowManager {
    series: DashMap<String, Arc<Mutex<TokenSeries>>>,
    limits: WindowConfig,
}

impl WindowManager {
    pub fn new(limits: WindowConfig) -> Self {
        WindowManager {
            series: DashMap::new(),
            limits,
        }
    }

    /// Start tracking `mint`. Returns false if it was already tracked.
    pub fn register(&self, mint: &str) -> bool {
        match self.series.entry(mint.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(TokenSeries::new(&self.limits))));
                info!(mint = %mint, "➕ Window registered");
                true
            }
        }
    }

    /// Stop tracking `mint` and discard its buffers
    pub fn deregister(&self, mint: &str) -> bool {
        let removed = self.series.remove(mint).is_some();
        if removed {
            info!(mint = %mint, "➖ Window discarded");
        }
        removed
    }

    pub fn is_registered(&self, mint: &str) -> bool {
        self.series.contains_key(mint)
    }

    pub fn tracked_count(&self) -> usize {
        self.series.len()
    }

    fn series(&self, mint: &str) -> Option<Arc<Mutex<TokenSeries>>> {
        self.series.get(mint).map(|entry| Arc::clone(entry.value()))
    }

    /// Append a tick. Returns false when `mint` is not tracked.
    pub fn push(&self, mint: &str, tick: Tick) -> bool {
        match self.series(mint) {
            Some(series) => {
                series.lock().ticks.push(tick);
                true
            }
            None => {
                debug!(mint = %mint, "Dropping tick for untracked token");
                false
            }
        }
    }

    /// Run `f` with exclusive access to the token's series
    pub fn with_series<R>(&self, mint: &str, f: impl FnOnce(&mut TokenSeries) -> R) -> Option<R> {
        let series = self.series(mint)?;
        let mut guard = series.lock();
        Some(f(&mut guard))
    }

    /// Run `f` over the ticks in `[since, until)`
    pub fn with_window<R>(
        &self,
        mint: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        f: impl FnOnce(TickWindow<'_>) -> R,
    ) -> Option<R> {
        self.with_series(mint, |series| f(series.ticks.window(since, until)))
    }

    /// Snapshot of the ticks in `[since, until)`, arrival order
    pub fn window(&self, mint: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<Tick> {
        self.with_window(mint, since, until, |window| window.to_vec())
            .unwrap_or_default()
    }

    pub fn latest_tick(&self, mint: &str) -> Option<Tick> {
        self.with_series(mint, |series| series.ticks.get_last().cloned())
            .flatten()
    }

    pub fn latest_candle(&self, mint: &str, resolution: Resolution) -> Option<Candle> {
        self.with_series(mint, |series| series.history(resolution).get_last().cloned())
            .flatten()
    }

    pub fn candles(&self, mint: &str, resolution: Resolution) -> Vec<Candle> {
        self.with_series(mint, |series| series.history(resolution).get_all())
            .unwrap_or_default()
    }

    /// Market cap carried by the latest tick, if any
    pub fn current_market_cap(&self, mint: &str) -> Option<f64> {
        self.latest_tick(mint).and_then(|tick| tick.market_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn limits() -> WindowConfig {
        WindowConfig {
            max_ticks: 3,
            max_one_second_candles: 5,
            max_fifteen_second_candles: 5,
        }
    }

    #[test]
    fn test_push_requires_registration() {
        let manager = WindowManager::new(limits());
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();

        assert!(!manager.push("mintA", Tick::new(now, 1.0)));
        assert!(manager.register("mintA"));
        assert!(!manager.register("mintA"));
        assert!(manager.push("mintA", Tick::new(now, 1.0)));
        assert_eq!(manager.tracked_count(), 1);
    }

    #[test]
    fn test_deregister_discards_buffers() {
        let manager = WindowManager::new(limits());
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();

        manager.register("mintA");
        manager.push("mintA", Tick::new(now, 1.0));
        assert!(manager.deregister("mintA"));

        assert!(manager.latest_tick("mintA").is_none());
        assert!(manager.candles("mintA", Resolution::OneSecond).is_empty());

        // Re-registering starts from scratch
        manager.register("mintA");
        assert!(manager.latest_tick("mintA").is_none());
    }

    #[test]
    fn test_tokens_are_isolated() {
        let manager = WindowManager::new(limits());
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();

        manager.register("mintA");
        manager.register("mintB");
        for i in 0..10 {
            manager.push("mintA", Tick::new(now + Duration::milliseconds(i * 10), i as f64));
        }
        manager.push("mintB", Tick::new(now, 42.0));

        assert_eq!(manager.with_series("mintA", |s| s.ticks.len()), Some(3));
        assert_eq!(manager.latest_tick("mintB").unwrap().price, 42.0);
    }

    #[test]
    fn test_market_cap_from_latest_tick() {
        let manager = WindowManager::new(limits());
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        manager.register("mintA");

        assert_eq!(manager.current_market_cap("mintA"), None);

        let mut tick = Tick::new(now, 0.0012);
        tick.market_cap = Some(81_000.0);
        manager.push("mintA", tick);
        assert_eq!(manager.current_market_cap("mintA"), Some(81_000.0));

        manager.push("mintA", Tick::new(now + Duration::seconds(1), 0.0013));
        assert_eq!(manager.current_market_cap("mintA"), None);
    }

    #[test]
    fn test_window_snapshot() {
        let manager = WindowManager::new(limits());
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        manager.register("mintA");
        manager.push("mintA", Tick::new(now, 1.0));
        manager.push("mintA", Tick::new(now + Duration::seconds(1), 2.0));

        let ticks = manager.window("mintA", now, now + Duration::seconds(1));
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].price, 1.0);
        assert!(manager.window("unknown", now, now + Duration::seconds(1)).is_empty());
    }
}
