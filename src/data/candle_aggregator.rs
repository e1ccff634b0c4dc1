/// Candle construction: 1s candles from ticks, 15s candles from 1s candles
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::data::{TokenSeries, WindowManager};
use crate::time::{fifteen_second_bucket, second_bucket};
use crate::types::{Candle, Tick};

/// 1s candles folded into one 15s candle, at most
const SECONDS_PER_FIFTEEN: usize = 15;

/// Candle resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    OneSecond,
    FifteenSeconds,
}

impl Resolution {
    pub fn as_str(&self) -> &str {
        match self {
            Resolution::OneSecond => "1s",
            Resolution::FifteenSeconds => "15s",
        }
    }

    pub fn width_secs(&self) -> i64 {
        match self {
            Resolution::OneSecond => 1,
            Resolution::FifteenSeconds => 15,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.width_secs())
    }

    /// Get bucket boundary timestamp
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Resolution::OneSecond => second_bucket(timestamp),
            Resolution::FifteenSeconds => fifteen_second_bucket(timestamp),
        }
    }
}

/// Candle in progress
#[derive(Debug, Clone)]
struct PartialCandle {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    trade_count: u64,
}

impl PartialCandle {
    fn from_tick(timestamp: DateTime<Utc>, tick: &Tick) -> Self {
        PartialCandle {
            timestamp,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.volume_24h.unwrap_or(0.0),
            trade_count: tick.trade_count.unwrap_or(0),
        }
    }

    fn update(&mut self, tick: &Tick) {
        self.close = tick.price;
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.volume += tick.volume_24h.unwrap_or(0.0);
        self.trade_count += tick.trade_count.unwrap_or(0);
    }

    fn from_candle(timestamp: DateTime<Utc>, candle: &Candle) -> Self {
        PartialCandle {
            timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            trade_count: candle.trade_count,
        }
    }

    fn merge(&mut self, candle: &Candle) {
        self.close = candle.close;
        self.high = self.high.max(candle.high);
        self.low = self.low.min(candle.low);
        self.volume += candle.volume;
        self.trade_count += candle.trade_count;
    }

    fn to_candle(&self) -> Candle {
        Candle {
            timestamp: self.timestamp,
            timestamp_ms: self.timestamp.timestamp_millis(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
        }
    }
}

/// Fold ticks (in arrival order) into one candle. `None` when there are no ticks.
pub fn candle_from_ticks<'a>(
    bucket: DateTime<Utc>,
    ticks: impl IntoIterator<Item = &'a Tick>,
) -> Option<Candle> {
    let mut ticks = ticks.into_iter();
    let mut partial = PartialCandle::from_tick(bucket, ticks.next()?);
    for tick in ticks {
        partial.update(tick);
    }
    Some(partial.to_candle())
}

/// Fold child candles (oldest first) into one parent candle
pub fn aggregate_candles<'a>(
    bucket: DateTime<Utc>,
    candles: impl IntoIterator<Item = &'a Candle>,
) -> Option<Candle> {
    let mut candles = candles.into_iter();
    let mut partial = PartialCandle::from_candle(bucket, candles.next()?);
    for candle in candles {
        partial.merge(candle);
    }
    Some(partial.to_candle())
}

fn build_second_in(series: &mut TokenSeries, bucket: DateTime<Utc>) -> Option<Candle> {
    let until = bucket + Resolution::OneSecond.duration();
    let candle = candle_from_ticks(bucket, series.ticks.window(bucket, until).iter())?;
    series.one_second.upsert(candle.clone());
    Some(candle)
}

fn build_fifteen_in(series: &mut TokenSeries, bucket: DateTime<Utc>) -> Option<Candle> {
    if series.one_second.is_empty() {
        return None;
    }

    let until = bucket + Resolution::FifteenSeconds.duration();
    let members = series
        .one_second
        .recent_in_range(bucket, until, SECONDS_PER_FIFTEEN);
    let candle = aggregate_candles(bucket, members.iter())?;
    series.fifteen_second.upsert(candle.clone());
    Some(candle)
}

/// Builds candles into the [`WindowManager`]'s per-token histories
pub struct CandleAggregator {
    windows: Arc<WindowManager>,
}

impl CandleAggregator {
    pub fn new(windows: Arc<WindowManager>) -> Self {
        CandleAggregator { windows }
    }

    /// Build (or rebuild) the 1s candle for the bucket containing `bucket_start`.
    /// Returns `None` when no ticks fall into the bucket; no flat candle is made up.
    pub fn build_second_candle(&self, mint: &str, bucket_start: DateTime<Utc>) -> Option<Candle> {
        let bucket = Resolution::OneSecond.bucket_start(bucket_start);
        let candle = self
            .windows
            .with_series(mint, |series| build_second_in(series, bucket))
            .flatten()?;

        debug!(
            mint = %mint,
            "📊 1s candle @ {} - O:{} H:{} L:{} C:{} V:{}",
            candle.timestamp, candle.open, candle.high, candle.low, candle.close, candle.volume
        );
        Some(candle)
    }

    /// Build (or replace) the 15s candle for the bucket containing `bucket_start`
    /// from the 1s candles inside that bucket.
    pub fn build_fifteen_second_candle(
        &self,
        mint: &str,
        bucket_start: DateTime<Utc>,
    ) -> Option<Candle> {
        let bucket = Resolution::FifteenSeconds.bucket_start(bucket_start);
        let candle = self
            .windows
            .with_series(mint, |series| build_fifteen_in(series, bucket))
            .flatten()?;

        debug!(
            mint = %mint,
            "📊 15s candle @ {} - O:{} H:{} L:{} C:{} V:{}",
            candle.timestamp, candle.open, candle.high, candle.low, candle.close, candle.volume
        );
        Some(candle)
    }

    /// Rebuild the 1s candle covering `at` and then its enclosing 15s candle,
    /// both under one lock so readers never see a 15s candle ahead of its children.
    pub fn refresh(&self, mint: &str, at: DateTime<Utc>) -> (Option<Candle>, Option<Candle>) {
        let second = Resolution::OneSecond.bucket_start(at);
        let fifteen = Resolution::FifteenSeconds.bucket_start(at);

        self.windows
            .with_series(mint, |series| {
                let one = build_second_in(series, second);
                let fifteen = match one {
                    Some(_) => build_fifteen_in(series, fifteen),
                    None => None,
                };
                (one, fifteen)
            })
            .unwrap_or((None, None))
    }
}
