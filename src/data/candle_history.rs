/// Bounded candle history with upsert-by-time
use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::types::Candle;

/// What an upsert did to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Appended,
    Replaced,
    Inserted,
}

/// Ring buffer of candles with strictly increasing, unique bucket times
#[derive(Debug, Clone)]
pub struct CandleHistory {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        CandleHistory {
            candles: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert `candle`, replacing any candle already stored for its bucket.
    /// Evicts the oldest entries once the history is over capacity.
    pub fn upsert(&mut self, candle: Candle) -> Upsert {
        let outcome = match self.candles.back() {
            None => {
                self.candles.push_back(candle);
                Upsert::Appended
            }
            Some(last) if last.timestamp < candle.timestamp => {
                self.candles.push_back(candle);
                Upsert::Appended
            }
            Some(last) if last.timestamp == candle.timestamp => {
                if let Some(slot) = self.candles.back_mut() {
                    *slot = candle;
                }
                Upsert::Replaced
            }
            Some(_) => match self
                .candles
                .binary_search_by_key(&candle.timestamp, |c| c.timestamp)
            {
                Ok(index) => {
                    self.candles[index] = candle;
                    Upsert::Replaced
                }
                Err(index) => {
                    self.candles.insert(index, candle);
                    Upsert::Inserted
                }
            },
        };

        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }

        outcome
    }

    /// Get the last candle (most recent)
    pub fn get_last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn get(&self, bucket: DateTime<Utc>) -> Option<&Candle> {
        self.candles
            .binary_search_by_key(&bucket, |c| c.timestamp)
            .ok()
            .map(|index| &self.candles[index])
    }

    /// Get all candles, oldest first
    pub fn get_all(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    /// Most recent candles (at most `limit`) with `since <= timestamp < until`,
    /// returned oldest first
    pub fn recent_in_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Vec<Candle> {
        let mut selected: Vec<Candle> = self
            .candles
            .iter()
            .rev()
            .skip_while(|c| c.timestamp >= until)
            .take_while(|c| c.timestamp >= since)
            .take(limit)
            .cloned()
            .collect();
        selected.reverse();
        selected
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
