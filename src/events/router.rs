/// Drains the feed queue on the processing side
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::discovery::TokenLifecycleGate;
use crate::events::FeedEvent;
use crate::store::{log_store_failure, TokenStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub migrations: u64,
    pub duplicates: u64,
    pub trades: u64,
    /// Left in the queue at shutdown
    pub discarded: u64,
}

/// Migrations go to the lifecycle gate, trades to the store. The feed's read
/// loop never waits on either.
pub struct EventRouter {
    gate: Arc<TokenLifecycleGate>,
    store: Arc<dyn TokenStore>,
    migrations: AtomicU64,
    duplicates: AtomicU64,
    trades: AtomicU64,
    discarded: AtomicU64,
}

impl EventRouter {
    pub fn new(gate: Arc<TokenLifecycleGate>, store: Arc<dyn TokenStore>) -> Self {
        EventRouter {
            gate,
            store,
            migrations: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            trades: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            migrations: self.migrations.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            trades: self.trades.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    /// Process events until the queue closes or `stop` flips.
    /// Events still queued at stop are dropped.
    pub async fn run(&self, mut events: mpsc::Receiver<FeedEvent>, mut stop: watch::Receiver<bool>) {
        info!("🚀 Event router started");

        loop {
            let event = tokio::select! {
                biased;
                _ = stop.changed() => {
                    events.close();
                    let mut dropped = 0;
                    while events.try_recv().is_ok() {
                        dropped += 1;
                    }
                    self.discarded.fetch_add(dropped, Ordering::Relaxed);
                    info!("Event router stopping, {} queued events discarded", dropped);
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.route(event).await;
        }

        info!("🛑 Event router stopped");
    }

    pub async fn route(&self, event: FeedEvent) {
        match event {
            FeedEvent::Migration(migration) => match self.gate.on_migration(migration) {
                Some(_) => {
                    self.migrations.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    self.duplicates.fetch_add(1, Ordering::Relaxed);
                }
            },
            FeedEvent::Trade(trade) => {
                debug!(mint = %trade.mint, "Trade event");
                self.trades.fetch_add(1, Ordering::Relaxed);
                log_store_failure(
                    "save_trade_data",
                    self.store.save_trade_data(&trade.payload).await,
                );
            }
        }
    }
}
