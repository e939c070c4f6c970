//! Stats broadcast and the standard phase order.

use std::sync::Arc;

use clawinn_core::{EventSink, MarketEvent, MarketStats, MarketStore};
use futures::future::BoxFuture;
use tracing::trace;

use crate::error::SimError;
use crate::scheduler::TickPhase;

/// Phase names of a standard tick, in run order.
pub const STANDARD_ORDER: [&str; 6] = [
    "job_trigger",
    "negotiations",
    "cooldown",
    "role_switch",
    "jackpot",
    "stats",
];

/// Recomputes marketplace totals and broadcasts them.
pub struct StatsBroadcast<S, B> {
    store: Arc<S>,
    events: Arc<B>,
}

impl<S: MarketStore, B: EventSink> StatsBroadcast<S, B> {
    /// Creates the phase.
    pub const fn new(store: Arc<S>, events: Arc<B>) -> Self {
        Self { store, events }
    }

    /// Compute and publish current totals.
    pub async fn broadcast(&self) -> Result<MarketStats, SimError> {
        let stats = self.store.stats().await?;
        trace!(
            agents = stats.total_agents,
            credits = stats.total_credits_in_circulation,
            negotiations = stats.active_negotiations,
            "stats updated"
        );
        self.events.publish(MarketEvent::StatsUpdated(stats));
        Ok(stats)
    }
}

impl<S: MarketStore, B: EventSink> TickPhase for StatsBroadcast<S, B> {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(async move { self.broadcast().await.map(|_| ()) })
    }
}
