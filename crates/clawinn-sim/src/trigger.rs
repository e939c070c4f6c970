//! Random job creation.

use std::sync::Arc;

use clawinn_core::{
    AgentFilter, AgentRole, ContentProvider, EventSink, MarketStore, NegotiationId, SimRng,
};
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::SimError;
use crate::negotiation::NegotiationCoordinator;
use crate::scheduler::TickPhase;

/// Each tick, maybe pairs one idle employer with one idle worker.
pub struct JobTrigger<S, C, B> {
    store: Arc<S>,
    coordinator: Arc<NegotiationCoordinator<S, C, B>>,
    rng: SimRng,
    probability: f64,
}

impl<S, C, B> JobTrigger<S, C, B>
where
    S: MarketStore,
    C: ContentProvider,
    B: EventSink,
{
    /// Creates a trigger firing with `probability` per tick.
    pub const fn new(
        store: Arc<S>,
        coordinator: Arc<NegotiationCoordinator<S, C, B>>,
        rng: SimRng,
        probability: f64,
    ) -> Self {
        Self {
            store,
            coordinator,
            rng,
            probability,
        }
    }

    /// Roll for a job; on success pick a random pair and hand it over.
    pub async fn maybe_trigger(&self) -> Result<Option<NegotiationId>, SimError> {
        if !self.rng.chance(self.probability) {
            return Ok(None);
        }
        self.trigger().await
    }

    /// Pick a random idle pair and open a negotiation, skipping the roll.
    pub async fn trigger(&self) -> Result<Option<NegotiationId>, SimError> {
        let employers = self
            .store
            .find_agents(AgentFilter::active(AgentRole::Employer))
            .await?;
        let workers = self
            .store
            .find_agents(AgentFilter::active(AgentRole::Worker))
            .await?;

        let (Some(e), Some(w)) = (self.rng.index(employers.len()), self.rng.index(workers.len()))
        else {
            debug!(
                employers = employers.len(),
                workers = workers.len(),
                "no idle pair for a job"
            );
            return Ok(None);
        };

        self.coordinator
            .initiate(employers[e].id, workers[w].id)
            .await
    }
}

impl<S, C, B> TickPhase for JobTrigger<S, C, B>
where
    S: MarketStore,
    C: ContentProvider,
    B: EventSink,
{
    fn name(&self) -> &'static str {
        "job_trigger"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(async move { self.maybe_trigger().await.map(|_| ()) })
    }
}
