//! Worker cooldowns.
//!
//! A hired worker is unavailable for a random 15-20 minutes. The deadline is
//! stored on the agent and checked each tick; no timers are spawned.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clawinn_core::{
    Agent, AgentFilter, AgentId, AgentStatus, Clock, CooldownConfig, EventSink, MarketEvent,
    MarketStore, SimRng,
};
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::error::SimError;
use crate::scheduler::TickPhase;

/// Assigns and expires cooldowns.
pub struct CooldownManager<S, B> {
    store: Arc<S>,
    events: Arc<B>,
    clock: Arc<dyn Clock>,
    rng: SimRng,
    config: CooldownConfig,
}

impl<S: MarketStore, B: EventSink> CooldownManager<S, B> {
    /// Creates a manager.
    pub fn new(
        store: Arc<S>,
        events: Arc<B>,
        clock: Arc<dyn Clock>,
        rng: SimRng,
        config: CooldownConfig,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            rng,
            config,
        }
    }

    /// A random cooldown length within the configured bounds, in milliseconds.
    pub fn draw_duration_ms(&self) -> u64 {
        self.rng.between(self.config.min_ms, self.config.max_ms)
    }

    /// Deadline for a cooldown starting at `now`.
    pub fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let ms = i64::try_from(self.draw_duration_ms()).unwrap_or(i64::MAX);
        now + Duration::milliseconds(ms)
    }

    /// Put `agent_id` into cooldown starting now.
    pub async fn assign(&self, agent_id: AgentId) -> Result<Agent, SimError> {
        let ends_at = self.deadline_from(self.clock.now());
        let agent = self.store.begin_cooldown(agent_id, ends_at).await?;
        debug!(agent_id = %agent_id, ends_at = %ends_at, "cooldown assigned");
        self.events.publish(MarketEvent::status_changed(&agent));
        Ok(agent)
    }

    /// Release every agent whose cooldown has expired.
    ///
    /// The worker's in-progress tasks are completed before the agent is
    /// released, so a sweep interrupted by a store failure picks up where it
    /// left off and nothing is completed twice. Returns the released agents.
    pub async fn sweep(&self) -> Result<Vec<AgentId>, SimError> {
        let now = self.clock.now();
        let cooling = self
            .store
            .find_agents(AgentFilter::with_status(AgentStatus::Cooldown))
            .await?;

        let mut released = Vec::new();
        for agent in cooling {
            if agent.cooldown_ends_at.is_some_and(|ends| ends > now) {
                continue;
            }

            for task in self.store.complete_worker_tasks(agent.id, now).await? {
                self.events.publish(MarketEvent::task_changed(&task));
            }

            if let Some(agent) = self.store.end_cooldown(agent.id).await? {
                info!(agent_id = %agent.id, name = %agent.name, "cooldown expired");
                self.events.publish(MarketEvent::status_changed(&agent));
                released.push(agent.id);
            }
        }
        Ok(released)
    }
}

impl<S: MarketStore, B: EventSink> TickPhase for CooldownManager<S, B> {
    fn name(&self) -> &'static str {
        "cooldown"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(async move { self.sweep().await.map(|_| ()) })
    }
}
