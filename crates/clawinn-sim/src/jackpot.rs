//! Hourly jackpot lottery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clawinn_core::{
    AgentFilter, Clock, EventSink, JackpotConfig, JackpotEvent, MarketEvent, MarketStore, SimRng,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::SimError;
use crate::scheduler::TickPhase;

/// Returns true if a draw is due. The first check always runs.
pub fn should_run(last_check: Option<DateTime<Utc>>, now: DateTime<Utc>, interval_ms: u64) -> bool {
    last_check.is_none_or(|last| {
        let elapsed = (now - last).num_milliseconds();
        elapsed >= 0 && elapsed as u64 >= interval_ms
    })
}

/// Rate-limited lottery over every agent.
pub struct JackpotLottery<S, B> {
    store: Arc<S>,
    events: Arc<B>,
    clock: Arc<dyn Clock>,
    rng: SimRng,
    config: JackpotConfig,
    last_check: Mutex<Option<DateTime<Utc>>>,
}

impl<S: MarketStore, B: EventSink> JackpotLottery<S, B> {
    /// Creates a lottery that has never drawn.
    pub fn new(
        store: Arc<S>,
        events: Arc<B>,
        clock: Arc<dyn Clock>,
        rng: SimRng,
        config: JackpotConfig,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            rng,
            config,
            last_check: Mutex::new(None),
        }
    }

    /// Time of the last draw.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        *self.last_check.lock()
    }

    /// Draw if the interval has elapsed. Returns the awards made.
    ///
    /// The check time is recorded before drawing, so a failed draw waits a
    /// full interval like a successful one.
    pub async fn draw_if_due(&self) -> Result<Vec<JackpotEvent>, SimError> {
        let now = self.clock.now();
        {
            let mut last = self.last_check.lock();
            if !should_run(*last, now, self.config.interval_ms) {
                return Ok(Vec::new());
            }
            *last = Some(now);
        }
        self.draw(now).await
    }

    async fn draw(&self, now: DateTime<Utc>) -> Result<Vec<JackpotEvent>, SimError> {
        let agents = self.store.find_agents(AgentFilter::all()).await?;
        let winners: Vec<_> = agents
            .into_iter()
            .filter(|_| self.rng.chance(self.config.probability))
            .collect();
        debug!(winners = winners.len(), "jackpot drawn");

        let mut awards = Vec::with_capacity(winners.len());
        for winner in winners {
            let event = JackpotEvent {
                id: self.rng.uuid(),
                agent_id: winner.id,
                credits_awarded: self.config.amount,
                timestamp: now,
            };
            let agent = self.store.award_jackpot(event.clone()).await?;
            info!(
                agent_id = %agent.id,
                name = %agent.name,
                credits = event.credits_awarded,
                balance = agent.credits_balance,
                "jackpot awarded"
            );
            self.events.publish(MarketEvent::balance_changed(&agent));
            self.events.publish(MarketEvent::jackpot_awarded(&event));
            awards.push(event);
        }
        Ok(awards)
    }
}

impl<S: MarketStore, B: EventSink> TickPhase for JackpotLottery<S, B> {
    fn name(&self) -> &'static str {
        "jackpot"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(async move { self.draw_if_due().await.map(|_| ()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use clawinn_core::{Agent, AgentRole, EventLog, ManualClock, MemoryStore};
    use uuid::Uuid;

    async fn lottery(probability: f64) -> (Arc<MemoryStore>, EventLog, ManualClock, JackpotLottery<MemoryStore, EventLog>) {
        let store = Arc::new(MemoryStore::new());
        let events = EventLog::new();
        let clock = ManualClock::default();
        for (i, role) in [AgentRole::Worker, AgentRole::Employer, AgentRole::Worker]
            .into_iter()
            .enumerate()
        {
            let agent = Agent::new(Uuid::new_v4(), format!("Agent{i}"), role, 500, clock.now());
            store.insert_agent(agent).await.unwrap();
        }
        let config = JackpotConfig {
            probability,
            ..JackpotConfig::default()
        };
        let lottery = JackpotLottery::new(
            Arc::clone(&store),
            Arc::new(events.clone()),
            Arc::new(clock.clone()),
            SimRng::from_seed(99),
            config,
        );
        (store, events, clock, lottery)
    }

    #[test]
    fn interval_gate() {
        let now = Utc::now();
        assert!(should_run(None, now, 3_600_000));
        assert!(!should_run(Some(now - Duration::milliseconds(3_599_999)), now, 3_600_000));
        assert!(should_run(Some(now - Duration::milliseconds(3_600_000)), now, 3_600_000));
        assert!(!should_run(Some(now + Duration::seconds(5)), now, 3_600_000));
    }

    #[tokio::test]
    async fn certain_win_pays_everyone_once_per_interval() {
        let (store, events, clock, lottery) = lottery(1.0).await;

        let awards = lottery.draw_if_due().await.unwrap();
        assert_eq!(awards.len(), 3);
        assert_eq!(store.stats().await.unwrap().total_credits_in_circulation, 1_500 + 30_000);
        assert_eq!(events.count("jackpot:awarded"), 3);
        assert_eq!(events.count("agent:balanceChanged"), 3);

        clock.advance_ms(60_000);
        assert!(lottery.draw_if_due().await.unwrap().is_empty());

        clock.advance_ms(3_540_000);
        assert_eq!(lottery.draw_if_due().await.unwrap().len(), 3);
        assert_eq!(store.list_jackpot_events().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn zero_probability_never_pays() {
        let (store, _, _, lottery) = lottery(0.0).await;
        assert!(lottery.draw_if_due().await.unwrap().is_empty());
        assert!(lottery.last_check().is_some());
        assert_eq!(store.stats().await.unwrap().total_credits_in_circulation, 1_500);
    }

    #[tokio::test]
    async fn failed_draw_still_consumes_the_interval() {
        let (store, _, _, lottery) = lottery(1.0).await;
        store.set_offline(true);
        assert!(lottery.draw_if_due().await.is_err());
        store.set_offline(false);
        assert!(lottery.draw_if_due().await.unwrap().is_empty());
    }
}
