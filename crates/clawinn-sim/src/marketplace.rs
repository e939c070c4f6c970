//! Wiring of the simulation components.

use std::sync::Arc;

use clawinn_core::{
    Clock, ContentProvider, EventSink, MarketStore, SimConfig, SimRng, SystemClock,
};

use crate::cooldown::CooldownManager;
use crate::error::SimError;
use crate::jackpot::JackpotLottery;
use crate::negotiation::NegotiationCoordinator;
use crate::phases::StatsBroadcast;
use crate::roles::RoleSwitcher;
use crate::scheduler::{TickPhase, TickScheduler};
use crate::settlement::HireSettlement;
use crate::startup::{RepairReport, repair_marketplace};
use crate::trigger::JobTrigger;

/// Builder for [`Marketplace`].
pub struct MarketplaceBuilder<S, C, B> {
    store: S,
    content: C,
    events: B,
    config: SimConfig,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<SimRng>,
}

impl<S, C, B> MarketplaceBuilder<S, C, B>
where
    S: MarketStore,
    C: ContentProvider,
    B: EventSink,
{
    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Seed the random generator for a reproducible run.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = Some(SimRng::from_seed(seed));
        self
    }

    /// Share an existing random generator.
    #[must_use]
    pub fn rng(mut self, rng: SimRng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Validate the configuration and wire everything together.
    pub fn build(self) -> Result<Marketplace<S, C, B>, SimError> {
        self.config.validate()?;

        let store = Arc::new(self.store);
        let events = Arc::new(self.events);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let rng = self.rng.unwrap_or_default();
        let config = self.config;

        let cooldowns = Arc::new(CooldownManager::new(
            Arc::clone(&store),
            Arc::clone(&events),
            Arc::clone(&clock),
            rng.clone(),
            config.cooldown.clone(),
        ));
        let settlement = Arc::new(HireSettlement::new(
            Arc::clone(&store),
            Arc::clone(&events),
            Arc::clone(&cooldowns),
            Arc::clone(&clock),
            rng.clone(),
        ));
        let coordinator = Arc::new(NegotiationCoordinator::new(
            Arc::clone(&store),
            Arc::new(self.content),
            Arc::clone(&events),
            Arc::clone(&settlement),
            Arc::clone(&clock),
            rng.clone(),
            config.negotiation.clone(),
        ));
        let trigger = Arc::new(JobTrigger::new(
            Arc::clone(&store),
            Arc::clone(&coordinator),
            rng.clone(),
            config.job_trigger_probability,
        ));
        let roles = Arc::new(RoleSwitcher::new(
            Arc::clone(&store),
            Arc::clone(&events),
            config.roles.clone(),
        ));
        let jackpot = Arc::new(JackpotLottery::new(
            Arc::clone(&store),
            Arc::clone(&events),
            Arc::clone(&clock),
            rng.clone(),
            config.jackpot.clone(),
        ));
        let stats = Arc::new(StatsBroadcast::new(Arc::clone(&store), Arc::clone(&events)));

        Ok(Marketplace {
            config,
            store,
            events,
            clock,
            rng,
            cooldowns,
            settlement,
            coordinator,
            trigger,
            roles,
            jackpot,
            stats,
        })
    }
}

/// A fully wired marketplace simulation.
///
/// Owns one instance of every component; nothing is global.
pub struct Marketplace<S, C, B> {
    config: SimConfig,
    store: Arc<S>,
    events: Arc<B>,
    clock: Arc<dyn Clock>,
    rng: SimRng,
    cooldowns: Arc<CooldownManager<S, B>>,
    settlement: Arc<HireSettlement<S, B>>,
    coordinator: Arc<NegotiationCoordinator<S, C, B>>,
    trigger: Arc<JobTrigger<S, C, B>>,
    roles: Arc<RoleSwitcher<S, B>>,
    jackpot: Arc<JackpotLottery<S, B>>,
    stats: Arc<StatsBroadcast<S, B>>,
}

impl<S, C, B> Marketplace<S, C, B>
where
    S: MarketStore,
    C: ContentProvider,
    B: EventSink,
{
    /// Start building a marketplace over `store`, `content` and `events`.
    pub fn builder(store: S, content: C, events: B) -> MarketplaceBuilder<S, C, B> {
        MarketplaceBuilder {
            store,
            content,
            events,
            config: SimConfig::default(),
            clock: None,
            rng: None,
        }
    }

    /// Active configuration.
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Shared handle to the store.
    pub fn store_handle(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// The event sink.
    pub fn events(&self) -> &B {
        &self.events
    }

    /// The clock every component reads.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The shared random generator.
    pub const fn rng(&self) -> &SimRng {
        &self.rng
    }

    /// Cooldown manager.
    pub fn cooldowns(&self) -> &CooldownManager<S, B> {
        &self.cooldowns
    }

    /// Hire settlement.
    pub fn settlement(&self) -> &HireSettlement<S, B> {
        &self.settlement
    }

    /// Negotiation coordinator.
    pub fn coordinator(&self) -> &NegotiationCoordinator<S, C, B> {
        &self.coordinator
    }

    /// Job trigger.
    pub fn trigger(&self) -> &JobTrigger<S, C, B> {
        &self.trigger
    }

    /// Role switcher.
    pub fn roles(&self) -> &RoleSwitcher<S, B> {
        &self.roles
    }

    /// Jackpot lottery.
    pub fn jackpot(&self) -> &JackpotLottery<S, B> {
        &self.jackpot
    }

    /// The phases of one tick, in run order.
    pub fn phases(&self) -> Vec<Arc<dyn TickPhase>> {
        vec![
            Arc::clone(&self.trigger) as Arc<dyn TickPhase>,
            Arc::clone(&self.coordinator) as Arc<dyn TickPhase>,
            Arc::clone(&self.cooldowns) as Arc<dyn TickPhase>,
            Arc::clone(&self.roles) as Arc<dyn TickPhase>,
            Arc::clone(&self.jackpot) as Arc<dyn TickPhase>,
            Arc::clone(&self.stats) as Arc<dyn TickPhase>,
        ]
    }

    /// A stopped scheduler over [`phases`](Self::phases) at the configured interval.
    pub fn scheduler(&self) -> TickScheduler {
        TickScheduler::new(self.config.tick_interval(), self.phases())
    }

    /// Clean up state left behind by an earlier run. Call before starting
    /// the scheduler.
    pub async fn repair(&self) -> Result<RepairReport, SimError> {
        repair_marketplace(
            self.store.as_ref(),
            self.events.as_ref(),
            &self.cooldowns,
            self.clock.as_ref(),
        )
        .await
    }
}
