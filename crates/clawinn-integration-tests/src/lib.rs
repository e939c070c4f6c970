//! Integration test crate for the clawinn simulation.
//!
//! Shared fixtures for the scenarios under `tests/`, which drive the
//! marketplace across crate boundaries with a manual clock.

#![forbid(unsafe_code)]

use chrono::{DateTime, TimeZone, Utc};
use clawinn_core::{
    Agent, AgentStatus, EventLog, ManualClock, MemoryStore, PopulationConfig, ScriptedContent,
    SimConfig, StoreSnapshot,
};
use clawinn_sim::Marketplace;

/// The marketplace type every scenario runs.
pub type TestMarket = Marketplace<MemoryStore, ScriptedContent, EventLog>;

/// Fixed start instant so runs are comparable.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A small population that still exercises role switching and tasks.
pub fn small_population() -> PopulationConfig {
    PopulationConfig {
        employers: 8,
        workers: 6,
        ..PopulationConfig::default()
    }
}

/// Config with a guaranteed job roll every tick.
pub fn busy_config() -> SimConfig {
    SimConfig {
        job_trigger_probability: 1.0,
        population: small_population(),
        ..SimConfig::default()
    }
}

/// Build a seeded marketplace over `store` with a shared manual clock.
pub fn market_with(
    store: MemoryStore,
    config: SimConfig,
    seed: u64,
) -> Result<(TestMarket, ManualClock, EventLog), clawinn_sim::SimError> {
    let clock = ManualClock::new(epoch());
    let events = EventLog::new();
    let market = Marketplace::builder(store, ScriptedContent, events.clone())
        .config(config)
        .clock(clock.clone())
        .seed(seed)
        .build()?;
    Ok((market, clock, events))
}

/// Sum of every agent balance in `snapshot`.
pub fn total_balance(snapshot: &StoreSnapshot) -> u64 {
    snapshot.agents.iter().map(|a| a.credits_balance).sum()
}

/// Sum of every jackpot payout in `snapshot`.
pub fn total_jackpots(snapshot: &StoreSnapshot) -> u64 {
    snapshot
        .jackpot_events
        .iter()
        .map(|j| j.credits_awarded)
        .sum()
}

/// Agents currently in `status`.
pub fn agents_in(snapshot: &StoreSnapshot, status: AgentStatus) -> Vec<&Agent> {
    snapshot
        .agents
        .iter()
        .filter(|a| a.status == status)
        .collect()
}
