//! Startup repair.
//!
//! A previous run may have stopped mid-negotiation or mid-cooldown. In-flight
//! negotiations are only held in memory, so after a restart every agent left
//! in `Negotiating` is stranded and every `Active` negotiation record is
//! orphaned. This pass puts the store back into a state the tick loop can
//! work from. Run it before the scheduler starts.

use clawinn_core::{
    AgentFilter, AgentStatus, Clock, EventSink, MarketEvent, MarketStore, NegotiationStatus,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cooldown::CooldownManager;
use crate::error::SimError;

/// What [`repair_marketplace`] fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Active negotiation records concluded as rejected.
    pub stale_negotiations_closed: usize,
    /// Agents moved from `Negotiating` back to `Active`.
    pub negotiating_restored: usize,
    /// Cooldown agents released because they had no end time.
    pub cooldowns_without_end: usize,
    /// Cooldowns that had expired while the simulation was down.
    pub expired_cooldowns: usize,
    /// Non-cooldown agents whose leftover end time was cleared.
    pub stray_cooldown_cleared: usize,
}

impl RepairReport {
    /// Returns true if nothing needed fixing.
    pub const fn is_clean(&self) -> bool {
        self.stale_negotiations_closed == 0
            && self.negotiating_restored == 0
            && self.cooldowns_without_end == 0
            && self.expired_cooldowns == 0
            && self.stray_cooldown_cleared == 0
    }
}

/// Repair state left behind by an earlier run.
pub async fn repair_marketplace<S, B>(
    store: &S,
    events: &B,
    cooldowns: &CooldownManager<S, B>,
    clock: &dyn Clock,
) -> Result<RepairReport, SimError>
where
    S: MarketStore,
    B: EventSink,
{
    let now = clock.now();
    let mut report = RepairReport::default();

    for record in store
        .list_negotiations(Some(NegotiationStatus::Active))
        .await?
    {
        store
            .conclude_negotiation(record.id, NegotiationStatus::Rejected, None, now)
            .await?;
        report.stale_negotiations_closed += 1;
    }

    for agent in store
        .find_agents(AgentFilter::with_status(AgentStatus::Negotiating))
        .await?
    {
        let agent = store.set_status(agent.id, AgentStatus::Active).await?;
        events.publish(MarketEvent::status_changed(&agent));
        report.negotiating_restored += 1;
    }

    let cooling = store
        .find_agents(AgentFilter::with_status(AgentStatus::Cooldown))
        .await?;
    report.cooldowns_without_end = cooling
        .iter()
        .filter(|a| a.cooldown_ends_at.is_none())
        .count();
    if report.cooldowns_without_end > 0 {
        warn!(
            count = report.cooldowns_without_end,
            "cooldown agents without an end time"
        );
    }
    let released = cooldowns.sweep().await?.len();
    report.expired_cooldowns = released.saturating_sub(report.cooldowns_without_end);

    for agent in store.find_agents(AgentFilter::all()).await? {
        if agent.status != AgentStatus::Cooldown && agent.cooldown_ends_at.is_some() {
            store.set_status(agent.id, agent.status).await?;
            report.stray_cooldown_cleared += 1;
        }
    }

    if report.is_clean() {
        info!("marketplace state is consistent");
    } else {
        info!(
            stale_negotiations = report.stale_negotiations_closed,
            negotiating = report.negotiating_restored,
            cooldowns_without_end = report.cooldowns_without_end,
            expired_cooldowns = report.expired_cooldowns,
            stray_cooldowns = report.stray_cooldown_cleared,
            "marketplace repaired"
        );
    }
    Ok(report)
}
