//! Balance-driven role switching.
//!
//! Poor employers become workers and rich workers become employers. Only
//! idle agents switch; an agent in a negotiation or cooldown keeps its role
//! until it is active again.

use std::sync::Arc;

use clawinn_core::{
    AgentFilter, AgentId, AgentRole, AgentStatus, EventSink, MarketEvent, MarketStore, RoleConfig,
};
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::info;

use crate::error::SimError;
use crate::scheduler::TickPhase;

/// The role an agent should switch to, if any.
pub fn next_role(role: AgentRole, balance: u64, config: &RoleConfig) -> Option<AgentRole> {
    match role {
        AgentRole::Employer if balance < config.employer_min_balance => Some(AgentRole::Worker),
        AgentRole::Worker if balance > config.worker_max_balance => Some(AgentRole::Employer),
        _ => None,
    }
}

/// One applied switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleChange {
    /// Who switched.
    pub agent_id: AgentId,
    /// Old role.
    pub from: AgentRole,
    /// New role.
    pub to: AgentRole,
}

/// Applies [`next_role`] to every active agent.
pub struct RoleSwitcher<S, B> {
    store: Arc<S>,
    events: Arc<B>,
    config: RoleConfig,
}

impl<S: MarketStore, B: EventSink> RoleSwitcher<S, B> {
    /// Creates a switcher.
    pub const fn new(store: Arc<S>, events: Arc<B>, config: RoleConfig) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Switch every active agent that crossed a threshold.
    pub async fn switch_roles(&self) -> Result<Vec<RoleChange>, SimError> {
        let mut changes = Vec::new();
        let idle = AgentFilter::with_status(AgentStatus::Active);
        for agent in self.store.find_agents(idle).await? {
            let Some(to) = next_role(agent.role, agent.credits_balance, &self.config) else {
                continue;
            };
            let updated = self.store.set_role(agent.id, to).await?;
            info!(
                agent_id = %agent.id,
                name = %agent.name,
                balance = agent.credits_balance,
                from = %agent.role,
                to = %to,
                "role switched"
            );
            self.events.publish(MarketEvent::role_changed(&updated));
            changes.push(RoleChange {
                agent_id: agent.id,
                from: agent.role,
                to,
            });
        }
        Ok(changes)
    }
}

impl<S: MarketStore, B: EventSink> TickPhase for RoleSwitcher<S, B> {
    fn name(&self) -> &'static str {
        "role_switch"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(async move { self.switch_roles().await.map(|_| ()) })
    }
}
