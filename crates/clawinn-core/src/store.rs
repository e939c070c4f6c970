//! Persistence port.
//!
//! The simulation never touches storage directly; everything goes through a
//! [`MarketStore`]. Operations that must be atomic (the hire transfer and the
//! jackpot award) are single trait methods so an implementation can run them
//! inside one transaction.

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{
    Agent, AgentId, AgentRole, AgentStatus, ChatMessage, HireEvent, HireEventId, HireReceipt,
    JackpotEvent, MarketStats, NegotiationId, NegotiationRecord, NegotiationStatus, Task, TaskId,
};

/// Selects agents by role and/or status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentFilter {
    /// Only agents with this role.
    pub role: Option<AgentRole>,
    /// Only agents with this status.
    pub status: Option<AgentStatus>,
}

impl AgentFilter {
    /// Matches every agent.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            role: None,
            status: None,
        }
    }

    /// Active agents with the given role.
    #[must_use]
    pub const fn active(role: AgentRole) -> Self {
        Self {
            role: Some(role),
            status: Some(AgentStatus::Active),
        }
    }

    /// Agents with the given status, any role.
    #[must_use]
    pub const fn with_status(status: AgentStatus) -> Self {
        Self {
            role: None,
            status: Some(status),
        }
    }

    /// Returns true if `agent` passes the filter.
    #[must_use]
    pub fn matches(&self, agent: &Agent) -> bool {
        self.role.is_none_or(|r| r == agent.role) && self.status.is_none_or(|s| s == agent.status)
    }
}

/// Storage for marketplace state.
///
/// Every method may suspend. Implementations return
/// [`StoreError::Unavailable`] for transient failures.
#[allow(async_fn_in_trait)]
pub trait MarketStore: Send + Sync + 'static {
    // ---- agents ----

    /// Fetch one agent.
    fn get_agent(
        &self,
        id: AgentId,
    ) -> impl std::future::Future<Output = Result<Agent, StoreError>> + Send;

    /// Agents matching `filter`, in insertion order.
    fn find_agents(
        &self,
        filter: AgentFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Agent>, StoreError>> + Send;

    /// Add a new agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the id is taken.
    fn insert_agent(
        &self,
        agent: Agent,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Set a non-cooldown status and clear any cooldown end time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] for `Cooldown`; use
    /// [`begin_cooldown`](Self::begin_cooldown) for that.
    fn set_status(
        &self,
        id: AgentId,
        status: AgentStatus,
    ) -> impl std::future::Future<Output = Result<Agent, StoreError>> + Send;

    /// Put an agent in cooldown until `ends_at`.
    fn begin_cooldown(
        &self,
        id: AgentId,
        ends_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Agent, StoreError>> + Send;

    /// Restore a cooldown agent to active.
    ///
    /// Returns `None` if the agent was not in cooldown, so a cooldown is only
    /// ever ended once.
    fn end_cooldown(
        &self,
        id: AgentId,
    ) -> impl std::future::Future<Output = Result<Option<Agent>, StoreError>> + Send;

    /// Change an agent's role.
    fn set_role(
        &self,
        id: AgentId,
        role: AgentRole,
    ) -> impl std::future::Future<Output = Result<Agent, StoreError>> + Send;

    // ---- negotiations ----

    /// Persist a new negotiation record.
    fn create_negotiation(
        &self,
        record: NegotiationRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Fetch one negotiation record.
    fn get_negotiation(
        &self,
        id: NegotiationId,
    ) -> impl std::future::Future<Output = Result<NegotiationRecord, StoreError>> + Send;

    /// Negotiation records, optionally restricted to one status.
    fn list_negotiations(
        &self,
        status: Option<NegotiationStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<NegotiationRecord>, StoreError>> + Send;

    /// Record the latest offer and counter round.
    fn record_offer(
        &self,
        id: NegotiationId,
        offered_amount: u64,
        counter_round: u32,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Mark a negotiation agreed or rejected.
    ///
    /// Concluding an already-concluded record with the same status is a no-op.
    fn conclude_negotiation(
        &self,
        id: NegotiationId,
        status: NegotiationStatus,
        agreed_amount: Option<u64>,
        ended_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<NegotiationRecord, StoreError>> + Send;

    /// Append one chat message.
    fn append_message(
        &self,
        message: ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Messages of a negotiation, in append order.
    fn list_messages(
        &self,
        negotiation_id: NegotiationId,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, StoreError>> + Send;

    // ---- hires ----

    /// The hire settled for a negotiation, if any.
    fn hire_event_for(
        &self,
        negotiation_id: NegotiationId,
    ) -> impl std::future::Future<Output = Result<Option<HireEvent>, StoreError>> + Send;

    /// Atomically move `event.credits_amount` from employer to worker and
    /// record the hire.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] if the negotiation already has a hire
    /// - [`StoreError::InsufficientFunds`] if the employer cannot pay
    ///
    /// Nothing changes when an error is returned.
    fn record_hire(
        &self,
        event: HireEvent,
    ) -> impl std::future::Future<Output = Result<HireReceipt, StoreError>> + Send;

    /// All hires, oldest first.
    fn list_hire_events(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<HireEvent>, StoreError>> + Send;

    // ---- tasks ----

    /// Add a task.
    fn insert_task(&self, task: Task)
    -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Oldest open task posted by `employer`.
    fn first_open_task(
        &self,
        employer: AgentId,
    ) -> impl std::future::Future<Output = Result<Option<Task>, StoreError>> + Send;

    /// Mark an open task in progress for `worker` under `hire`.
    fn assign_task(
        &self,
        task_id: TaskId,
        worker: AgentId,
        hire: HireEventId,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// Complete every in-progress task assigned to `worker`.
    fn complete_worker_tasks(
        &self,
        worker: AgentId,
        completed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// All tasks.
    fn list_tasks(&self)
    -> impl std::future::Future<Output = Result<Vec<Task>, StoreError>> + Send;

    // ---- jackpot ----

    /// Atomically credit the winner and record the award.
    fn award_jackpot(
        &self,
        event: JackpotEvent,
    ) -> impl std::future::Future<Output = Result<Agent, StoreError>> + Send;

    /// All jackpot awards, oldest first.
    fn list_jackpot_events(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<JackpotEvent>, StoreError>> + Send;

    // ---- aggregates ----

    /// Marketplace totals.
    fn stats(&self) -> impl std::future::Future<Output = Result<MarketStats, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn filter_matches_role_and_status() {
        let mut agent = Agent::new(Uuid::new_v4(), "Qubit", AgentRole::Employer, 2_000, Utc::now());
        assert!(AgentFilter::all().matches(&agent));
        assert!(AgentFilter::active(AgentRole::Employer).matches(&agent));
        assert!(!AgentFilter::active(AgentRole::Worker).matches(&agent));

        agent.status = AgentStatus::Negotiating;
        assert!(!AgentFilter::active(AgentRole::Employer).matches(&agent));
        assert!(AgentFilter::with_status(AgentStatus::Negotiating).matches(&agent));
    }
}
