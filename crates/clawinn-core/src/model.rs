//! Marketplace data model.
//!
//! Agents, negotiations, chat messages, hire events, tasks and jackpot
//! events. Credits are whole numbers and balances are unsigned, so a balance
//! can never go below zero; every debit goes through a checked subtraction in
//! the store.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an agent.
pub type AgentId = Uuid;

/// Unique identifier for a negotiation.
pub type NegotiationId = Uuid;

/// Unique identifier for a hire event.
pub type HireEventId = Uuid;

/// Unique identifier for a task.
pub type TaskId = Uuid;

/// The market role of an agent. Exactly one at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Sells labor.
    Worker,
    /// Buys labor.
    Employer,
}

impl AgentRole {
    /// The other role.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Worker => Self::Employer,
            Self::Employer => Self::Worker,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker => write!(f, "worker"),
            Self::Employer => write!(f, "employer"),
        }
    }
}

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Idle and eligible for new work.
    Active,
    /// Party to an in-flight negotiation.
    Negotiating,
    /// Hired and busy until `cooldown_ends_at`.
    Cooldown,
    /// Not participating.
    Inactive,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Negotiating => write!(f, "negotiating"),
            Self::Cooldown => write!(f, "cooldown"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// A simulated market participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Current role.
    pub role: AgentRole,
    /// Current availability.
    pub status: AgentStatus,
    /// Credit balance.
    pub credits_balance: u64,
    /// Skills held by the agent.
    pub skills: BTreeSet<String>,
    /// Primary line of work.
    pub specialization: String,
    /// End of the current cooldown. Present iff `status` is `Cooldown`.
    pub cooldown_ends_at: Option<DateTime<Utc>>,
    /// When the agent joined the market.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Creates an active agent with no skills.
    #[must_use]
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        role: AgentRole,
        credits_balance: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            status: AgentStatus::Active,
            credits_balance,
            skills: BTreeSet::new(),
            specialization: String::new(),
            cooldown_ends_at: None,
            created_at,
        }
    }

    /// Sets the skills.
    #[must_use]
    pub fn with_skills<I, T>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the specialization.
    #[must_use]
    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = specialization.into();
        self
    }

    /// Returns true if the agent can be picked for a new negotiation.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// Returns true if the status/cooldown pairing is consistent.
    #[must_use]
    pub fn cooldown_consistent(&self) -> bool {
        (self.status == AgentStatus::Cooldown) == self.cooldown_ends_at.is_some()
    }
}

/// Persisted status of a negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    /// Still exchanging messages.
    Active,
    /// Concluded with a deal.
    Agreed,
    /// Concluded without a deal.
    Rejected,
}

/// Persisted negotiation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationRecord {
    /// Unique identifier.
    pub id: NegotiationId,
    /// The hiring side.
    pub employer_agent_id: AgentId,
    /// The working side.
    pub worker_agent_id: AgentId,
    /// Status.
    pub status: NegotiationStatus,
    /// Worker's asking price, fixed at creation.
    pub worker_price: u64,
    /// Latest offer on the table.
    pub offered_amount: Option<u64>,
    /// Number of employer counter-offers so far.
    pub counter_round: u32,
    /// Final price when agreed.
    pub agreed_amount: Option<u64>,
    /// When the negotiation was opened.
    pub started_at: DateTime<Utc>,
    /// When it concluded.
    pub ended_at: Option<DateTime<Utc>>,
}

impl NegotiationRecord {
    /// Creates an active record.
    #[must_use]
    pub const fn new(
        id: NegotiationId,
        employer_agent_id: AgentId,
        worker_agent_id: AgentId,
        worker_price: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            employer_agent_id,
            worker_agent_id,
            status: NegotiationStatus::Active,
            worker_price,
            offered_amount: None,
            counter_round: 0,
            agreed_amount: None,
            started_at,
            ended_at: None,
        }
    }
}

/// One chat line in a negotiation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier.
    pub id: Uuid,
    /// Negotiation this message belongs to.
    pub negotiation_id: NegotiationId,
    /// Author.
    pub sender_agent_id: AgentId,
    /// Text.
    pub content: String,
    /// When it was sent.
    pub timestamp: DateTime<Utc>,
    /// Position within the negotiation, starting at 0.
    pub sequence: u32,
}

/// A settled hire. At most one per negotiation; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HireEvent {
    /// Unique identifier.
    pub id: HireEventId,
    /// Negotiation that produced the hire (idempotency key).
    pub negotiation_id: NegotiationId,
    /// Payer.
    pub employer_agent_id: AgentId,
    /// Payee.
    pub worker_agent_id: AgentId,
    /// Credits transferred, always > 0.
    pub credits_amount: u64,
    /// When the transfer happened.
    pub timestamp: DateTime<Utc>,
}

/// Balances after a settled hire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HireReceipt {
    /// Employer balance after the debit.
    pub employer_balance: u64,
    /// Worker balance after the credit.
    pub worker_balance: u64,
}

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a worker.
    Open,
    /// Assigned by a hire.
    InProgress,
    /// Worker finished its cooldown.
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Work posted by an employer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Owner.
    pub employer_agent_id: AgentId,
    /// Short title.
    pub title: String,
    /// Status.
    pub status: TaskStatus,
    /// Worker doing it.
    pub assigned_worker_id: Option<AgentId>,
    /// Hire that assigned it.
    pub hire_event_id: Option<HireEventId>,
    /// When it was posted.
    pub created_at: DateTime<Utc>,
    /// When it was completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates an open task.
    #[must_use]
    pub fn open(
        id: TaskId,
        employer_agent_id: AgentId,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            employer_agent_id,
            title: title.into(),
            status: TaskStatus::Open,
            assigned_worker_id: None,
            hire_event_id: None,
            created_at,
            completed_at: None,
        }
    }
}

/// A lottery award. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JackpotEvent {
    /// Unique identifier.
    pub id: Uuid,
    /// Winner.
    pub agent_id: AgentId,
    /// Credits minted for the winner.
    pub credits_awarded: u64,
    /// When it was awarded.
    pub timestamp: DateTime<Utc>,
}

/// Aggregate marketplace numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    /// Number of agents.
    pub total_agents: u64,
    /// Sum of all balances.
    pub total_credits_in_circulation: u64,
    /// Hires whose worker is still in cooldown.
    pub active_hire_events: u64,
    /// Negotiations still exchanging messages.
    pub active_negotiations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(role: AgentRole) -> Agent {
        Agent::new(Uuid::new_v4(), "ByteStorm", role, 500, Utc::now())
    }

    #[test]
    fn new_agent_is_active_without_cooldown() {
        let a = agent(AgentRole::Worker);
        assert!(a.is_available());
        assert!(a.cooldown_consistent());
    }

    #[test]
    fn skills_are_a_set() {
        let a = agent(AgentRole::Worker).with_skills(["Rust Development", "Rust Development"]);
        assert_eq!(a.skills.len(), 1);
    }

    #[test]
    fn cooldown_consistency_detects_stray_end_time() {
        let mut a = agent(AgentRole::Worker);
        a.cooldown_ends_at = Some(Utc::now());
        assert!(!a.cooldown_consistent());
        a.status = AgentStatus::Cooldown;
        assert!(a.cooldown_consistent());
    }

    #[test]
    fn role_flip() {
        assert_eq!(AgentRole::Worker.flipped(), AgentRole::Employer);
        assert_eq!(AgentRole::Employer.flipped(), AgentRole::Worker);
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&AgentStatus::Negotiating).unwrap(),
            "\"negotiating\""
        );
    }

    #[test]
    fn stats_serialize_camel_case() {
        let stats = MarketStats {
            total_agents: 3,
            total_credits_in_circulation: 4500,
            active_hire_events: 1,
            active_negotiations: 0,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["totalCreditsInCirculation"], 4500);
        assert_eq!(json["activeHireEvents"], 1);
    }
}
