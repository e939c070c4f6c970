//! Broadcast port.
//!
//! Every state change the simulation makes is published as a [`MarketEvent`].
//! Publishing is fire-and-forget: a sink never reports failure back to the
//! simulation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{
    Agent, AgentId, AgentRole, AgentStatus, ChatMessage, HireEvent, HireEventId, JackpotEvent,
    MarketStats, NegotiationId, Task, TaskId, TaskStatus,
};

/// How a negotiation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationOutcome {
    /// A deal was struck.
    Agreed,
    /// No deal.
    Rejected,
}

/// A state change visible to observers.
///
/// Serializes as `{"event": "<channel>", "data": {...}}` with camelCase
/// payload fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
#[allow(missing_docs)]
pub enum MarketEvent {
    /// An agent's status or cooldown changed.
    #[serde(rename = "agent:statusChanged", rename_all = "camelCase")]
    AgentStatusChanged {
        agent_id: AgentId,
        status: AgentStatus,
        role: AgentRole,
        cooldown_ends_at: Option<DateTime<Utc>>,
    },

    /// An agent's balance changed.
    #[serde(rename = "agent:balanceChanged", rename_all = "camelCase")]
    AgentBalanceChanged { agent_id: AgentId, new_balance: u64 },

    /// An agent switched roles.
    #[serde(rename = "agent:roleChanged", rename_all = "camelCase")]
    AgentRoleChanged { agent_id: AgentId, new_role: AgentRole },

    /// A negotiation opened.
    #[serde(rename = "negotiation:started", rename_all = "camelCase")]
    NegotiationStarted {
        id: NegotiationId,
        employer_agent_id: AgentId,
        worker_agent_id: AgentId,
    },

    /// A chat line was appended.
    #[serde(rename = "negotiation:message", rename_all = "camelCase")]
    NegotiationMessage {
        negotiation_id: NegotiationId,
        sender_agent_id: AgentId,
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// A negotiation concluded.
    #[serde(rename = "negotiation:ended", rename_all = "camelCase")]
    NegotiationEnded {
        negotiation_id: NegotiationId,
        outcome: NegotiationOutcome,
    },

    /// A hire was settled.
    #[serde(rename = "hire:completed", rename_all = "camelCase")]
    HireCompleted {
        id: HireEventId,
        employer_agent_id: AgentId,
        worker_agent_id: AgentId,
        credits_amount: u64,
        negotiation_id: NegotiationId,
        timestamp: DateTime<Utc>,
    },

    /// Someone won the jackpot.
    #[serde(rename = "jackpot:awarded", rename_all = "camelCase")]
    JackpotAwarded {
        id: Uuid,
        agent_id: AgentId,
        credits_awarded: u64,
        timestamp: DateTime<Utc>,
    },

    /// Aggregates were recomputed.
    #[serde(rename = "stats:updated")]
    StatsUpdated(MarketStats),

    /// A task moved through its lifecycle.
    #[serde(rename = "task:statusChanged", rename_all = "camelCase")]
    TaskStatusChanged {
        task_id: TaskId,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assigned_worker_id: Option<AgentId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hire_event_id: Option<HireEventId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed_at: Option<DateTime<Utc>>,
    },
}

impl MarketEvent {
    /// Channel name, e.g. `agent:statusChanged`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AgentStatusChanged { .. } => "agent:statusChanged",
            Self::AgentBalanceChanged { .. } => "agent:balanceChanged",
            Self::AgentRoleChanged { .. } => "agent:roleChanged",
            Self::NegotiationStarted { .. } => "negotiation:started",
            Self::NegotiationMessage { .. } => "negotiation:message",
            Self::NegotiationEnded { .. } => "negotiation:ended",
            Self::HireCompleted { .. } => "hire:completed",
            Self::JackpotAwarded { .. } => "jackpot:awarded",
            Self::StatsUpdated(_) => "stats:updated",
            Self::TaskStatusChanged { .. } => "task:statusChanged",
        }
    }

    /// Status snapshot of `agent`.
    #[must_use]
    pub const fn status_changed(agent: &Agent) -> Self {
        Self::AgentStatusChanged {
            agent_id: agent.id,
            status: agent.status,
            role: agent.role,
            cooldown_ends_at: agent.cooldown_ends_at,
        }
    }

    /// Balance snapshot of `agent`.
    #[must_use]
    pub const fn balance_changed(agent: &Agent) -> Self {
        Self::AgentBalanceChanged {
            agent_id: agent.id,
            new_balance: agent.credits_balance,
        }
    }

    /// Role snapshot of `agent`.
    #[must_use]
    pub const fn role_changed(agent: &Agent) -> Self {
        Self::AgentRoleChanged {
            agent_id: agent.id,
            new_role: agent.role,
        }
    }

    /// A chat line.
    #[must_use]
    pub fn message(message: &ChatMessage) -> Self {
        Self::NegotiationMessage {
            negotiation_id: message.negotiation_id,
            sender_agent_id: message.sender_agent_id,
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }

    /// A settled hire.
    #[must_use]
    pub const fn hire_completed(hire: &HireEvent) -> Self {
        Self::HireCompleted {
            id: hire.id,
            employer_agent_id: hire.employer_agent_id,
            worker_agent_id: hire.worker_agent_id,
            credits_amount: hire.credits_amount,
            negotiation_id: hire.negotiation_id,
            timestamp: hire.timestamp,
        }
    }

    /// A jackpot award.
    #[must_use]
    pub const fn jackpot_awarded(event: &JackpotEvent) -> Self {
        Self::JackpotAwarded {
            id: event.id,
            agent_id: event.agent_id,
            credits_awarded: event.credits_awarded,
            timestamp: event.timestamp,
        }
    }

    /// Task snapshot.
    #[must_use]
    pub const fn task_changed(task: &Task) -> Self {
        Self::TaskStatusChanged {
            task_id: task.id,
            status: task.status,
            assigned_worker_id: task.assigned_worker_id,
            hire_event_id: task.hire_event_id,
            completed_at: task.completed_at,
        }
    }
}

/// Destination for [`MarketEvent`]s.
pub trait EventSink: Send + Sync + 'static {
    /// Emit an event. Never fails and never blocks.
    fn publish(&self, event: MarketEvent);
}

impl<T: EventSink> EventSink for Arc<T> {
    fn publish(&self, event: MarketEvent) {
        (**self).publish(event);
    }
}

/// Fan-out over a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events; the simulation is never
/// held up.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<MarketEvent>,
}

impl ChannelBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    /// Send an event.
    ///
    /// Returns the number of subscribers that received it.
    pub fn send(&self, event: MarketEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for ChannelBroadcaster {
    fn publish(&self, event: MarketEvent) {
        self.send(event);
    }
}

/// Records every event in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<MarketEvent>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().clone()
    }

    /// Takes everything recorded so far, leaving the log empty.
    pub fn drain(&self) -> Vec<MarketEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events on channel `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: MarketEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn worker() -> Agent {
        Agent::new(Uuid::new_v4(), "Sable", AgentRole::Worker, 500, Utc::now())
    }

    #[test]
    fn wire_format_uses_channel_and_camel_case() {
        let agent = worker();
        let json = serde_json::to_value(MarketEvent::balance_changed(&agent)).unwrap();
        assert_eq!(json["event"], "agent:balanceChanged");
        assert_eq!(json["data"]["newBalance"], 500);
        assert_eq!(json["data"]["agentId"], json!(agent.id));
    }

    #[test]
    fn stats_payload_is_flat() {
        let event = MarketEvent::StatsUpdated(MarketStats {
            total_agents: 115,
            total_credits_in_circulation: 155_000,
            active_hire_events: 2,
            active_negotiations: 3,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stats:updated");
        assert_eq!(json["data"]["totalAgents"], 115);
        assert_eq!(json["data"]["activeNegotiations"], 3);
    }

    #[test]
    fn task_event_omits_absent_fields() {
        let task = Task::open(Uuid::new_v4(), Uuid::new_v4(), "Index logs", Utc::now());
        let json = serde_json::to_value(MarketEvent::task_changed(&task)).unwrap();
        assert_eq!(json["data"]["status"], "open");
        assert!(json["data"].get("assignedWorkerId").is_none());
        assert!(json["data"].get("completedAt").is_none());
    }

    #[test]
    fn outcome_is_lowercase() {
        let event = MarketEvent::NegotiationEnded {
            negotiation_id: Uuid::new_v4(),
            outcome: NegotiationOutcome::Rejected,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["outcome"], "rejected");
    }

    #[test]
    fn events_parse_back() {
        let agent = worker();
        let event = MarketEvent::status_changed(&agent);
        let text = serde_json::to_string(&event).unwrap();
        let parsed: MarketEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.name(), "agent:statusChanged");
    }

    #[tokio::test]
    async fn broadcaster_fans_out() {
        let broadcaster = ChannelBroadcaster::new(16);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        let agent = worker();

        assert_eq!(broadcaster.send(MarketEvent::role_changed(&agent)), 2);
        assert_eq!(a.recv().await.unwrap().name(), "agent:roleChanged");
        assert_eq!(b.recv().await.unwrap().name(), "agent:roleChanged");
    }

    #[test]
    fn broadcaster_without_subscribers_does_not_fail() {
        let broadcaster = ChannelBroadcaster::default();
        broadcaster.publish(MarketEvent::balance_changed(&worker()));
        assert_eq!(broadcaster.send(MarketEvent::balance_changed(&worker())), 0);
    }

    #[test]
    fn log_counts_by_channel() {
        let log = EventLog::new();
        let agent = worker();
        log.publish(MarketEvent::balance_changed(&agent));
        log.publish(MarketEvent::balance_changed(&agent));
        log.publish(MarketEvent::role_changed(&agent));
        assert_eq!(log.count("agent:balanceChanged"), 2);
        assert_eq!(log.drain().len(), 3);
        assert!(log.is_empty());
    }
}
