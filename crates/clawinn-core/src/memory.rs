//! In-memory [`MarketStore`].
//!
//! All state sits behind one lock, so every operation is atomic with respect
//! to every other. Agents keep insertion order, which keeps seeded runs
//! reproducible. State can be saved to and restored from a JSON snapshot.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::model::{
    Agent, AgentId, AgentRole, AgentStatus, ChatMessage, HireEvent, HireEventId, HireReceipt,
    JackpotEvent, MarketStats, NegotiationId, NegotiationRecord, NegotiationStatus, Task, TaskId,
    TaskStatus,
};
use crate::store::{AgentFilter, MarketStore};

/// Serializable copy of the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Agents in insertion order.
    pub agents: Vec<Agent>,
    /// Negotiation records.
    pub negotiations: Vec<NegotiationRecord>,
    /// Chat messages, grouped by negotiation in append order.
    pub messages: Vec<ChatMessage>,
    /// Settled hires, oldest first.
    pub hire_events: Vec<HireEvent>,
    /// Tasks in insertion order.
    pub tasks: Vec<Task>,
    /// Jackpot awards, oldest first.
    pub jackpot_events: Vec<JackpotEvent>,
}

#[derive(Debug, Default)]
struct State {
    agents: Vec<Agent>,
    agent_index: HashMap<AgentId, usize>,
    negotiations: BTreeMap<NegotiationId, NegotiationRecord>,
    messages: HashMap<NegotiationId, Vec<ChatMessage>>,
    hire_events: Vec<HireEvent>,
    hire_by_negotiation: HashMap<NegotiationId, usize>,
    tasks: Vec<Task>,
    jackpot_events: Vec<JackpotEvent>,
}

impl State {
    fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        let mut state = Self::default();
        for agent in snapshot.agents {
            state.insert_agent(agent)?;
        }
        for record in snapshot.negotiations {
            state.negotiations.insert(record.id, record);
        }
        for message in snapshot.messages {
            state
                .messages
                .entry(message.negotiation_id)
                .or_default()
                .push(message);
        }
        for event in snapshot.hire_events {
            if state.hire_by_negotiation.contains_key(&event.negotiation_id) {
                return Err(StoreError::Snapshot(format!(
                    "duplicate hire for negotiation {}",
                    event.negotiation_id
                )));
            }
            state
                .hire_by_negotiation
                .insert(event.negotiation_id, state.hire_events.len());
            state.hire_events.push(event);
        }
        state.tasks = snapshot.tasks;
        state.jackpot_events = snapshot.jackpot_events;
        Ok(state)
    }

    fn to_snapshot(&self) -> StoreSnapshot {
        let mut messages: Vec<ChatMessage> = Vec::new();
        for record in self.negotiations.values() {
            if let Some(list) = self.messages.get(&record.id) {
                messages.extend(list.iter().cloned());
            }
        }
        StoreSnapshot {
            agents: self.agents.clone(),
            negotiations: self.negotiations.values().cloned().collect(),
            messages,
            hire_events: self.hire_events.clone(),
            tasks: self.tasks.clone(),
            jackpot_events: self.jackpot_events.clone(),
        }
    }

    fn insert_agent(&mut self, agent: Agent) -> Result<(), StoreError> {
        if self.agent_index.contains_key(&agent.id) {
            return Err(StoreError::Conflict(format!("agent {} already exists", agent.id)));
        }
        self.agent_index.insert(agent.id, self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    fn agent(&self, id: AgentId) -> Result<&Agent, StoreError> {
        self.agent_index
            .get(&id)
            .and_then(|&i| self.agents.get(i))
            .ok_or_else(|| StoreError::agent_not_found(id))
    }

    fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent, StoreError> {
        self.agent_index
            .get(&id)
            .and_then(|&i| self.agents.get_mut(i))
            .ok_or_else(|| StoreError::agent_not_found(id))
    }

    fn negotiation_mut(&mut self, id: NegotiationId) -> Result<&mut NegotiationRecord, StoreError> {
        self.negotiations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "negotiation",
                id: id.to_string(),
            })
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, StoreError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "task",
                id: id.to_string(),
            })
    }

    fn transfer(&mut self, event: &HireEvent) -> Result<HireReceipt, StoreError> {
        if self.hire_by_negotiation.contains_key(&event.negotiation_id) {
            return Err(StoreError::Conflict(format!(
                "negotiation {} already settled",
                event.negotiation_id
            )));
        }
        if event.employer_agent_id == event.worker_agent_id {
            return Err(StoreError::InvalidTransition(
                "employer and worker must differ".to_string(),
            ));
        }

        let employer = self.agent(event.employer_agent_id)?;
        let worker = self.agent(event.worker_agent_id)?;
        let employer_balance = employer.credits_balance.checked_sub(event.credits_amount).ok_or(
            StoreError::InsufficientFunds {
                required: event.credits_amount,
                available: employer.credits_balance,
            },
        )?;
        let worker_balance = worker
            .credits_balance
            .checked_add(event.credits_amount)
            .ok_or_else(|| StoreError::InvalidTransition("worker balance overflow".to_string()))?;

        self.agent_mut(event.employer_agent_id)?.credits_balance = employer_balance;
        self.agent_mut(event.worker_agent_id)?.credits_balance = worker_balance;
        self.hire_by_negotiation
            .insert(event.negotiation_id, self.hire_events.len());
        self.hire_events.push(event.clone());

        Ok(HireReceipt {
            employer_balance,
            worker_balance,
        })
    }

    fn stats(&self) -> MarketStats {
        let total_credits = self.agents.iter().map(|a| a.credits_balance).sum();
        let active_hires = self
            .hire_events
            .iter()
            .filter(|h| {
                self.agent(h.worker_agent_id)
                    .is_ok_and(|w| w.status == AgentStatus::Cooldown)
            })
            .count();
        let active_negotiations = self
            .negotiations
            .values()
            .filter(|n| n.status == NegotiationStatus::Active)
            .count();
        MarketStats {
            total_agents: self.agents.len() as u64,
            total_credits_in_circulation: total_credits,
            active_hire_events: active_hires as u64,
            active_negotiations: active_negotiations as u64,
        }
    }
}

/// In-memory marketplace store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        Ok(Self {
            state: Arc::new(Mutex::new(State::from_snapshot(snapshot)?)),
            offline: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Copies the current state.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().to_snapshot()
    }

    /// Writes the current state to `path` as JSON.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "saved store snapshot");
        Ok(())
    }

    /// Reads a store from a JSON snapshot at `path`.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))?;
        let snapshot: StoreSnapshot =
            serde_json::from_str(&content).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    /// When set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        let mut state = self.state.lock();
        f(&mut state)
    }
}

impl MarketStore for MemoryStore {
    async fn get_agent(&self, id: AgentId) -> Result<Agent, StoreError> {
        self.with_state(|s| s.agent(id).cloned())
    }

    async fn find_agents(&self, filter: AgentFilter) -> Result<Vec<Agent>, StoreError> {
        self.with_state(|s| Ok(s.agents.iter().filter(|a| filter.matches(a)).cloned().collect()))
    }

    async fn insert_agent(&self, agent: Agent) -> Result<(), StoreError> {
        self.with_state(|s| s.insert_agent(agent))
    }

    async fn set_status(&self, id: AgentId, status: AgentStatus) -> Result<Agent, StoreError> {
        if status == AgentStatus::Cooldown {
            return Err(StoreError::InvalidTransition(
                "cooldown requires an end time".to_string(),
            ));
        }
        self.with_state(|s| {
            let agent = s.agent_mut(id)?;
            agent.status = status;
            agent.cooldown_ends_at = None;
            Ok(agent.clone())
        })
    }

    async fn begin_cooldown(&self, id: AgentId, ends_at: DateTime<Utc>) -> Result<Agent, StoreError> {
        self.with_state(|s| {
            let agent = s.agent_mut(id)?;
            agent.status = AgentStatus::Cooldown;
            agent.cooldown_ends_at = Some(ends_at);
            Ok(agent.clone())
        })
    }

    async fn end_cooldown(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        self.with_state(|s| {
            let agent = s.agent_mut(id)?;
            if agent.status != AgentStatus::Cooldown {
                return Ok(None);
            }
            agent.status = AgentStatus::Active;
            agent.cooldown_ends_at = None;
            Ok(Some(agent.clone()))
        })
    }

    async fn set_role(&self, id: AgentId, role: AgentRole) -> Result<Agent, StoreError> {
        self.with_state(|s| {
            let agent = s.agent_mut(id)?;
            agent.role = role;
            Ok(agent.clone())
        })
    }

    async fn create_negotiation(&self, record: NegotiationRecord) -> Result<(), StoreError> {
        self.with_state(|s| {
            if s.negotiations.contains_key(&record.id) {
                return Err(StoreError::Conflict(format!(
                    "negotiation {} already exists",
                    record.id
                )));
            }
            s.negotiations.insert(record.id, record);
            Ok(())
        })
    }

    async fn get_negotiation(&self, id: NegotiationId) -> Result<NegotiationRecord, StoreError> {
        self.with_state(|s| s.negotiation_mut(id).map(|n| n.clone()))
    }

    async fn list_negotiations(
        &self,
        status: Option<NegotiationStatus>,
    ) -> Result<Vec<NegotiationRecord>, StoreError> {
        self.with_state(|s| {
            Ok(s.negotiations
                .values()
                .filter(|n| status.is_none_or(|st| st == n.status))
                .cloned()
                .collect())
        })
    }

    async fn record_offer(
        &self,
        id: NegotiationId,
        offered_amount: u64,
        counter_round: u32,
    ) -> Result<(), StoreError> {
        self.with_state(|s| {
            let record = s.negotiation_mut(id)?;
            record.offered_amount = Some(offered_amount);
            record.counter_round = counter_round;
            Ok(())
        })
    }

    async fn conclude_negotiation(
        &self,
        id: NegotiationId,
        status: NegotiationStatus,
        agreed_amount: Option<u64>,
        ended_at: DateTime<Utc>,
    ) -> Result<NegotiationRecord, StoreError> {
        if status == NegotiationStatus::Active {
            return Err(StoreError::InvalidTransition(
                "a negotiation cannot conclude as active".to_string(),
            ));
        }
        self.with_state(|s| {
            let record = s.negotiation_mut(id)?;
            match record.status {
                NegotiationStatus::Active => {
                    record.status = status;
                    record.agreed_amount = agreed_amount;
                    record.ended_at = Some(ended_at);
                    Ok(record.clone())
                }
                current if current == status => Ok(record.clone()),
                current => Err(StoreError::InvalidTransition(format!(
                    "negotiation {id} already concluded as {current:?}"
                ))),
            }
        })
    }

    async fn append_message(&self, message: ChatMessage) -> Result<(), StoreError> {
        self.with_state(|s| {
            if !s.negotiations.contains_key(&message.negotiation_id) {
                return Err(StoreError::NotFound {
                    kind: "negotiation",
                    id: message.negotiation_id.to_string(),
                });
            }
            s.messages
                .entry(message.negotiation_id)
                .or_default()
                .push(message);
            Ok(())
        })
    }

    async fn list_messages(&self, negotiation_id: NegotiationId) -> Result<Vec<ChatMessage>, StoreError> {
        self.with_state(|s| Ok(s.messages.get(&negotiation_id).cloned().unwrap_or_default()))
    }

    async fn hire_event_for(&self, negotiation_id: NegotiationId) -> Result<Option<HireEvent>, StoreError> {
        self.with_state(|s| {
            Ok(s.hire_by_negotiation
                .get(&negotiation_id)
                .and_then(|&i| s.hire_events.get(i))
                .cloned())
        })
    }

    async fn record_hire(&self, event: HireEvent) -> Result<HireReceipt, StoreError> {
        if event.credits_amount == 0 {
            return Err(StoreError::InvalidTransition(
                "hire amount must be positive".to_string(),
            ));
        }
        self.with_state(|s| s.transfer(&event))
    }

    async fn list_hire_events(&self) -> Result<Vec<HireEvent>, StoreError> {
        self.with_state(|s| Ok(s.hire_events.clone()))
    }

    async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        self.with_state(|s| {
            if s.tasks.iter().any(|t| t.id == task.id) {
                return Err(StoreError::Conflict(format!("task {} already exists", task.id)));
            }
            s.tasks.push(task);
            Ok(())
        })
    }

    async fn first_open_task(&self, employer: AgentId) -> Result<Option<Task>, StoreError> {
        self.with_state(|s| {
            Ok(s.tasks
                .iter()
                .find(|t| t.employer_agent_id == employer && t.status == TaskStatus::Open)
                .cloned())
        })
    }

    async fn assign_task(
        &self,
        task_id: TaskId,
        worker: AgentId,
        hire: HireEventId,
    ) -> Result<Task, StoreError> {
        self.with_state(|s| {
            let task = s.task_mut(task_id)?;
            if task.status != TaskStatus::Open {
                return Err(StoreError::InvalidTransition(format!(
                    "task {task_id} is {}",
                    task.status
                )));
            }
            task.status = TaskStatus::InProgress;
            task.assigned_worker_id = Some(worker);
            task.hire_event_id = Some(hire);
            Ok(task.clone())
        })
    }

    async fn complete_worker_tasks(
        &self,
        worker: AgentId,
        completed_at: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        self.with_state(|s| {
            let mut completed = Vec::new();
            for task in s.tasks.iter_mut().filter(|t| {
                t.status == TaskStatus::InProgress && t.assigned_worker_id == Some(worker)
            }) {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(completed_at);
                completed.push(task.clone());
            }
            Ok(completed)
        })
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.with_state(|s| Ok(s.tasks.clone()))
    }

    async fn award_jackpot(&self, event: JackpotEvent) -> Result<Agent, StoreError> {
        self.with_state(|s| {
            let agent = s.agent_mut(event.agent_id)?;
            agent.credits_balance = agent
                .credits_balance
                .checked_add(event.credits_awarded)
                .ok_or_else(|| StoreError::InvalidTransition("balance overflow".to_string()))?;
            let agent = agent.clone();
            s.jackpot_events.push(event);
            Ok(agent)
        })
    }

    async fn list_jackpot_events(&self) -> Result<Vec<JackpotEvent>, StoreError> {
        self.with_state(|s| Ok(s.jackpot_events.clone()))
    }

    async fn stats(&self) -> Result<MarketStats, StoreError> {
        self.with_state(|s| Ok(s.stats()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn store_with_pair(employer_balance: u64) -> (MemoryStore, Agent, Agent) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let employer = Agent::new(Uuid::new_v4(), "Atlas", AgentRole::Employer, employer_balance, now);
        let worker = Agent::new(Uuid::new_v4(), "Pixel", AgentRole::Worker, 500, now);
        store.insert_agent(employer.clone()).await.unwrap();
        store.insert_agent(worker.clone()).await.unwrap();
        (store, employer, worker)
    }

    fn hire(negotiation_id: NegotiationId, employer: &Agent, worker: &Agent, amount: u64) -> HireEvent {
        HireEvent {
            id: Uuid::new_v4(),
            negotiation_id,
            employer_agent_id: employer.id,
            worker_agent_id: worker.id,
            credits_amount: amount,
            timestamp: Utc::now(),
        }
    }

    // ========================================================================
    // Agents
    // ========================================================================

    #[tokio::test]
    async fn duplicate_agent_is_conflict() {
        let (store, employer, _) = store_with_pair(2_000).await;
        let result = store.insert_agent(employer).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn find_agents_keeps_insertion_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ids: Vec<AgentId> = (0..5).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            store
                .insert_agent(Agent::new(*id, format!("agent-{i}"), AgentRole::Worker, 500, now))
                .await
                .unwrap();
        }
        let found: Vec<AgentId> = store
            .find_agents(AgentFilter::active(AgentRole::Worker))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(found, ids);
    }

    #[tokio::test]
    async fn set_status_refuses_cooldown() {
        let (store, _, worker) = store_with_pair(2_000).await;
        let result = store.set_status(worker.id, AgentStatus::Cooldown).await;
        assert!(matches!(result, Err(StoreError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn set_status_clears_cooldown_end() {
        let (store, _, worker) = store_with_pair(2_000).await;
        store.begin_cooldown(worker.id, Utc::now()).await.unwrap();
        let agent = store.set_status(worker.id, AgentStatus::Active).await.unwrap();
        assert!(agent.cooldown_consistent());
        assert!(agent.cooldown_ends_at.is_none());
    }

    #[tokio::test]
    async fn end_cooldown_only_once() {
        let (store, _, worker) = store_with_pair(2_000).await;
        store.begin_cooldown(worker.id, Utc::now()).await.unwrap();
        assert!(store.end_cooldown(worker.id).await.unwrap().is_some());
        assert!(store.end_cooldown(worker.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_agent_is_not_found() {
        let store = MemoryStore::new();
        let result = store.get_agent(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::NotFound { kind: "agent", .. })));
    }

    // ========================================================================
    // Hires
    // ========================================================================

    #[tokio::test]
    async fn record_hire_moves_credits() {
        let (store, employer, worker) = store_with_pair(2_000).await;
        let receipt = store
            .record_hire(hire(Uuid::new_v4(), &employer, &worker, 150))
            .await
            .unwrap();
        assert_eq!(receipt.employer_balance, 1_850);
        assert_eq!(receipt.worker_balance, 650);
        assert_eq!(store.stats().await.unwrap().total_credits_in_circulation, 2_500);
    }

    #[tokio::test]
    async fn second_hire_for_negotiation_conflicts() {
        let (store, employer, worker) = store_with_pair(2_000).await;
        let negotiation = Uuid::new_v4();
        store
            .record_hire(hire(negotiation, &employer, &worker, 150))
            .await
            .unwrap();
        let second = store.record_hire(hire(negotiation, &employer, &worker, 150)).await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));
        assert_eq!(store.list_hire_events().await.unwrap().len(), 1);
        assert_eq!(store.get_agent(employer.id).await.unwrap().credits_balance, 1_850);
    }

    #[tokio::test]
    async fn insufficient_funds_changes_nothing() {
        let (store, employer, worker) = store_with_pair(100).await;
        let result = store
            .record_hire(hire(Uuid::new_v4(), &employer, &worker, 150))
            .await;
        assert_eq!(
            result,
            Err(StoreError::InsufficientFunds {
                required: 150,
                available: 100
            })
        );
        assert_eq!(store.get_agent(employer.id).await.unwrap().credits_balance, 100);
        assert_eq!(store.get_agent(worker.id).await.unwrap().credits_balance, 500);
        assert!(store.list_hire_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_amount_hire_is_rejected() {
        let (store, employer, worker) = store_with_pair(2_000).await;
        let result = store.record_hire(hire(Uuid::new_v4(), &employer, &worker, 0)).await;
        assert!(matches!(result, Err(StoreError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn active_hires_count_workers_in_cooldown() {
        let (store, employer, worker) = store_with_pair(2_000).await;
        store
            .record_hire(hire(Uuid::new_v4(), &employer, &worker, 100))
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().active_hire_events, 0);
        store.begin_cooldown(worker.id, Utc::now()).await.unwrap();
        assert_eq!(store.stats().await.unwrap().active_hire_events, 1);
    }

    // ========================================================================
    // Negotiations, tasks, jackpot
    // ========================================================================

    #[tokio::test]
    async fn conclude_is_idempotent_for_same_status() {
        let (store, employer, worker) = store_with_pair(2_000).await;
        let record = NegotiationRecord::new(Uuid::new_v4(), employer.id, worker.id, 120, Utc::now());
        let id = record.id;
        store.create_negotiation(record).await.unwrap();
        assert_eq!(store.stats().await.unwrap().active_negotiations, 1);

        store
            .conclude_negotiation(id, NegotiationStatus::Agreed, Some(110), Utc::now())
            .await
            .unwrap();
        store
            .conclude_negotiation(id, NegotiationStatus::Agreed, Some(110), Utc::now())
            .await
            .unwrap();
        let flipped = store
            .conclude_negotiation(id, NegotiationStatus::Rejected, None, Utc::now())
            .await;
        assert!(matches!(flipped, Err(StoreError::InvalidTransition(_))));
        assert_eq!(store.stats().await.unwrap().active_negotiations, 0);
    }

    #[tokio::test]
    async fn messages_require_a_negotiation() {
        let store = MemoryStore::new();
        let message = ChatMessage {
            id: Uuid::new_v4(),
            negotiation_id: Uuid::new_v4(),
            sender_agent_id: Uuid::new_v4(),
            content: "hello".to_string(),
            timestamp: Utc::now(),
            sequence: 0,
        };
        assert!(store.append_message(message).await.is_err());
    }

    #[tokio::test]
    async fn task_lifecycle() {
        let (store, employer, worker) = store_with_pair(2_000).await;
        let first = Task::open(Uuid::new_v4(), employer.id, "Audit vault", Utc::now());
        let second = Task::open(Uuid::new_v4(), employer.id, "Write docs", Utc::now());
        store.insert_task(first.clone()).await.unwrap();
        store.insert_task(second).await.unwrap();

        let open = store.first_open_task(employer.id).await.unwrap().unwrap();
        assert_eq!(open.id, first.id);

        let hire_id = Uuid::new_v4();
        let assigned = store.assign_task(open.id, worker.id, hire_id).await.unwrap();
        assert_eq!(assigned.status, TaskStatus::InProgress);
        assert!(store.assign_task(open.id, worker.id, hire_id).await.is_err());

        let done = store.complete_worker_tasks(worker.id, Utc::now()).await.unwrap();
        assert_eq!(done.len(), 1);
        assert!(done[0].completed_at.is_some());
        assert!(store.complete_worker_tasks(worker.id, Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn jackpot_credits_and_records() {
        let (store, _, worker) = store_with_pair(2_000).await;
        let agent = store
            .award_jackpot(JackpotEvent {
                id: Uuid::new_v4(),
                agent_id: worker.id,
                credits_awarded: 10_000,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(agent.credits_balance, 10_500);
        assert_eq!(store.list_jackpot_events().await.unwrap().len(), 1);
    }

    // ========================================================================
    // Offline and snapshots
    // ========================================================================

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let (store, employer, _) = store_with_pair(2_000).await;
        store.set_offline(true);
        let err = store.get_agent(employer.id).await.unwrap_err();
        assert!(err.is_transient());
        store.set_offline(false);
        assert!(store.get_agent(employer.id).await.is_ok());
    }

    #[tokio::test]
    async fn snapshot_survives_disk() {
        let (store, employer, worker) = store_with_pair(2_000).await;
        store
            .record_hire(hire(Uuid::new_v4(), &employer, &worker, 300))
            .await
            .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("market.json");
        store.save_snapshot(&path).unwrap();

        let restored = MemoryStore::load_snapshot(&path).unwrap();
        assert_eq!(restored.snapshot(), store.snapshot());
        let again = restored
            .record_hire(store.list_hire_events().await.unwrap()[0].clone())
            .await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
    }
}
