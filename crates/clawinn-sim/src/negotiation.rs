//! Negotiation state machine.
//!
//! A negotiation is a scripted exchange between one employer and one worker:
//!
//! ```text
//! Greeting -> InitialOffer -> EmployerThinking
//! EmployerThinking(angry)  -> AngryWorkerResponse -> Concluded(Rejected)
//! EmployerThinking(polite) -> Concluded(Rejected)
//! EmployerThinking(normal) -> Closing | Concluded(Rejected) | WorkerConsiders
//! WorkerConsiders          -> Closing | EmployerThinking(normal) | Concluded(Rejected)
//! Closing                  -> Concluded(Agreed)
//! ```
//!
//! Each [`advance`](NegotiationCoordinator::advance) makes at most one
//! transition, emits exactly one chat message and only fires once the
//! negotiation's next-message deadline has passed. The message is persisted
//! before the phase moves. In-flight negotiations live in the coordinator,
//! each behind its own async mutex so a slow content or store call can never
//! race a second advance of the same negotiation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clawinn_core::{
    Agent, AgentId, AgentRole, AgentStatus, ChatMessage, Clock, ContentProvider, ContentRequest,
    EventSink, HistoryLine, MarketEvent, MarketStore, NegotiationConfig, NegotiationId,
    NegotiationOutcome, NegotiationRecord, NegotiationStatus, PhaseKind, SimRng, StoreError,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chat::{LineContext, fallback_line};
use crate::error::SimError;
use crate::pricing::{
    OfferResponse, calculate_worker_price, evaluate_offer, worker_accepts,
    worker_counter_proposal,
};
use crate::scheduler::TickPhase;
use crate::settlement::{HireSettlement, SettlementOutcome};

/// How the employer is going to react to the opening price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingMode {
    /// Weigh the offer on its merits.
    Normal,
    /// Dismiss the worker rudely.
    ForcedAngry,
    /// Decline politely.
    ForcedPolite,
}

/// Where a negotiation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "detail")]
pub enum NegotiationPhase {
    /// Employer is about to say hello.
    Greeting,
    /// Worker is about to quote a price.
    InitialOffer,
    /// Employer is about to respond to the price on the table.
    EmployerThinking(ThinkingMode),
    /// Worker is about to answer a rude dismissal.
    AngryWorkerResponse,
    /// Worker is about to respond to the employer's counter.
    WorkerConsiders,
    /// One side is about to confirm the deal.
    Closing,
    /// Done. Terminal bookkeeping may still be pending.
    Concluded(NegotiationOutcome),
}

impl NegotiationPhase {
    /// Returns true once the exchange is over.
    #[must_use]
    pub const fn is_concluded(self) -> bool {
        matches!(self, Self::Concluded(_))
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::InitialOffer => "initial_offer",
            Self::EmployerThinking(_) => "employer_thinking",
            Self::AngryWorkerResponse => "angry_worker_response",
            Self::WorkerConsiders => "worker_considers",
            Self::Closing => "closing",
            Self::Concluded(_) => "concluded",
        }
    }
}

/// In-memory state of one in-flight negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveNegotiation {
    /// Identifier, shared with the persisted record.
    pub id: NegotiationId,
    /// The hiring side.
    pub employer_agent_id: AgentId,
    /// The working side.
    pub worker_agent_id: AgentId,
    /// Current phase.
    pub phase: NegotiationPhase,
    /// Worker's asking price, fixed at creation.
    pub worker_price: u64,
    /// Latest offer on the table.
    pub offered_amount: Option<u64>,
    /// Employer counter-offers made so far.
    pub counter_round: u32,
    /// Messages exchanged so far, in order.
    pub messages: Vec<ChatMessage>,
    /// When the negotiation opened.
    pub started_at: DateTime<Utc>,
    /// Earliest time the next message may be sent.
    pub next_message_at: DateTime<Utc>,
}

impl ActiveNegotiation {
    /// A fresh negotiation in the greeting phase.
    #[must_use]
    pub const fn new(
        id: NegotiationId,
        employer_agent_id: AgentId,
        worker_agent_id: AgentId,
        worker_price: u64,
        started_at: DateTime<Utc>,
        next_message_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            employer_agent_id,
            worker_agent_id,
            phase: NegotiationPhase::Greeting,
            worker_price,
            offered_amount: None,
            counter_round: 0,
            messages: Vec::new(),
            started_at,
            next_message_at,
        }
    }

    /// The amount currently on the table.
    #[must_use]
    pub fn current_offer(&self) -> u64 {
        self.offered_amount.unwrap_or(self.worker_price)
    }

    /// Author of the latest message.
    #[must_use]
    pub fn last_sender(&self) -> Option<AgentId> {
        self.messages.last().map(|m| m.sender_agent_id)
    }

    /// Returns true if the next message may be sent at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_message_at
    }

    /// Returns true if `agent` is a party.
    #[must_use]
    pub fn involves(&self, agent: AgentId) -> bool {
        self.employer_agent_id == agent || self.worker_agent_id == agent
    }

    fn history(&self) -> Vec<HistoryLine> {
        self.messages
            .iter()
            .map(|m| HistoryLine {
                sender: m.sender_agent_id,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// Result of one [`advance`](NegotiationCoordinator::advance) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvanceOutcome {
    /// A message was sent; the negotiation continues.
    Pending,
    /// The next-message deadline has not passed yet.
    NotDue,
    /// Another advance of this negotiation is in progress.
    Busy,
    /// The negotiation concluded with a deal.
    Agreed,
    /// The negotiation concluded without a deal.
    Rejected,
    /// No such in-flight negotiation.
    Missing,
}

impl From<NegotiationOutcome> for AdvanceOutcome {
    fn from(outcome: NegotiationOutcome) -> Self {
        match outcome {
            NegotiationOutcome::Agreed => Self::Agreed,
            NegotiationOutcome::Rejected => Self::Rejected,
        }
    }
}

/// Tally of one [`advance_due`](NegotiationCoordinator::advance_due) pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Sent a message and continue.
    pub advanced: usize,
    /// Concluded with a deal.
    pub agreed: usize,
    /// Concluded without a deal.
    pub rejected: usize,
    /// Not due yet or already being advanced.
    pub waiting: usize,
    /// Failed; retried next tick.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Employer,
    Worker,
}

/// One planned transition.
#[derive(Debug, Clone, Copy)]
struct Step {
    kind: PhaseKind,
    sender: Party,
    amount: u64,
    next: NegotiationPhase,
    /// New offer and counter round to record, if the offer changes.
    offer: Option<(u64, u32)>,
}

#[derive(Clone)]
struct Slot {
    employer: AgentId,
    worker: AgentId,
    state: Arc<tokio::sync::Mutex<ActiveNegotiation>>,
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Owns every in-flight negotiation and drives them through their phases.
pub struct NegotiationCoordinator<S, C, B> {
    store: Arc<S>,
    content: Arc<C>,
    events: Arc<B>,
    settlement: Arc<HireSettlement<S, B>>,
    clock: Arc<dyn Clock>,
    rng: SimRng,
    config: NegotiationConfig,
    active: Mutex<BTreeMap<NegotiationId, Slot>>,
}

impl<S, C, B> NegotiationCoordinator<S, C, B>
where
    S: MarketStore,
    C: ContentProvider,
    B: EventSink,
{
    /// Creates a coordinator with no negotiations in flight.
    pub fn new(
        store: Arc<S>,
        content: Arc<C>,
        events: Arc<B>,
        settlement: Arc<HireSettlement<S, B>>,
        clock: Arc<dyn Clock>,
        rng: SimRng,
        config: NegotiationConfig,
    ) -> Self {
        Self {
            store,
            content,
            events,
            settlement,
            clock,
            rng,
            config,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of in-flight negotiations.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Ids of in-flight negotiations.
    pub fn active_ids(&self) -> Vec<NegotiationId> {
        self.active.lock().keys().copied().collect()
    }

    /// Returns true if `agent` is party to an in-flight negotiation.
    pub fn is_engaged(&self, agent: AgentId) -> bool {
        self.active
            .lock()
            .values()
            .any(|slot| slot.employer == agent || slot.worker == agent)
    }

    /// Copy of one in-flight negotiation.
    pub async fn snapshot(&self, id: NegotiationId) -> Option<ActiveNegotiation> {
        let state = self.slot(id)?.state;
        let guard = state.lock().await;
        Some(guard.clone())
    }

    /// Copies of every in-flight negotiation.
    pub async fn active_negotiations(&self) -> Vec<ActiveNegotiation> {
        let slots: Vec<Slot> = self.active.lock().values().cloned().collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.state.lock().await.clone());
        }
        out
    }

    /// The in-flight negotiation `agent` is party to, if any.
    pub async fn active_negotiation_for(&self, agent: AgentId) -> Option<ActiveNegotiation> {
        let id = self
            .active
            .lock()
            .iter()
            .find(|(_, slot)| slot.employer == agent || slot.worker == agent)
            .map(|(id, _)| *id)?;
        self.snapshot(id).await
    }

    fn slot(&self, id: NegotiationId) -> Option<Slot> {
        self.active.lock().get(&id).cloned()
    }

    /// Adopt an in-flight negotiation built elsewhere.
    ///
    /// The caller is responsible for the persisted record and for both
    /// agents being in `Negotiating`.
    pub fn track(&self, negotiation: ActiveNegotiation) {
        let slot = Slot {
            employer: negotiation.employer_agent_id,
            worker: negotiation.worker_agent_id,
            state: Arc::new(tokio::sync::Mutex::new(negotiation.clone())),
        };
        self.active.lock().insert(negotiation.id, slot);
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Open a negotiation between `employer_id` and `worker_id`.
    ///
    /// Both agents are re-read and must still be active in the right roles;
    /// otherwise nothing happens and `None` is returned.
    pub async fn initiate(
        &self,
        employer_id: AgentId,
        worker_id: AgentId,
    ) -> Result<Option<NegotiationId>, SimError> {
        if employer_id == worker_id {
            return Ok(None);
        }
        let (Some(employer), Some(worker)) =
            (self.fetch(employer_id).await?, self.fetch(worker_id).await?)
        else {
            debug!(employer_id = %employer_id, worker_id = %worker_id, "pair vanished before initiation");
            return Ok(None);
        };
        if !employer.is_available()
            || !worker.is_available()
            || employer.role != AgentRole::Employer
            || worker.role != AgentRole::Worker
            || self.is_engaged(employer_id)
            || self.is_engaged(worker_id)
        {
            debug!(employer_id = %employer_id, worker_id = %worker_id, "pair no longer available");
            return Ok(None);
        }

        let employer = self
            .store
            .set_status(employer_id, AgentStatus::Negotiating)
            .await?;
        let worker = match self.store.set_status(worker_id, AgentStatus::Negotiating).await {
            Ok(worker) => worker,
            Err(e) => {
                self.restore_quietly(employer_id).await;
                return Err(e.into());
            }
        };

        let now = self.clock.now();
        let worker_price = self.rng.with(|rng| calculate_worker_price(&worker, rng));
        let id = self.rng.uuid();
        let record = NegotiationRecord::new(id, employer_id, worker_id, worker_price, now);
        if let Err(e) = self.store.create_negotiation(record).await {
            self.restore_quietly(employer_id).await;
            self.restore_quietly(worker_id).await;
            return Err(e.into());
        }

        let delay = self.rng.between(
            self.config.greeting_delay_min_ms,
            self.config.greeting_delay_max_ms,
        );
        self.track(ActiveNegotiation::new(
            id,
            employer_id,
            worker_id,
            worker_price,
            now,
            now + millis(delay),
        ));

        self.events.publish(MarketEvent::NegotiationStarted {
            id,
            employer_agent_id: employer_id,
            worker_agent_id: worker_id,
        });
        self.events.publish(MarketEvent::status_changed(&employer));
        self.events.publish(MarketEvent::status_changed(&worker));

        info!(
            negotiation_id = %id,
            employer = %employer.name,
            worker = %worker.name,
            worker_price,
            "negotiation started"
        );
        Ok(Some(id))
    }

    async fn fetch(&self, id: AgentId) -> Result<Option<Agent>, SimError> {
        match self.store.get_agent(id).await {
            Ok(agent) => Ok(Some(agent)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn restore_quietly(&self, id: AgentId) {
        if let Err(e) = self.store.set_status(id, AgentStatus::Active).await {
            warn!(agent_id = %id, error = %e, "failed to restore agent after aborted initiation");
        }
    }

    // ========================================================================
    // Advancement
    // ========================================================================

    /// Advance every in-flight negotiation that is due.
    ///
    /// A failure in one negotiation is logged and does not affect the others.
    pub async fn advance_due(&self) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        for id in self.active_ids() {
            match self.advance(id).await {
                Ok(AdvanceOutcome::Pending) => report.advanced += 1,
                Ok(AdvanceOutcome::Agreed) => report.agreed += 1,
                Ok(AdvanceOutcome::Rejected) => report.rejected += 1,
                Ok(AdvanceOutcome::NotDue | AdvanceOutcome::Busy | AdvanceOutcome::Missing) => {
                    report.waiting += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(negotiation_id = %id, error = %e, "negotiation advance failed");
                }
            }
        }
        report
    }

    /// Make at most one transition of negotiation `id`.
    ///
    /// A negotiation whose terminal bookkeeping failed earlier stays in the
    /// active set in its concluded phase; advancing it retries the
    /// bookkeeping.
    pub async fn advance(&self, id: NegotiationId) -> Result<AdvanceOutcome, SimError> {
        let Some(slot) = self.slot(id) else {
            return Ok(AdvanceOutcome::Missing);
        };
        let Ok(mut negotiation) = slot.state.try_lock_owned() else {
            debug!(negotiation_id = %id, "negotiation busy, skipping");
            return Ok(AdvanceOutcome::Busy);
        };

        if let NegotiationPhase::Concluded(outcome) = negotiation.phase {
            self.finish(&negotiation, outcome).await?;
            return Ok(outcome.into());
        }

        let now = self.clock.now();
        if !negotiation.is_due(now) {
            return Ok(AdvanceOutcome::NotDue);
        }

        let (Some(employer), Some(worker)) = (
            self.fetch(negotiation.employer_agent_id).await?,
            self.fetch(negotiation.worker_agent_id).await?,
        ) else {
            warn!(negotiation_id = %id, "participant missing, rejecting negotiation");
            negotiation.phase = NegotiationPhase::Concluded(NegotiationOutcome::Rejected);
            self.finish(&negotiation, NegotiationOutcome::Rejected).await?;
            return Ok(AdvanceOutcome::Rejected);
        };

        let step = self.plan(&negotiation, &employer);
        self.apply(&mut negotiation, &employer, &worker, step, now)
            .await?;

        if let NegotiationPhase::Concluded(outcome) = negotiation.phase {
            self.finish(&negotiation, outcome).await?;
            return Ok(outcome.into());
        }
        Ok(AdvanceOutcome::Pending)
    }

    /// Decide the next transition. All randomness is drawn here.
    fn plan(&self, n: &ActiveNegotiation, employer: &Agent) -> Step {
        let cfg = &self.config;
        match n.phase {
            NegotiationPhase::Greeting => Step {
                kind: PhaseKind::Greeting,
                sender: Party::Employer,
                amount: n.worker_price,
                next: NegotiationPhase::InitialOffer,
                offer: None,
            },
            NegotiationPhase::InitialOffer => {
                let roll = self.rng.unit();
                let mode = if roll < cfg.angry_rejection_probability {
                    ThinkingMode::ForcedAngry
                } else if roll < cfg.angry_rejection_probability + cfg.polite_rejection_probability
                {
                    ThinkingMode::ForcedPolite
                } else {
                    ThinkingMode::Normal
                };
                Step {
                    kind: PhaseKind::WorkerOffer,
                    sender: Party::Worker,
                    amount: n.worker_price,
                    next: NegotiationPhase::EmployerThinking(mode),
                    offer: None,
                }
            }
            NegotiationPhase::EmployerThinking(ThinkingMode::ForcedAngry) => Step {
                kind: PhaseKind::AngryRejection,
                sender: Party::Employer,
                amount: n.worker_price,
                next: NegotiationPhase::AngryWorkerResponse,
                offer: None,
            },
            NegotiationPhase::EmployerThinking(ThinkingMode::ForcedPolite) => Step {
                kind: PhaseKind::PoliteRejection,
                sender: Party::Employer,
                amount: n.worker_price,
                next: NegotiationPhase::Concluded(NegotiationOutcome::Rejected),
                offer: None,
            },
            NegotiationPhase::EmployerThinking(ThinkingMode::Normal) => {
                let ask = n.current_offer();
                let response = self
                    .rng
                    .with(|rng| evaluate_offer(employer.credits_balance, ask, rng));
                match response {
                    OfferResponse::Accept => Step {
                        kind: PhaseKind::EmployerAccept,
                        sender: Party::Employer,
                        amount: ask,
                        next: NegotiationPhase::Closing,
                        offer: None,
                    },
                    OfferResponse::Reject => Step {
                        kind: PhaseKind::EmployerReject,
                        sender: Party::Employer,
                        amount: ask,
                        next: NegotiationPhase::Concluded(NegotiationOutcome::Rejected),
                        offer: None,
                    },
                    OfferResponse::Counteroffer(counter) => Step {
                        kind: PhaseKind::EmployerCounter,
                        sender: Party::Employer,
                        amount: counter,
                        next: NegotiationPhase::WorkerConsiders,
                        offer: Some((counter, n.counter_round.saturating_add(1))),
                    },
                }
            }
            NegotiationPhase::AngryWorkerResponse => Step {
                kind: PhaseKind::AngryWorkerResponse,
                sender: Party::Worker,
                amount: n.worker_price,
                next: NegotiationPhase::Concluded(NegotiationOutcome::Rejected),
                offer: None,
            },
            NegotiationPhase::WorkerConsiders => {
                let offered = n.current_offer();
                if worker_accepts(offered, n.worker_price, n.counter_round, cfg) {
                    Step {
                        kind: PhaseKind::WorkerAcceptCounter,
                        sender: Party::Worker,
                        amount: offered,
                        next: NegotiationPhase::Closing,
                        offer: None,
                    }
                } else if n.counter_round < cfg.max_counter_rounds {
                    let counter = self
                        .rng
                        .with(|rng| worker_counter_proposal(offered, n.worker_price, cfg, rng));
                    Step {
                        kind: PhaseKind::WorkerCounter,
                        sender: Party::Worker,
                        amount: counter,
                        next: NegotiationPhase::EmployerThinking(ThinkingMode::Normal),
                        offer: Some((counter, n.counter_round)),
                    }
                } else {
                    Step {
                        kind: PhaseKind::WorkerRejectCounter,
                        sender: Party::Worker,
                        amount: offered,
                        next: NegotiationPhase::Concluded(NegotiationOutcome::Rejected),
                        offer: None,
                    }
                }
            }
            NegotiationPhase::Closing => {
                let sender = if n.last_sender() == Some(n.employer_agent_id) {
                    Party::Worker
                } else {
                    Party::Employer
                };
                Step {
                    kind: PhaseKind::Closing,
                    sender,
                    amount: n.current_offer(),
                    next: NegotiationPhase::Concluded(NegotiationOutcome::Agreed),
                    offer: None,
                }
            }
            NegotiationPhase::Concluded(outcome) => Step {
                kind: PhaseKind::Closing,
                sender: Party::Employer,
                amount: n.current_offer(),
                next: NegotiationPhase::Concluded(outcome),
                offer: None,
            },
        }
    }

    /// Write the step's message, then move the phase.
    async fn apply(
        &self,
        n: &mut ActiveNegotiation,
        employer: &Agent,
        worker: &Agent,
        step: Step,
        now: DateTime<Utc>,
    ) -> Result<(), SimError> {
        let (speaker, counterpart) = match step.sender {
            Party::Employer => (employer, worker),
            Party::Worker => (worker, employer),
        };
        let specialization = if worker.specialization.is_empty() {
            "general"
        } else {
            worker.specialization.as_str()
        };
        let ctx = LineContext {
            worker: &worker.name,
            employer: &employer.name,
            specialization,
            amount: step.amount,
            price: n.worker_price,
        };
        let fallback = self.rng.with(|rng| fallback_line(step.kind, &ctx, rng));

        let content = self
            .content
            .generate(ContentRequest {
                kind: step.kind,
                speaker_id: speaker.id,
                speaker: speaker.name.clone(),
                speaker_role: speaker.role,
                counterpart: counterpart.name.clone(),
                amount: step.amount,
                asking_price: n.worker_price,
                specialization: specialization.to_string(),
                history: n.history(),
                fallback,
            })
            .await;

        if let Some((offered, round)) = step.offer {
            self.store.record_offer(n.id, offered, round).await?;
        }

        let message = ChatMessage {
            id: self.rng.uuid(),
            negotiation_id: n.id,
            sender_agent_id: speaker.id,
            content,
            timestamp: now,
            sequence: u32::try_from(n.messages.len()).unwrap_or(u32::MAX),
        };
        self.store.append_message(message.clone()).await?;
        self.events.publish(MarketEvent::message(&message));

        debug!(
            negotiation_id = %n.id,
            from = n.phase.name(),
            to = step.next.name(),
            sender = %speaker.name,
            "negotiation advanced"
        );

        n.messages.push(message);
        if let Some((offered, round)) = step.offer {
            n.offered_amount = Some(offered);
            n.counter_round = round;
        }
        n.phase = step.next;
        let gap = self
            .rng
            .between(self.config.message_gap_min_ms, self.config.message_gap_max_ms);
        n.next_message_at = now + millis(gap);
        Ok(())
    }

    // ========================================================================
    // Conclusion
    // ========================================================================

    /// Persist the outcome, settle or release the agents, and drop the
    /// negotiation from the active set. Safe to repeat.
    async fn finish(
        &self,
        n: &ActiveNegotiation,
        outcome: NegotiationOutcome,
    ) -> Result<(), SimError> {
        let now = self.clock.now();
        match outcome {
            NegotiationOutcome::Agreed => {
                let agreed = n.current_offer();
                self.conclude_record(n.id, NegotiationStatus::Agreed, Some(agreed), now)
                    .await?;
                let settlement = self
                    .settlement
                    .settle(n.id, n.employer_agent_id, n.worker_agent_id, agreed)
                    .await?;
                match settlement {
                    SettlementOutcome::Settled { .. } | SettlementOutcome::AlreadySettled => {
                        info!(negotiation_id = %n.id, credits = agreed, "negotiation agreed");
                    }
                    SettlementOutcome::InsufficientFunds { .. } | SettlementOutcome::InvalidAmount => {
                        info!(negotiation_id = %n.id, credits = agreed, "agreed but not settled");
                    }
                }
            }
            NegotiationOutcome::Rejected => {
                self.conclude_record(n.id, NegotiationStatus::Rejected, None, now)
                    .await?;
                self.release(n.employer_agent_id).await?;
                self.release(n.worker_agent_id).await?;
                info!(negotiation_id = %n.id, messages = n.messages.len(), "negotiation rejected");
            }
        }

        self.events.publish(MarketEvent::NegotiationEnded {
            negotiation_id: n.id,
            outcome,
        });
        self.active.lock().remove(&n.id);
        Ok(())
    }

    async fn conclude_record(
        &self,
        id: NegotiationId,
        status: NegotiationStatus,
        agreed: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<(), SimError> {
        match self.store.conclude_negotiation(id, status, agreed, now).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                warn!(negotiation_id = %id, "negotiation record missing at conclusion");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Return a party still marked as negotiating to active.
    async fn release(&self, id: AgentId) -> Result<(), SimError> {
        let Some(agent) = self.fetch(id).await? else {
            return Ok(());
        };
        if agent.status == AgentStatus::Negotiating {
            let agent = self.store.set_status(id, AgentStatus::Active).await?;
            self.events.publish(MarketEvent::status_changed(&agent));
        }
        Ok(())
    }
}

impl<S, C, B> TickPhase for NegotiationCoordinator<S, C, B>
where
    S: MarketStore,
    C: ContentProvider,
    B: EventSink,
{
    fn name(&self) -> &'static str {
        "negotiations"
    }

    fn run(&self) -> BoxFuture<'_, Result<(), SimError>> {
        Box::pin(async move {
            let report = self.advance_due().await;
            if report.advanced + report.agreed + report.rejected + report.failed > 0 {
                debug!(
                    advanced = report.advanced,
                    agreed = report.agreed,
                    rejected = report.rejected,
                    failed = report.failed,
                    "negotiations advanced"
                );
            }
            Ok(())
        })
    }
}
