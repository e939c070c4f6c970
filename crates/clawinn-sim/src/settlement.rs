//! Hire settlement.
//!
//! Turns an agreed negotiation into a credit transfer. Settlement is
//! idempotent per negotiation: the store refuses a second hire for the same
//! negotiation id, and that refusal is reported as
//! [`SettlementOutcome::AlreadySettled`] rather than an error.

use std::sync::Arc;

use clawinn_core::{
    AgentId, AgentStatus, Clock, EventSink, HireEvent, MarketEvent, MarketStore, NegotiationId,
    SimRng, StoreError, Task,
};
use tracing::{debug, info, warn};

use crate::cooldown::CooldownManager;
use crate::error::SimError;

/// Result of a settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Credits moved and the hire was recorded.
    Settled {
        /// The recorded hire.
        hire: HireEvent,
        /// Task assigned to the worker, if the employer had one open.
        task: Option<Task>,
    },
    /// This negotiation was settled before; no credits moved.
    AlreadySettled,
    /// The employer could not pay; both agents are back to active.
    InsufficientFunds {
        /// Agreed amount.
        required: u64,
        /// Employer's balance at the time.
        available: u64,
    },
    /// Zero-credit deals are not recorded; both agents are back to active.
    InvalidAmount,
}

/// Settles agreed negotiations.
pub struct HireSettlement<S, B> {
    store: Arc<S>,
    events: Arc<B>,
    cooldowns: Arc<CooldownManager<S, B>>,
    clock: Arc<dyn Clock>,
    rng: SimRng,
}

impl<S: MarketStore, B: EventSink> HireSettlement<S, B> {
    /// Creates a settlement service.
    pub fn new(
        store: Arc<S>,
        events: Arc<B>,
        cooldowns: Arc<CooldownManager<S, B>>,
        clock: Arc<dyn Clock>,
        rng: SimRng,
    ) -> Self {
        Self {
            store,
            events,
            cooldowns,
            clock,
            rng,
        }
    }

    /// Pay `amount` from employer to worker for `negotiation_id`.
    ///
    /// On success the employer's first open task goes to the worker, the
    /// worker enters cooldown and the employer returns to active.
    pub async fn settle(
        &self,
        negotiation_id: NegotiationId,
        employer_id: AgentId,
        worker_id: AgentId,
        amount: u64,
    ) -> Result<SettlementOutcome, SimError> {
        if let Some(existing) = self.store.hire_event_for(negotiation_id).await? {
            debug!(negotiation_id = %negotiation_id, "hire already settled");
            self.resume(&existing).await?;
            return Ok(SettlementOutcome::AlreadySettled);
        }

        if amount == 0 {
            warn!(negotiation_id = %negotiation_id, "refusing zero-credit hire");
            self.release(employer_id, worker_id).await?;
            return Ok(SettlementOutcome::InvalidAmount);
        }

        let hire = HireEvent {
            id: self.rng.uuid(),
            negotiation_id,
            employer_agent_id: employer_id,
            worker_agent_id: worker_id,
            credits_amount: amount,
            timestamp: self.clock.now(),
        };

        let receipt = match self.store.record_hire(hire.clone()).await {
            Ok(receipt) => receipt,
            Err(StoreError::Conflict(_)) => {
                debug!(negotiation_id = %negotiation_id, "hire recorded concurrently");
                return Ok(SettlementOutcome::AlreadySettled);
            }
            Err(StoreError::InsufficientFunds {
                required,
                available,
            }) => {
                info!(
                    negotiation_id = %negotiation_id,
                    required,
                    available,
                    "employer cannot pay, hire aborted"
                );
                self.release(employer_id, worker_id).await?;
                return Ok(SettlementOutcome::InsufficientFunds {
                    required,
                    available,
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            negotiation_id = %negotiation_id,
            hire_id = %hire.id,
            credits = amount,
            employer_balance = receipt.employer_balance,
            worker_balance = receipt.worker_balance,
            "hire settled"
        );
        self.events.publish(MarketEvent::hire_completed(&hire));

        let task = self.complete_hire(&hire).await?;
        Ok(SettlementOutcome::Settled { hire, task })
    }

    /// Task assignment, worker cooldown and employer release for a recorded hire.
    async fn complete_hire(&self, hire: &HireEvent) -> Result<Option<Task>, SimError> {
        let already_assigned = self
            .store
            .list_tasks()
            .await?
            .iter()
            .any(|t| t.hire_event_id == Some(hire.id));

        let task = match self.store.first_open_task(hire.employer_agent_id).await? {
            Some(open) if !already_assigned => {
                let task = self
                    .store
                    .assign_task(open.id, hire.worker_agent_id, hire.id)
                    .await?;
                self.events.publish(MarketEvent::task_changed(&task));
                Some(task)
            }
            _ => None,
        };

        let worker = self.cooldowns.assign(hire.worker_agent_id).await?;
        self.events.publish(MarketEvent::balance_changed(&worker));

        let employer = self
            .store
            .set_status(hire.employer_agent_id, AgentStatus::Active)
            .await?;
        self.events.publish(MarketEvent::balance_changed(&employer));
        self.events.publish(MarketEvent::status_changed(&employer));

        Ok(task)
    }

    /// Finish the bookkeeping of a hire whose settlement was interrupted
    /// after the transfer. A fully settled hire is left untouched.
    async fn resume(&self, hire: &HireEvent) -> Result<(), SimError> {
        let worker = match self.store.get_agent(hire.worker_agent_id).await {
            Ok(worker) => worker,
            Err(StoreError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if worker.status == AgentStatus::Negotiating {
            warn!(hire_id = %hire.id, "resuming interrupted hire");
            self.complete_hire(hire).await?;
            return Ok(());
        }

        match self.store.get_agent(hire.employer_agent_id).await {
            Ok(employer) if employer.status == AgentStatus::Negotiating => {
                let employer = self
                    .store
                    .set_status(employer.id, AgentStatus::Active)
                    .await?;
                self.events.publish(MarketEvent::status_changed(&employer));
                Ok(())
            }
            Ok(_) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn release(&self, employer_id: AgentId, worker_id: AgentId) -> Result<(), SimError> {
        for id in [employer_id, worker_id] {
            match self.store.set_status(id, AgentStatus::Active).await {
                Ok(agent) => self.events.publish(MarketEvent::status_changed(&agent)),
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
