//! # clawinn-sim
//!
//! The Clawinn marketplace simulation.
//!
//! One [`TickScheduler`] drives everything. Each tick runs, in order:
//!
//! 1. [`JobTrigger`] - maybe pair an idle employer with an idle worker
//! 2. [`NegotiationCoordinator`] - advance every due negotiation one step
//! 3. [`CooldownManager`] - release workers whose cooldown expired
//! 4. [`RoleSwitcher`] - move agents across the employer/worker thresholds
//! 5. [`JackpotLottery`] - hourly lottery draw
//! 6. stats broadcast
//!
//! Agreed negotiations are paid out by [`HireSettlement`]. A failing phase is
//! logged and skipped; the next tick runs regardless.
//!
//! ## Example
//!
//! ```rust,no_run
//! use clawinn_core::{EventLog, MemoryStore, ScriptedContent, SimConfig};
//! use clawinn_sim::{Marketplace, seed_marketplace};
//!
//! # async fn demo() -> Result<(), clawinn_sim::SimError> {
//! let market = Marketplace::builder(MemoryStore::new(), ScriptedContent, EventLog::new())
//!     .config(SimConfig::default())
//!     .seed(42)
//!     .build()?;
//! seed_marketplace(market.store(), &market.config().population, market.rng(), market.clock()).await?;
//!
//! let scheduler = market.scheduler();
//! scheduler.start();
//! // ...
//! scheduler.stop();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod cooldown;
pub mod error;
pub mod jackpot;
pub mod marketplace;
pub mod negotiation;
pub mod phases;
pub mod pricing;
pub mod roles;
pub mod scheduler;
pub mod seed;
pub mod settlement;
pub mod startup;
pub mod trigger;

pub use cooldown::CooldownManager;
pub use error::SimError;
pub use jackpot::JackpotLottery;
pub use marketplace::{Marketplace, MarketplaceBuilder};
pub use negotiation::{
    ActiveNegotiation, AdvanceOutcome, AdvanceReport, NegotiationCoordinator, NegotiationPhase,
    ThinkingMode,
};
pub use phases::StatsBroadcast;
pub use pricing::{OfferResponse, calculate_worker_price, evaluate_offer};
pub use roles::{RoleChange, RoleSwitcher, next_role};
pub use scheduler::{TickPhase, TickReport, TickScheduler};
pub use seed::seed_marketplace;
pub use settlement::{HireSettlement, SettlementOutcome};
pub use startup::{RepairReport, repair_marketplace};
pub use trigger::JobTrigger;
