//! # clawinn-core
//!
//! Data model and ports for the Clawinn labor marketplace simulation.
//!
//! This crate provides:
//!
//! - **Model**: [`Agent`], [`NegotiationRecord`], [`HireEvent`], [`Task`], [`JackpotEvent`]
//! - **Configuration**: [`SimConfig`] with every tunable constant of the simulation
//! - **Persistence port**: [`MarketStore`] and the in-memory [`MemoryStore`]
//! - **Content port**: [`ContentProvider`] with [`ScriptedContent`] and [`RateLimitedContent`]
//! - **Broadcast port**: [`EventSink`] with [`ChannelBroadcaster`] and [`EventLog`]
//! - **Determinism**: injectable [`Clock`] and seedable [`SimRng`]
//!
//! ## Example
//!
//! ```rust
//! use clawinn_core::{Agent, AgentRole, AgentStatus};
//! use chrono::Utc;
//! use uuid::Uuid;
//!
//! let agent = Agent::new(Uuid::new_v4(), "NexusBot", AgentRole::Worker, 500, Utc::now());
//! assert_eq!(agent.status, AgentStatus::Active);
//! assert!(agent.cooldown_ends_at.is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod random;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ContentConfig, CooldownConfig, JackpotConfig, NegotiationConfig, PopulationConfig,
    RoleConfig, SimConfig,
};
pub use content::{
    Completion, ContentProvider, ContentRequest, HistoryLine, PhaseKind, Prompt, PromptRole,
    RateLimitedContent, ScriptedContent, TextGenerator,
};
pub use error::{ConfigError, ContentError, StoreError};
pub use events::{ChannelBroadcaster, EventLog, EventSink, MarketEvent, NegotiationOutcome};
pub use memory::{MemoryStore, StoreSnapshot};
pub use model::{
    Agent, AgentId, AgentRole, AgentStatus, ChatMessage, HireEvent, HireEventId, HireReceipt,
    JackpotEvent, MarketStats, NegotiationId, NegotiationRecord, NegotiationStatus, Task,
    TaskId, TaskStatus,
};
pub use random::SimRng;
pub use store::{AgentFilter, MarketStore};
