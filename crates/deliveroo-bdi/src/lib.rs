//! Belief-desire-intention core for the Deliveroo courier agents.
//!
//! The observer folds sensor events into the spatial belief, the option
//! generator turns beliefs into candidate predicates, the agent loop commits
//! to them one at a time, and the plan library realises them against the
//! game client. The coordination handlers let two workers reorganise into a
//! hand-to-hand relay when the map topology demands it.

#![forbid(unsafe_code)]

pub mod agent;
pub mod config;
pub mod coordination;
pub mod error;
pub mod intention;
pub mod observer;
pub mod options;
pub mod plans;
pub mod world;
pub mod worker;

pub use agent::{AgentHandle, AgentState};
pub use config::WorkerConfig;
pub use coordination::Coordinator;
pub use error::{AgentError, PlanError};
pub use intention::{Intention, IntentionState, Predicate};
pub use observer::Observer;
pub use options::OptionGenerator;
pub use plans::{default_library, Plan, PlanContext, PlanLibrary};
pub use world::{WorldConfig, WorldState};
pub use worker::run_worker;
