use deliveroo_grid::{GridError, Pos};
use thiserror::Error;

use crate::intention::Predicate;

/// Failures local to one plan execution. Consumed at the intention boundary:
/// the intention moves on to the next applicable plan.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// Cooperative cancellation; surfaced before any externally visible
    /// action once the stop flag is set.
    #[error("plan stopped")]
    Stopped,

    #[error("no path from {from} to {to}")]
    NoPathFound { from: Pos, to: Pos },

    #[error("pickup refused at {0}")]
    PickupFailed(Pos),

    #[error("putdown refused at {0}")]
    PutdownFailed(Pos),

    #[error("sub-intention failed: {0}")]
    SubIntention(String),

    #[error("client error: {0}")]
    Client(String),
}

impl From<deliveroo_proto::ClientError> for PlanError {
    fn from(err: deliveroo_proto::ClientError) -> Self {
        PlanError::Client(err.to_string())
    }
}

/// Failures surfaced by an intention or the worker. Everything except
/// `Protocol` and `Map` is logged and survived.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("no plan can achieve {0}")]
    NoPlan(Predicate),

    #[error("intention stopped")]
    Stopped,

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The coordination assumption broke (e.g. ordered to deliver with no
    /// reachable depot); continuing would livelock, so the worker dies.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The initial map payload was unusable; the whole belief base would be
    /// untrustworthy.
    #[error("map rejected: {0}")]
    Map(#[from] GridError),
}

impl AgentError {
    /// Errors that must terminate the worker instead of being logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::Protocol(_) | AgentError::Map(_))
    }
}
