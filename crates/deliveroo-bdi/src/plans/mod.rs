//! The plan library: one entry per action tag, tried in order by an
//! intention until one applies and succeeds.

mod go_drop_off;
mod go_pick_up;
mod go_to;
#[cfg(feature = "pddl")]
pub mod pddl;

use std::sync::Arc;

use async_trait::async_trait;
use deliveroo_proto::GameClient;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentHandle;
use crate::error::PlanError;
use crate::intention::Predicate;
use crate::world::WorldState;

pub use go_drop_off::GoDropOff;
pub use go_pick_up::GoPickUp;
pub use go_to::GoTo;

/// Everything a plan needs to act: beliefs, own state, the game connection,
/// and the library itself for sub-intentions.
pub struct PlanContext {
    pub world: Arc<WorldState>,
    pub agent: AgentHandle,
    pub client: Arc<dyn GameClient>,
    pub plans: PlanLibrary,
}

pub type PlanLibrary = Arc<Vec<Arc<dyn Plan>>>;

/// A way of realising intentions of one action tag.
///
/// Implementations check the stop token before every externally visible
/// action (move, pickup, putdown) and surface [`PlanError::Stopped`] when it
/// is set.
#[async_trait]
pub trait Plan: Send + Sync {
    fn name(&self) -> &'static str;

    fn applicable(&self, predicate: &Predicate) -> bool;

    async fn execute(
        &self,
        ctx: &PlanContext,
        predicate: &Predicate,
        token: &CancellationToken,
    ) -> Result<bool, PlanError>;
}

pub fn default_library() -> PlanLibrary {
    let plans: Vec<Arc<dyn Plan>> = vec![Arc::new(GoPickUp), Arc::new(GoDropOff), Arc::new(GoTo)];
    Arc::new(plans)
}

pub(crate) fn ensure_not_stopped(token: &CancellationToken) -> Result<(), PlanError> {
    if token.is_cancelled() {
        Err(PlanError::Stopped)
    } else {
        Ok(())
    }
}
