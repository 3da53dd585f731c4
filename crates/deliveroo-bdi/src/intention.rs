use core::fmt;

use deliveroo_grid::Pos;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AgentError, PlanError};
use crate::plans::PlanContext;

/// A candidate desire the agent can commit to. One constructor per action
/// tag; the wire tuples of the game never reach this layer unparsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    GoTo { x: i32, y: i32 },
    GoPickUp { x: i32, y: i32, parcel_id: String },
    GoDropOff { x: i32, y: i32, depot_id: Option<String> },
}

impl Predicate {
    pub fn go_to(pos: Pos) -> Self {
        Predicate::GoTo { x: pos.x, y: pos.y }
    }

    pub fn go_pick_up(pos: Pos, parcel_id: impl Into<String>) -> Self {
        Predicate::GoPickUp {
            x: pos.x,
            y: pos.y,
            parcel_id: parcel_id.into(),
        }
    }

    pub fn go_drop_off(pos: Pos) -> Self {
        Predicate::GoDropOff {
            x: pos.x,
            y: pos.y,
            depot_id: None,
        }
    }

    /// Destination tile of the predicate.
    pub fn target(&self) -> Pos {
        match *self {
            Predicate::GoTo { x, y }
            | Predicate::GoPickUp { x, y, .. }
            | Predicate::GoDropOff { x, y, .. } => Pos::new(x, y),
        }
    }

    pub fn is_pickup(&self) -> bool {
        matches!(self, Predicate::GoPickUp { .. })
    }

    pub fn is_drop_off(&self) -> bool {
        matches!(self, Predicate::GoDropOff { .. })
    }

    pub fn is_go_to(&self) -> bool {
        matches!(self, Predicate::GoTo { .. })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::GoTo { x, y } => write!(f, "go_to({x},{y})"),
            Predicate::GoPickUp { x, y, parcel_id } => {
                write!(f, "go_pick_up({x},{y},{parcel_id})")
            }
            Predicate::GoDropOff { x, y, depot_id } => match depot_id {
                Some(id) => write!(f, "go_drop_off({x},{y},{id})"),
                None => write!(f, "go_drop_off({x},{y})"),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentionState {
    Fresh,
    Running,
    Stopped,
    Completed,
}

/// An option the agent committed to. Resolved by trying the plan library in
/// order; cancellable at every await point of the running plan.
pub struct Intention {
    predicate: Predicate,
    state: IntentionState,
    token: CancellationToken,
    result: Option<Result<bool, AgentError>>,
}

impl Intention {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            state: IntentionState::Fresh,
            token: CancellationToken::new(),
            result: None,
        }
    }

    /// A sub-intention raised by a plan; stopping the parent cancels it.
    pub fn sub(predicate: Predicate, parent: &CancellationToken) -> Self {
        Self {
            predicate,
            state: IntentionState::Fresh,
            token: parent.child_token(),
            result: None,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn state(&self) -> IntentionState {
        self.state
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cooperative cancellation: cascades to the running plan and, through
    /// the token tree, to every sub-intention.
    pub fn stop(&mut self) {
        if self.state != IntentionState::Completed {
            self.state = IntentionState::Stopped;
        }
        self.token.cancel();
    }

    /// Resolve the predicate by trying each plan in library order.
    ///
    /// Idempotent: once resolved (or failed), re-achieving returns the cached
    /// outcome without re-running any plan.
    pub async fn achieve(&mut self, ctx: &PlanContext) -> Result<bool, AgentError> {
        if let Some(result) = &self.result {
            return result.clone();
        }
        if self.state == IntentionState::Stopped || self.token.is_cancelled() {
            return self.finish(Err(AgentError::Stopped));
        }

        self.state = IntentionState::Running;
        let plans = ctx.plans.clone();
        for plan in plans.iter() {
            if !plan.applicable(&self.predicate) {
                continue;
            }
            let outcome = plan.execute(ctx, &self.predicate, &self.token).await;
            match outcome {
                Ok(value) => return self.finish(Ok(value)),
                Err(PlanError::Stopped) => return self.finish(Err(AgentError::Stopped)),
                Err(err) => {
                    debug!(plan = plan.name(), intention = %self.predicate, %err, "plan failed, trying next");
                }
            }
        }

        if self.token.is_cancelled() {
            return self.finish(Err(AgentError::Stopped));
        }
        let predicate = self.predicate.clone();
        self.finish(Err(AgentError::NoPlan(predicate)))
    }

    fn finish(&mut self, result: Result<bool, AgentError>) -> Result<bool, AgentError> {
        self.state = match result {
            Err(AgentError::Stopped) => IntentionState::Stopped,
            _ => IntentionState::Completed,
        };
        self.result = Some(result.clone());
        result
    }
}
