use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ensure_not_stopped, Plan, PlanContext};
use crate::error::{AgentError, PlanError};
use crate::intention::{Intention, Predicate};

/// Walk to a parcel (sub-intention) and pick it up.
pub struct GoPickUp;

#[async_trait]
impl Plan for GoPickUp {
    fn name(&self) -> &'static str {
        "go_pick_up"
    }

    fn applicable(&self, predicate: &Predicate) -> bool {
        predicate.is_pickup()
    }

    async fn execute(
        &self,
        ctx: &PlanContext,
        predicate: &Predicate,
        token: &CancellationToken,
    ) -> Result<bool, PlanError> {
        let Predicate::GoPickUp { parcel_id, .. } = predicate else {
            return Err(PlanError::SubIntention("not a pickup predicate".into()));
        };
        let target = predicate.target();

        if ctx.agent.current_position().await != target {
            let mut sub = Intention::sub(Predicate::go_to(target), token);
            match sub.achieve(ctx).await {
                Ok(_) => {}
                Err(AgentError::Stopped) => return Err(PlanError::Stopped),
                Err(err) => return Err(PlanError::SubIntention(err.to_string())),
            }
        }

        ensure_not_stopped(token)?;
        if ctx.client.emit_pickup().await? {
            ctx.agent.picked_up_parcel(&ctx.world, parcel_id);
            Ok(true)
        } else {
            Err(PlanError::PickupFailed(target))
        }
    }
}
