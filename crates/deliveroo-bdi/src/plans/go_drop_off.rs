use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ensure_not_stopped, Plan, PlanContext};
use crate::error::{AgentError, PlanError};
use crate::intention::{Intention, Predicate};

/// Walk to the target tile (sub-intention) and put every carried parcel
/// down. The depot id in the predicate is a hint only; putting down works on
/// any tile, which is what the gather courier relies on.
pub struct GoDropOff;

#[async_trait]
impl Plan for GoDropOff {
    fn name(&self) -> &'static str {
        "go_drop_off"
    }

    fn applicable(&self, predicate: &Predicate) -> bool {
        predicate.is_drop_off()
    }

    async fn execute(
        &self,
        ctx: &PlanContext,
        predicate: &Predicate,
        token: &CancellationToken,
    ) -> Result<bool, PlanError> {
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
        if ctx.client.emit_putdown().await? {
            ctx.agent.drop_all_parcels();
            Ok(true)
        } else {
            Err(PlanError::PutdownFailed(target))
        }
    }
}
