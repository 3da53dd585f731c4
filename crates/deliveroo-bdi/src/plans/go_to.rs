use std::time::Duration;

use async_trait::async_trait;
use deliveroo_grid::{find_path, Pos};
use deliveroo_proto::Direction;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ensure_not_stopped, Plan, PlanContext};
use crate::error::PlanError;
use crate::intention::Predicate;

const MOVE_RETRIES: u32 = 2;
const RETRY_GAP: Duration = Duration::from_millis(10);

/// Route to a tile along an A* path, one move RPC per step.
pub struct GoTo;

impl GoTo {
    /// Cardinal direction whose sign matches the step; horizontal wins when
    /// both axes differ.
    pub(crate) fn step_direction(from: Pos, to: Pos) -> Direction {
        let dx = to.x - from.x;
        if dx > 0 {
            Direction::Right
        } else if dx < 0 {
            Direction::Left
        } else if to.y > from.y {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// One path step: up to two retries with a short gap, then give up so
    /// the caller replans. `Ok(true)` once we stand on `step`.
    async fn step_to(
        &self,
        ctx: &PlanContext,
        step: Pos,
        token: &CancellationToken,
    ) -> Result<bool, PlanError> {
        for attempt in 0..=MOVE_RETRIES {
            ensure_not_stopped(token)?;
            let here = ctx.agent.current_position().await;
            if here == step {
                return Ok(true);
            }
            let direction = Self::step_direction(here, step);
            if ctx.client.emit_move(direction).await? {
                // The authoritative position event will confirm shortly.
                ctx.agent.set_position(step);
                return Ok(true);
            }
            if attempt < MOVE_RETRIES {
                tokio::time::sleep(RETRY_GAP).await;
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl Plan for GoTo {
    fn name(&self) -> &'static str {
        "go_to"
    }

    fn applicable(&self, predicate: &Predicate) -> bool {
        predicate.is_go_to()
    }

    async fn execute(
        &self,
        ctx: &PlanContext,
        predicate: &Predicate,
        token: &CancellationToken,
    ) -> Result<bool, PlanError> {
        let target = predicate.target();
        loop {
            ensure_not_stopped(token)?;
            let from = ctx.agent.current_position().await;
            if from == target {
                return Ok(true);
            }

            let map = ctx.world.snapshot_wait().await;
            let Some(path) = find_path(&map, ctx.world.role(), from, target) else {
                return Err(PlanError::NoPathFound { from, to: target });
            };

            let mut blocked = false;
            for step in path {
                if !self.step_to(ctx, step, token).await? {
                    blocked = true;
                    break;
                }
            }
            if blocked {
                debug!(%target, "route blocked, replanning");
            }
            // Loop re-checks arrival against a fresh snapshot.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_preferred_over_vertical() {
        let from = Pos::new(2, 2);
        assert_eq!(GoTo::step_direction(from, Pos::new(3, 3)), Direction::Right);
        assert_eq!(GoTo::step_direction(from, Pos::new(1, 1)), Direction::Left);
        assert_eq!(GoTo::step_direction(from, Pos::new(2, 3)), Direction::Up);
        assert_eq!(GoTo::step_direction(from, Pos::new(2, 1)), Direction::Down);
    }
}
