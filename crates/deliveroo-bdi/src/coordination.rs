use std::sync::Arc;

use deliveroo_grid::{path_distance, Pos, Role};
use deliveroo_proto::{Behavior, CoordMessage, DeliveryTileStatus};
use tracing::{debug, info, warn};

use crate::agent::AgentHandle;
use crate::error::AgentError;
use crate::options::closest_depot;
use crate::world::WorldState;

/// Handles everything the companion says: ignore lists, position reports
/// (and the role election they trigger on the leader), hand-to-hand orders,
/// and the delivery-tile negotiation.
pub struct Coordinator {
    world: Arc<WorldState>,
    agent: AgentHandle,
}

impl Coordinator {
    pub fn new(world: Arc<WorldState>, agent: AgentHandle) -> Self {
        Self { world, agent }
    }

    pub fn handle_message(&self, from: &str, message: CoordMessage) -> Result<(), AgentError> {
        let cfg = self.agent.config();
        if let Some(companion) = cfg.companion_id.as_deref() {
            if from != companion {
                debug!(from, "coordination message from a stranger, ignored");
                return Ok(());
            }
        }

        match message {
            CoordMessage::MultiPickup { parcel_ids } => {
                debug!(count = parcel_ids.len(), "companion claimed pickups");
                self.agent
                    .with(|st| st.parcels_to_ignore = parcel_ids.into_iter().collect());
            }
            CoordMessage::CompanionPosition { x, y } => {
                let pos = Pos::new(x, y);
                let companion_role = cfg.role.companion();
                self.world
                    .with_map_mut(|map| map.set_teammate_pos(companion_role, pos));
                if cfg.role == Role::Leader && !self.agent.with(|st| st.election_done) {
                    self.elect_roles();
                }
            }
            CoordMessage::Hand2Hand { behavior } => self.apply_role_order(behavior)?,
            CoordMessage::DeliveryTile { status, tile } => match status {
                DeliveryTileStatus::Set => self.accept_delivery_tile(tile),
                DeliveryTileStatus::Error => self.reject_delivery_tile(),
            },
        }
        Ok(())
    }

    /// Leader-side role election, run on the first companion position
    /// report. Each side must be able to do at least one of gather/deliver
    /// alone; whichever half we cannot do goes to the companion.
    fn elect_roles(&self) {
        let Some(pos) = self.agent.position() else {
            // Own position arrives before companion traffic is answered;
            // the next report retriggers the election.
            return;
        };
        let Some(map) = self.world.snapshot() else {
            return;
        };
        let role = self.agent.config().role;

        let reachable_depot = closest_depot(&map, role, pos);
        let can_deliver = reachable_depot.is_some();
        let can_gather = map
            .spawn_tiles()
            .iter()
            .any(|s| path_distance(&map, role, pos, *s).is_some());

        if !can_deliver {
            info!("no reachable depot here, companion delivers");
            self.agent.send_to_companion(CoordMessage::Hand2Hand {
                behavior: Behavior::Deliver,
            });
            self.agent.with(|st| st.hand2hand = Behavior::Gather);
        } else if !can_gather {
            info!("no reachable spawn here, companion gathers");
            self.agent.send_to_companion(CoordMessage::Hand2Hand {
                behavior: Behavior::Gather,
            });
            self.agent.with(|st| {
                st.hand2hand = Behavior::Deliver;
                st.depot = reachable_depot;
            });
        } else {
            self.agent.send_to_companion(CoordMessage::Hand2Hand {
                behavior: Behavior::None,
            });
        }

        self.agent.with(|st| {
            st.election_done = true;
            st.initialized = true;
        });
    }

    /// Follower-side switch into the commanded mode. An order we cannot
    /// honour means the election ran on broken assumptions; continuing would
    /// livelock the pair, so it is fatal.
    fn apply_role_order(&self, behavior: Behavior) -> Result<(), AgentError> {
        let cfg = self.agent.config();
        if cfg.role == Role::Leader {
            warn!("leader received a role order, ignored");
            return Ok(());
        }
        let Some(pos) = self.agent.position() else {
            return Err(AgentError::Protocol(
                "role order received before own position".into(),
            ));
        };
        let Some(map) = self.world.snapshot() else {
            return Err(AgentError::Protocol("role order received before the map".into()));
        };

        match behavior {
            Behavior::Deliver => {
                let Some(depot) = closest_depot(&map, cfg.role, pos) else {
                    return Err(AgentError::Protocol(
                        "ordered to deliver with no reachable depot".into(),
                    ));
                };
                info!(%depot, "switching to deliver");
                self.agent.with(|st| {
                    st.hand2hand = Behavior::Deliver;
                    st.depot = Some(depot);
                    st.initialized = true;
                });
            }
            Behavior::Gather => {
                let reachable_spawn = map
                    .spawn_tiles()
                    .iter()
                    .any(|s| path_distance(&map, cfg.role, pos, *s).is_some());
                if !reachable_spawn {
                    return Err(AgentError::Protocol(
                        "ordered to gather with no reachable spawn".into(),
                    ));
                }
                info!("switching to gather");
                self.agent.with(|st| {
                    st.hand2hand = Behavior::Gather;
                    st.initialized = true;
                });
            }
            Behavior::None => {
                self.agent.with(|st| st.initialized = true);
            }
        }
        Ok(())
    }

    /// Gather side of the negotiation: record the proposal if we can reach
    /// it, otherwise send it back as an error.
    fn accept_delivery_tile(&self, tile: Option<Pos>) {
        let Some(tile) = tile else {
            warn!("delivery tile proposal carried no tile");
            return;
        };
        let reachable = match (self.agent.position(), self.world.snapshot()) {
            (Some(pos), Some(map)) => {
                path_distance(&map, self.agent.config().role, pos, tile).is_some()
            }
            _ => false,
        };
        if reachable {
            info!(%tile, "delivery tile agreed");
            self.agent.with(|st| st.delivery_tile = Some(tile));
        } else {
            info!(%tile, "delivery tile unreachable, rejecting");
            self.agent.send_to_companion(CoordMessage::DeliveryTile {
                status: DeliveryTileStatus::Error,
                tile: None,
            });
        }
    }

    /// Deliver side: the proposal was rejected, so it joins the avoid list
    /// and the next generation round proposes a different tile.
    fn reject_delivery_tile(&self) {
        self.agent.with(|st| {
            if let Some(tile) = st.delivery_tile.take() {
                st.tiles_to_avoid.push(tile);
            }
        });
    }
}
