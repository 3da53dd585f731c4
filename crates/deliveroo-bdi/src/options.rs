use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use deliveroo_grid::{path_distance, GridMap, Pos, Role};
use deliveroo_proto::{Behavior, CoordMessage, DeliveryTileStatus};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::agent::AgentHandle;
use crate::intention::Predicate;
use crate::world::WorldState;

/// Turns current beliefs into candidate predicates, one producer per
/// behaviour mode. Runs after every parcels/agents sensing event and on the
/// option-generation timer; it only reads and pushes, so it is synchronous.
pub struct OptionGenerator {
    world: Arc<WorldState>,
    agent: AgentHandle,
    rng: Mutex<StdRng>,
}

impl OptionGenerator {
    pub fn new(world: Arc<WorldState>, agent: AgentHandle) -> Self {
        let rng = Mutex::new(StdRng::seed_from_u64(agent.config().rng_seed));
        Self { world, agent, rng }
    }

    pub fn generate(&self) {
        let Some(map) = self.world.snapshot() else {
            return;
        };
        match self.agent.with(|st| st.hand2hand) {
            Behavior::None => self.generate_normal(&map),
            Behavior::Gather => self.generate_gather(&map),
            Behavior::Deliver => self.generate_deliver(&map),
        }
    }

    fn generate_normal(&self, map: &GridMap) {
        let role = self.agent.config().role;
        let (pos, ignored, carrying) = self.agent.with(|st| {
            (
                st.pos,
                st.parcels_to_ignore.clone(),
                st.carried_count > 0,
            )
        });

        for parcel in map.parcels() {
            if ignored.contains(&parcel.id) {
                continue;
            }
            self.agent
                .push(&self.world, Predicate::go_pick_up(parcel.pos, &parcel.id));
        }

        if carrying {
            if let Some(from) = pos {
                if let Some(depot) = closest_depot(map, role, from) {
                    self.agent.push(&self.world, Predicate::go_drop_off(depot));
                }
            }
        }

        if self.agent.queue_is_empty() {
            if let Some(from) = pos {
                if let Some(spawn) = self.random_spawn_target(map, role, from) {
                    debug!(%spawn, "repositioning towards a spawn tile");
                    self.agent.push(&self.world, Predicate::go_to(spawn));
                }
            }
        }
    }

    fn generate_gather(&self, map: &GridMap) {
        let (ignored, carrying, delivery) = self.agent.with(|st| {
            (
                st.parcels_to_ignore.clone(),
                st.carried_count > 0,
                st.delivery_tile,
            )
        });
        // Nothing to do until the deliverer proposed a tile.
        let Some(delivery) = delivery else { return };

        for parcel in map.parcels() {
            if parcel.pos == delivery || ignored.contains(&parcel.id) {
                continue;
            }
            self.agent
                .push(&self.world, Predicate::go_pick_up(parcel.pos, &parcel.id));
        }

        if carrying {
            self.agent
                .push(&self.world, Predicate::go_drop_off(delivery));
        } else if self.agent.queue_is_empty() {
            if let Some(first_spawn) = map.spawn_tiles().first() {
                self.agent.push(&self.world, Predicate::go_to(*first_spawn));
            }
        }
    }

    fn generate_deliver(&self, map: &GridMap) {
        let cfg = self.agent.config();
        let (pos, carrying, depot, delivery, retries) = self.agent.with(|st| {
            (
                st.pos,
                st.carried_count > 0,
                st.depot,
                st.delivery_tile,
                st.delivery_tile_retries,
            )
        });
        let (Some(from), Some(depot)) = (pos, depot) else {
            return;
        };

        if !carrying && from != depot {
            self.agent.push(&self.world, Predicate::go_to(depot));
        }

        if delivery.is_none() && retries < cfg.max_retry_common_delivery {
            let found = self.agent.with(|st| {
                st.delivery_tile_retries += 1;
                find_common_delivery_tile(
                    map,
                    cfg.role,
                    from,
                    &mut st.tiles_to_avoid,
                    VecDeque::from([depot]),
                )
            });
            if let Some(tile) = found {
                self.agent.with(|st| st.delivery_tile = Some(tile));
                info!(%tile, "proposing delivery tile");
                self.agent.send_to_companion(CoordMessage::DeliveryTile {
                    status: DeliveryTileStatus::Set,
                    tile: Some(tile),
                });
            }
        }

        if let Some(tile) = self.agent.with(|st| st.delivery_tile) {
            for parcel in map.parcels() {
                if parcel.pos == tile {
                    self.agent
                        .push(&self.world, Predicate::go_pick_up(parcel.pos, &parcel.id));
                }
            }
        }

        if carrying {
            self.agent.push(&self.world, Predicate::go_drop_off(depot));
        }
    }

    /// Pick a spawn tile to idle towards: Euclidean-near ones first, among
    /// them the ones actually reachable within the same bound, all spawns
    /// when nothing is near. Uniformly random among the survivors.
    fn random_spawn_target(&self, map: &GridMap, role: Role, from: Pos) -> Option<Pos> {
        let spawns = map.spawn_tiles();
        if spawns.is_empty() {
            return None;
        }
        let limit = self.agent.config().max_random_move_distance;

        let near: Vec<Pos> = spawns
            .iter()
            .copied()
            .filter(|s| from.euclidean(*s) <= limit as f64)
            .collect();
        let pool: Vec<Pos> = if near.is_empty() {
            spawns.to_vec()
        } else {
            let reachable: Vec<Pos> = near
                .iter()
                .copied()
                .filter(|s| {
                    matches!(path_distance(map, role, from, *s), Some(d) if d <= limit as usize)
                })
                .collect();
            if reachable.is_empty() {
                near
            } else {
                reachable
            }
        };

        let mut rng = self.rng.lock().unwrap();
        pool.choose(&mut *rng).copied()
    }
}

/// Depot with the shortest A* path from `from`, if any is reachable.
pub(crate) fn closest_depot(map: &GridMap, role: Role, from: Pos) -> Option<Pos> {
    map.depot_tiles()
        .iter()
        .copied()
        .filter_map(|depot| path_distance(map, role, from, depot).map(|d| (d, depot)))
        .min_by_key(|(d, _)| *d)
        .map(|(_, depot)| depot)
}

/// Breadth-first search for a tile both couriers can work with.
///
/// Dequeues candidates; the first one that is neither avoided nor
/// unreachable from `from` wins. Everything else joins the avoid list and
/// contributes its walkable neighbours. `None` once the frontier dries up.
pub fn find_common_delivery_tile(
    map: &GridMap,
    role: Role,
    from: Pos,
    avoid: &mut Vec<Pos>,
    mut candidates: VecDeque<Pos>,
) -> Option<Pos> {
    while let Some(candidate) = candidates.pop_front() {
        if !avoid.contains(&candidate) && path_distance(map, role, from, candidate).is_some() {
            return Some(candidate);
        }
        if !avoid.contains(&candidate) {
            avoid.push(candidate);
        }
        for neighbor in map.walkable_neighbors(candidate, role, true) {
            if !avoid.contains(&neighbor.pos) && !candidates.contains(&neighbor.pos) {
                candidates.push_back(neighbor.pos);
            }
        }
    }
    None
}
