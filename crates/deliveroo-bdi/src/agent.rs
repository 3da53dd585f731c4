use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use deliveroo_grid::{path_distance, Pos};
use deliveroo_proto::{Behavior, CoordMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::error::AgentError;
use crate::intention::{Intention, Predicate};
use crate::plans::PlanContext;
use crate::world::WorldState;

/// Mutable per-agent state. Guarded by the handle's mutex; no lock is ever
/// held across an await.
pub struct AgentState {
    /// None until the first `You` event.
    pub pos: Option<Pos>,
    pub carried_count: u32,
    pub hand2hand: Behavior,
    /// Target depot; set when entering Deliver mode.
    pub depot: Option<Pos>,
    /// Shared tile agreed through the delivery-tile negotiation.
    pub delivery_tile: Option<Pos>,
    pub delivery_tile_retries: u32,
    /// Rejected or unusable delivery-tile candidates; persists across
    /// negotiations so a fresh candidate is proposed each round.
    pub tiles_to_avoid: Vec<Pos>,
    /// Parcels claimed by the companion via `multi_pickup`.
    pub parcels_to_ignore: HashSet<String>,
    /// The loop only consumes intentions once this is set; flipped at
    /// startup in solo mode, by the election paths in dual mode.
    pub initialized: bool,
    pub election_done: bool,
    pub(crate) queue: VecDeque<Intention>,
}

/// Cheap clonable handle to one courier's state, outbox and configuration.
#[derive(Clone)]
pub struct AgentHandle {
    cfg: Arc<WorkerConfig>,
    state: Arc<Mutex<AgentState>>,
    outbox: mpsc::UnboundedSender<CoordMessage>,
}

impl AgentHandle {
    pub fn new(cfg: Arc<WorkerConfig>, outbox: mpsc::UnboundedSender<CoordMessage>) -> Self {
        let state = AgentState {
            pos: None,
            carried_count: 0,
            hand2hand: Behavior::None,
            depot: None,
            delivery_tile: None,
            delivery_tile_retries: 0,
            tiles_to_avoid: Vec::new(),
            parcels_to_ignore: HashSet::new(),
            initialized: !cfg.dual_agent,
            election_done: false,
            queue: VecDeque::new(),
        };
        Self {
            cfg,
            state: Arc::new(Mutex::new(state)),
            outbox,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut AgentState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn position(&self) -> Option<Pos> {
        self.with(|st| st.pos)
    }

    /// Yield until the first `You` event told us where we are.
    pub async fn current_position(&self) -> Pos {
        loop {
            if let Some(pos) = self.position() {
                return pos;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Record a new position; `true` when it actually changed.
    pub fn set_position(&self, pos: Pos) -> bool {
        self.with(|st| {
            let changed = st.pos != Some(pos);
            st.pos = Some(pos);
            changed
        })
    }

    pub fn carrying(&self) -> bool {
        self.with(|st| st.carried_count > 0)
    }

    pub fn picked_up_parcel(&self, world: &WorldState, parcel_id: &str) {
        self.with(|st| st.carried_count += 1);
        world.with_map_mut(|map| map.parcel_picked_up(parcel_id));
        debug!(parcel_id, "picked up");
    }

    pub fn drop_all_parcels(&self) {
        self.with(|st| st.carried_count = 0);
    }

    /// Queue a message for the companion; a no-op outside dual mode.
    pub fn send_to_companion(&self, message: CoordMessage) {
        if self.cfg.dual_agent {
            let _ = self.outbox.send(message);
        }
    }

    pub fn queue_is_empty(&self) -> bool {
        self.with(|st| st.queue.is_empty())
    }

    /// Predicates currently queued, head first.
    pub fn queued_predicates(&self) -> Vec<Predicate> {
        self.with(|st| st.queue.iter().map(|i| i.predicate().clone()).collect())
    }

    /// Commit to a new option. Rejects element-wise duplicates, then
    /// re-sorts the queue.
    pub fn push(&self, world: &WorldState, predicate: Predicate) -> bool {
        {
            let mut st = self.state.lock().unwrap();
            if st.queue.iter().any(|i| i.predicate() == &predicate) {
                return false;
            }
            debug!(intention = %predicate, "queued");
            st.queue.push_back(Intention::new(predicate));
        }
        self.sort_intention_queue(world);
        true
    }

    /// Enforce the priority policy: pickups sorted by path length from the
    /// position captured at sort time, then at most one drop-off, then at
    /// most one reposition; under carry saturation only the drop-off
    /// survives. In dual mode the sorted pickup targets are announced to the
    /// companion so it leaves them alone.
    pub fn sort_intention_queue(&self, world: &WorldState) {
        let Some(map) = world.snapshot() else { return };
        let role = self.cfg.role;
        let mut st = self.state.lock().unwrap();
        let origin = st.pos;

        let mut pickups = Vec::new();
        let mut drop_offs = Vec::new();
        let mut go_tos = Vec::new();
        for intention in st.queue.drain(..) {
            match intention.predicate() {
                Predicate::GoPickUp { .. } => pickups.push(intention),
                Predicate::GoDropOff { .. } => drop_offs.push(intention),
                Predicate::GoTo { .. } => go_tos.push(intention),
            }
        }

        let mut scored: Vec<(usize, Intention)> = pickups
            .into_iter()
            .map(|intention| {
                let distance = origin
                    .and_then(|from| path_distance(&map, role, from, intention.predicate().target()))
                    .unwrap_or(usize::MAX);
                (distance, intention)
            })
            .collect();
        scored.sort_by_key(|(distance, _)| *distance);
        let pickups: Vec<Intention> = scored.into_iter().map(|(_, i)| i).collect();

        if self.cfg.dual_agent && st.hand2hand == Behavior::None {
            let parcel_ids = pickups
                .iter()
                .filter_map(|i| match i.predicate() {
                    Predicate::GoPickUp { parcel_id, .. } => Some(parcel_id.clone()),
                    _ => None,
                })
                .collect();
            let _ = self.outbox.send(CoordMessage::MultiPickup { parcel_ids });
        }

        let mut drop_iter = drop_offs.into_iter();
        let first_drop = drop_iter.next();
        let mut go_iter = go_tos.into_iter();
        let first_go = go_iter.next();

        let mut rebuilt = VecDeque::new();
        let mut discarded: Vec<Intention> = drop_iter.chain(go_iter).collect();

        if st.carried_count >= self.cfg.max_carried_parcels {
            // Saturated: everything but the delivery gets dropped.
            discarded.extend(pickups);
            discarded.extend(first_go);
            rebuilt.extend(first_drop);
        } else {
            rebuilt.extend(pickups);
            rebuilt.extend(first_drop);
            rebuilt.extend(first_go);
        }

        for mut intention in discarded {
            intention.stop();
        }
        st.queue = rebuilt;
    }

    /// Head of the queue, once the worker is initialized.
    pub fn pop_ready(&self) -> Option<Intention> {
        self.with(|st| {
            if st.initialized {
                st.queue.pop_front()
            } else {
                None
            }
        })
    }
}

/// The consuming side of the intention queue. Runs until shutdown; yields
/// every iteration so sensor callbacks and message handlers get CPU.
pub async fn run_agent_loop(agent: AgentHandle, ctx: Arc<PlanContext>, shutdown: CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        if let Some(mut intention) = agent.pop_ready() {
            debug!(intention = %intention.predicate(), "achieving");
            let outcome = intention.achieve(&ctx).await;
            match outcome {
                Ok(_) => debug!(intention = %intention.predicate(), "achieved"),
                Err(AgentError::Stopped) => {
                    debug!(intention = %intention.predicate(), "stopped")
                }
                Err(err) => warn!(intention = %intention.predicate(), %err, "intention failed"),
            }
        }
        tokio::task::yield_now().await;
    }
}
