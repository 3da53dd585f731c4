use std::time::Duration;

use deliveroo_grid::Role;

/// Per-worker configuration record.
///
/// Process startup (env vars, token decoding) happens outside the core; by
/// the time a worker runs, everything it needs is in here.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Our agent id, as the game server knows it.
    pub agent_id: String,
    pub role: Role,
    /// Two cooperating workers instead of one.
    pub dual_agent: bool,
    /// The companion's agent id; required in dual mode.
    pub companion_id: Option<String>,
    /// Floor for how often beliefs are re-examined when no sense event fires.
    pub option_generation_interval: Duration,
    /// Carry saturation: at this many parcels the queue collapses to
    /// drop-offs only.
    pub max_carried_parcels: u32,
    /// Search radius for the random repositioning move, in tiles.
    pub max_random_move_distance: u32,
    /// How many times the deliverer searches for a common delivery tile
    /// before giving up.
    pub max_retry_common_delivery: u32,
    /// Seed for the uniform random spawn-tile choice.
    pub rng_seed: u64,
}

impl WorkerConfig {
    pub fn new(agent_id: impl Into<String>, role: Role) -> Self {
        Self {
            agent_id: agent_id.into(),
            role,
            dual_agent: false,
            companion_id: None,
            option_generation_interval: Duration::from_millis(200),
            max_carried_parcels: 4,
            max_random_move_distance: 5,
            max_retry_common_delivery: 10,
            rng_seed: 0,
        }
    }

    pub fn with_companion(mut self, companion_id: impl Into<String>) -> Self {
        self.dual_agent = true;
        self.companion_id = Some(companion_id.into());
        self
    }
}
