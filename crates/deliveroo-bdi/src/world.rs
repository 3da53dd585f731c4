use std::sync::{Arc, RwLock};

use deliveroo_grid::{GridError, GridMap, Pos, Role, Tile};
use deliveroo_proto::RawWorldConfig;
use tokio::sync::watch;
use tracing::warn;

/// Parsed match constants, with the raw string values already digested.
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
    /// Parcel reward decay interval in milliseconds; 0 means no decay.
    pub decay_ms: u64,
    pub observation_distance: u32,
    pub reward_avg: i64,
    pub reward_variance: i64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            decay_ms: 1000,
            observation_distance: 5,
            reward_avg: 30,
            reward_variance: 10,
        }
    }
}

impl WorldConfig {
    pub fn from_raw(raw: &RawWorldConfig) -> Self {
        Self {
            decay_ms: parse_decay_ms(&raw.parcel_decading_interval),
            observation_distance: raw.parcels_observation_distance,
            reward_avg: raw.parcel_reward_avg,
            reward_variance: raw.parcel_reward_variance,
        }
    }
}

/// Decay interval strings arrive as seconds with an optional trailing unit
/// (`"1s"`, `"2"`); `"infinite"` disables decay.
fn parse_decay_ms(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("infinite") {
        return 0;
    }
    let digits = trimmed.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    match digits.parse::<u64>() {
        Ok(secs) => secs * 1000,
        Err(_) => {
            warn!(value = raw, "unparsable decay interval, assuming 1s");
            1000
        }
    }
}

/// The shared belief base of one worker.
///
/// The observer is the only writer; the agent loop, the plans and the option
/// generator read. Readers take owned snapshots under a short read lock and
/// never hold a guard across an await.
pub struct WorldState {
    role: Role,
    map: RwLock<Option<GridMap>>,
    config: RwLock<WorldConfig>,
    populated_tx: watch::Sender<bool>,
    populated_rx: watch::Receiver<bool>,
}

impl WorldState {
    pub fn new(role: Role) -> Arc<Self> {
        let (populated_tx, populated_rx) = watch::channel(false);
        Arc::new(Self {
            role,
            map: RwLock::new(None),
            config: RwLock::new(WorldConfig::default()),
            populated_tx,
            populated_rx,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_config(&self, raw: &RawWorldConfig) {
        *self.config.write().unwrap() = WorldConfig::from_raw(raw);
    }

    pub fn config(&self) -> WorldConfig {
        *self.config.read().unwrap()
    }

    /// Install the initial map. Flips the populated flag that the async
    /// getters wait on.
    pub fn install_map(&self, width: u32, height: u32, codes: &[u8]) -> Result<(), GridError> {
        let map = GridMap::from_codes(width, height, codes)?;
        *self.map.write().unwrap() = Some(map);
        let _ = self.populated_tx.send(true);
        Ok(())
    }

    pub fn is_populated(&self) -> bool {
        *self.populated_rx.borrow()
    }

    /// Resolve once the map has been installed at least once.
    pub async fn wait_populated(&self) {
        let mut rx = self.populated_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Owned copy of the current belief map, if populated.
    pub fn snapshot(&self) -> Option<GridMap> {
        self.map.read().unwrap().clone()
    }

    /// Owned copy of the belief map, waiting for population first.
    pub async fn snapshot_wait(&self) -> GridMap {
        loop {
            self.wait_populated().await;
            if let Some(map) = self.snapshot() {
                return map;
            }
        }
    }

    /// Run a read query against the map without cloning it.
    pub fn with_map<R>(&self, f: impl FnOnce(&GridMap) -> R) -> Option<R> {
        self.map.read().unwrap().as_ref().map(f)
    }

    /// Run an update against the map. No-op before population.
    pub fn with_map_mut<R>(&self, f: impl FnOnce(&mut GridMap) -> R) -> Option<R> {
        self.map.write().unwrap().as_mut().map(f)
    }

    pub async fn walkable_tiles(&self, with_companion: bool) -> Vec<Tile> {
        let map = self.snapshot_wait().await;
        map.walkable_tiles(self.role, with_companion)
    }

    pub async fn depot_tiles(&self) -> Vec<Pos> {
        let map = self.snapshot_wait().await;
        map.depot_tiles().to_vec()
    }

    pub async fn spawn_tiles(&self) -> Vec<Pos> {
        let map = self.snapshot_wait().await;
        map.spawn_tiles().to_vec()
    }
}
