//! Deliveroo courier demo runner.
//!
//! Reads the worker configuration record from flags and environment
//! variables, builds the in-process game world, and runs one courier (or the
//! two-courier deployment) against it for a fixed duration. The network
//! transport to a real game server implements the same `GameClient` trait
//! out of tree and reuses the same configuration record.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

use deliveroo_bdi::{run_worker, WorkerConfig};
use deliveroo_grid::{Pos, Role};
use deliveroo_proto::RawWorldConfig;
use deliveroo_sim::SimWorld;

/// Open field with parcels and a central depot; both couriers can do
/// everything alone.
const ARENA: &str = "\
S.....S
.......
...D...
.......
S.....S
";

/// The follower's half holds the depot, the leader's half the spawns; the
/// one-tile corridor at `(3,2)` is blocked by the follower's starting tile,
/// so the leader cannot reach the depot and the pair relays hand-to-hand.
const CORRIDOR: &str = "\
S..#...
S..#...
S.....D
S..#...
S..#...
";

#[derive(Parser)]
#[command(name = "deliveroo", about = "Deliveroo courier agents", version)]
struct Cli {
    /// Built-in map name (`arena`, `corridor`) or a path to an ASCII map
    /// file (`#` wall, `S` spawn, `D` depot, `.` floor).
    #[arg(long, default_value = "arena")]
    map: String,

    /// Run the two-courier deployment.
    #[arg(long, env = "DUAL_AGENT")]
    dual: bool,

    /// Game server URL; only meaningful to the network transport.
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Leader credentials; only meaningful to the network transport.
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Follower credentials, required with --dual on a real server.
    #[arg(long, env = "TOKEN_2", hide_env_values = true)]
    token_2: Option<String>,

    #[arg(long, env = "OPTION_GENERATION_INTERVAL", default_value_t = 200)]
    option_generation_interval_ms: u64,

    #[arg(long, env = "MAX_CARRIED_PARCELS", default_value_t = 4)]
    max_carried_parcels: u32,

    #[arg(long, env = "MAX_DISTANCE_FOR_RANDOM_MOVE", default_value_t = 5)]
    max_distance_for_random_move: u32,

    #[arg(long, env = "MAX_RETRY_COMMON_DELIVERY", default_value_t = 10)]
    max_retry_common_delivery: u32,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Seconds to run before reporting scores.
    #[arg(long, default_value_t = 15)]
    run_secs: u64,

    /// Seconds between parcel spawns in the demo world.
    #[arg(long, default_value_t = 2)]
    spawn_secs: u64,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Cli {
    fn worker_config(&self, agent_id: &str, role: Role, companion: Option<&str>) -> WorkerConfig {
        let mut config = WorkerConfig::new(agent_id, role);
        if let Some(companion) = companion {
            config = config.with_companion(companion);
        }
        config.option_generation_interval =
            Duration::from_millis(self.option_generation_interval_ms);
        config.max_carried_parcels = self.max_carried_parcels;
        config.max_random_move_distance = self.max_distance_for_random_move;
        config.max_retry_common_delivery = self.max_retry_common_delivery;
        config.rng_seed = self.seed;
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::new(cli.log_level.clone()))
        .with_target(false)
        .init();

    if cli.host.is_some() {
        tracing::warn!("HOST is set but this binary drives the built-in simulator only");
    }
    if cli.dual && cli.token.is_some() && cli.token_2.is_none() {
        bail!("TOKEN_2 is required when DUAL_AGENT is set");
    }

    let (art, fixed_starts) = match cli.map.as_str() {
        "arena" => (ARENA.to_string(), None),
        // The follower must start on the corridor chokepoint.
        "corridor" => (CORRIDOR.to_string(), Some((Pos::new(0, 2), Pos::new(4, 2)))),
        path => (
            std::fs::read_to_string(path)
                .with_context(|| format!("reading map file {path}"))?,
            None,
        ),
    };
    let sim = SimWorld::from_ascii(&art).map_err(|e| anyhow::anyhow!(e))?;
    sim.set_config(RawWorldConfig::default());

    let spawns = sim.spawn_tiles();
    let depots = sim.depot_tiles();
    let walkable = sim.walkable_tiles();
    if walkable.is_empty() {
        bail!("map has no walkable tiles");
    }

    let (leader_start, follower_start) = fixed_starts.unwrap_or_else(|| {
        let leader = spawns.first().or_else(|| walkable.first()).copied().unwrap();
        let follower = nearest_to(&walkable, depots.first().copied(), leader);
        (leader, follower)
    });

    let mut workers = Vec::new();
    if cli.dual {
        workers.push(spawn_worker(
            &sim,
            cli.worker_config("leader", Role::Leader, Some("follower")),
            leader_start,
        )?);
        workers.push(spawn_worker(
            &sim,
            cli.worker_config("follower", Role::Follower, Some("leader")),
            follower_start,
        )?);
    } else {
        workers.push(spawn_worker(
            &sim,
            cli.worker_config("leader", Role::Leader, None),
            leader_start,
        )?);
    }

    // Feed the demo world with parcels until the clock runs out.
    let config = RawWorldConfig::default();
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let deadline = Instant::now() + Duration::from_secs(cli.run_secs);
    let mut next_parcel = 0u64;
    while Instant::now() < deadline {
        if let Some(spawn) = spawns.choose(&mut rng).or_else(|| walkable.choose(&mut rng)) {
            let jitter = rng.gen_range(-config.parcel_reward_variance..=config.parcel_reward_variance);
            let reward = (config.parcel_reward_avg + jitter).max(1);
            sim.spawn_parcel(format!("p{next_parcel}"), *spawn, reward);
            next_parcel += 1;
        }
        std::thread::sleep(Duration::from_secs(cli.spawn_secs.max(1)));
    }

    sim.disconnect_all();
    let mut failed = false;
    for (id, handle) in workers {
        match handle.join() {
            Ok(Ok(())) => tracing::info!(agent = %id, score = sim.score(&id), "finished"),
            Ok(Err(err)) => {
                tracing::error!(agent = %id, %err, "worker failed");
                failed = true;
            }
            Err(_) => {
                tracing::error!(agent = %id, "worker panicked");
                failed = true;
            }
        }
    }

    println!("total score: {}", sim.score("leader") + sim.score("follower"));
    if failed {
        bail!("a worker terminated abnormally");
    }
    Ok(())
}

type WorkerHandle = (
    String,
    std::thread::JoinHandle<Result<(), deliveroo_bdi::AgentError>>,
);

/// One courier on its own thread with a current-thread runtime, preserving
/// the single-owner cooperative scheduling model.
fn spawn_worker(sim: &SimWorld, config: WorkerConfig, start: Pos) -> Result<WorkerHandle> {
    let id = config.agent_id.clone();
    let (client, events) = sim
        .register_agent(&id, start)
        .map_err(|e| anyhow::anyhow!(e))?;
    let handle = std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("worker runtime");
        runtime.block_on(run_worker(client, events, config))
    });
    Ok((id, handle))
}

/// Walkable tile closest to `target` (straight-line), used to drop the
/// follower near the depot side of the map.
fn nearest_to(walkable: &[Pos], target: Option<Pos>, fallback: Pos) -> Pos {
    let Some(target) = target else {
        return fallback;
    };
    walkable
        .iter()
        .copied()
        .min_by(|a, b| {
            a.euclidean(target)
                .partial_cmp(&b.euclidean(target))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(fallback)
}
