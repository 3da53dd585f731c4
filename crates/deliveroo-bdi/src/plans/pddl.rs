//! Symbolic drop-in for the route follower: renders a PDDL problem from the
//! map belief set, hands it to an external solver, and follows the parsed
//! steps. Selected by configuration instead of [`GoTo`][super::GoTo].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use deliveroo_grid::{GridMap, Pos, Role};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ensure_not_stopped, GoDropOff, GoPickUp, GoTo, Plan, PlanContext, PlanLibrary};
use crate::error::PlanError;
use crate::intention::Predicate;

pub const DOMAIN: &str = "\
(define (domain deliveroo)
  (:requirements :strips)
  (:predicates
    (on_tile ?t)
    (above ?a ?b) (below ?a ?b) (left ?a ?b) (right ?a ?b))
  (:action move-up
    :parameters (?from ?to)
    :precondition (and (on_tile ?from) (above ?to ?from))
    :effect (and (on_tile ?to) (not (on_tile ?from))))
  (:action move-down
    :parameters (?from ?to)
    :precondition (and (on_tile ?from) (below ?to ?from))
    :effect (and (on_tile ?to) (not (on_tile ?from))))
  (:action move-left
    :parameters (?from ?to)
    :precondition (and (on_tile ?from) (left ?to ?from))
    :effect (and (on_tile ?to) (not (on_tile ?from))))
  (:action move-right
    :parameters (?from ?to)
    :precondition (and (on_tile ?from) (right ?to ?from))
    :effect (and (on_tile ?to) (not (on_tile ?from)))))
";

#[derive(Clone, Debug)]
pub struct PddlConfig {
    /// Solver executable; invoked as `<solver> <domain-file> <problem-file>`
    /// and expected to print one plan step per line.
    pub solver_cmd: PathBuf,
    /// Directory to keep the generated files in; a temp dir otherwise.
    pub dump_dir: Option<PathBuf>,
}

/// Symbolic variant of the route follower.
pub struct GoToPddl {
    config: PddlConfig,
}

impl GoToPddl {
    pub fn new(config: PddlConfig) -> Self {
        Self { config }
    }

    pub fn render_problem(map: &GridMap, role: Role, from: Pos, to: Pos) -> String {
        let mut objects = String::new();
        for tile in map.walkable_tiles(role, false) {
            objects.push_str(&format!(" tile{}_{}", tile.pos.x, tile.pos.y));
        }

        let mut init = String::new();
        for fact in map.directional_facts(role) {
            init.push_str(&format!("    ({fact})\n"));
        }
        init.push_str(&format!("    (on_tile tile{}_{})\n", from.x, from.y));

        format!(
            "(define (problem deliveroo-route)\n  (:domain deliveroo)\n  (:objects{objects})\n  (:init\n{init}  )\n  (:goal (on_tile tile{}_{})))\n",
            to.x, to.y
        )
    }

    /// Pull the destination tile out of each solver step line. Steps look
    /// like `(MOVE-RIGHT TILE0_0 TILE1_0)`; the last tile argument is where
    /// the step lands.
    pub fn parse_plan(output: &str) -> Vec<Pos> {
        let mut path = Vec::new();
        for line in output.lines() {
            let destination = line
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .filter_map(parse_tile_token)
                .last();
            if let Some(pos) = destination {
                path.push(pos);
            }
        }
        path
    }

    async fn solve(&self, problem: &str) -> Result<Vec<Pos>, PlanError> {
        let dir = self
            .config
            .dump_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let domain_path = dir.join("deliveroo-domain.pddl");
        let problem_path = dir.join("deliveroo-problem.pddl");
        tokio::fs::write(&domain_path, DOMAIN)
            .await
            .map_err(|e| PlanError::Client(format!("write domain: {e}")))?;
        tokio::fs::write(&problem_path, problem)
            .await
            .map_err(|e| PlanError::Client(format!("write problem: {e}")))?;

        let output = tokio::process::Command::new(&self.config.solver_cmd)
            .arg(&domain_path)
            .arg(&problem_path)
            .output()
            .await
            .map_err(|e| PlanError::Client(format!("solver: {e}")))?;
        if !output.status.success() {
            return Err(PlanError::Client(format!(
                "solver exited with {}",
                output.status
            )));
        }
        Ok(Self::parse_plan(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_tile_token(token: &str) -> Option<Pos> {
    let rest = token
        .strip_prefix("tile")
        .or_else(|| token.strip_prefix("TILE"))?;
    let (x, y) = rest.split_once('_')?;
    Some(Pos::new(x.parse().ok()?, y.parse().ok()?))
}

#[async_trait]
impl Plan for GoToPddl {
    fn name(&self) -> &'static str {
        "go_to_pddl"
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
        ensure_not_stopped(token)?;
        let from = ctx.agent.current_position().await;
        if from == target {
            return Ok(true);
        }

        let map = ctx.world.snapshot_wait().await;
        let problem = Self::render_problem(&map, ctx.world.role(), from, target);
        let path = self.solve(&problem).await?;
        if path.is_empty() {
            return Err(PlanError::NoPathFound { from, to: target });
        }
        debug!(steps = path.len(), %target, "following symbolic plan");

        for step in path {
            ensure_not_stopped(token)?;
            let here = ctx.agent.current_position().await;
            if here == step {
                continue;
            }
            let direction = GoTo::step_direction(here, step);
            if !ctx.client.emit_move(direction).await? {
                // Fail soft: let the option generator re-propose.
                warn!(%step, "symbolic route blocked, giving up");
                return Ok(false);
            }
            ctx.agent.set_position(step);
        }
        Ok(true)
    }
}

/// Plan library with the symbolic router in place of the A* one.
pub fn pddl_library(config: PddlConfig) -> PlanLibrary {
    let plans: Vec<Arc<dyn Plan>> = vec![
        Arc::new(GoPickUp),
        Arc::new(GoDropOff),
        Arc::new(GoToPddl::new(config)),
    ];
    Arc::new(plans)
}
