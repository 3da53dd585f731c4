//! In-process Deliveroo game world.
//!
//! Implements the same client surface as the network transport, so the core
//! can be driven end-to-end without a server: scripted sensor events, move
//! validation against walls and occupancy, parcel decay, depot scoring, and
//! an in-order lossless `say` channel between registered agents.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deliveroo_grid::Pos;
use deliveroo_proto::{
    now_ms, AgentSnapshot, ClientError, CoordMessage, Direction, GameClient, ParcelSnapshot,
    RawWorldConfig, SensorEvent,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("bad map: {0}")]
    BadMap(String),

    #[error("agent id {0} already registered")]
    DuplicateAgent(String),

    #[error("tile {0} is not walkable")]
    BadSpawnPoint(Pos),
}

struct SimAgent {
    pos: Pos,
    carried: Vec<String>,
    score: i64,
    events: mpsc::UnboundedSender<SensorEvent>,
}

struct SimParcel {
    pos: Pos,
    reward: i64,
    spawned_ms: u64,
    carried_by: Option<String>,
}

struct SimState {
    width: i32,
    height: i32,
    /// Raw tile type codes, row-major.
    codes: Vec<u8>,
    config: RawWorldConfig,
    decay_ms: u64,
    agents: HashMap<String, SimAgent>,
    parcels: HashMap<String, SimParcel>,
}

impl SimState {
    fn idx(&self, pos: Pos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    fn is_walkable(&self, pos: Pos) -> bool {
        self.idx(pos).map(|i| self.codes[i] != 0).unwrap_or(false)
    }

    fn is_depot(&self, pos: Pos) -> bool {
        self.idx(pos).map(|i| self.codes[i] == 2).unwrap_or(false)
    }

    fn occupied(&self, pos: Pos, except: &str) -> bool {
        self.agents
            .iter()
            .any(|(id, agent)| id != except && agent.pos == pos)
    }

    fn observation_distance(&self) -> u32 {
        self.config.parcels_observation_distance
    }

    fn drop_expired(&mut self, now: u64) {
        let decay = self.decay_ms;
        self.parcels.retain(|_, p| {
            p.carried_by.is_some()
                || decay == 0
                || p.reward - ((now.saturating_sub(p.spawned_ms)) / decay) as i64 >= 0
        });
    }

    fn visible_parcels(&self, from: Pos) -> Vec<ParcelSnapshot> {
        let range = self.observation_distance();
        let mut list: Vec<ParcelSnapshot> = self
            .parcels
            .iter()
            .filter(|(_, p)| p.carried_by.is_some() || from.manhattan(p.pos) <= range)
            .map(|(id, p)| ParcelSnapshot {
                id: id.clone(),
                x: p.pos.x,
                y: p.pos.y,
                reward: p.reward,
                carried_by: p.carried_by.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    fn visible_agents(&self, own_id: &str, from: Pos) -> Vec<AgentSnapshot> {
        let range = self.observation_distance();
        let mut list: Vec<AgentSnapshot> = self
            .agents
            .iter()
            .filter(|(id, agent)| *id != own_id && from.manhattan(agent.pos) <= range)
            .map(|(id, agent)| AgentSnapshot {
                id: id.clone(),
                x: agent.pos.x,
                y: agent.pos.y,
                score: agent.score,
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Push fresh parcel and agent sensing to every registered agent.
    fn broadcast_sensing(&mut self) {
        self.drop_expired(now_ms());
        let snapshots: Vec<(String, Pos)> = self
            .agents
            .iter()
            .map(|(id, agent)| (id.clone(), agent.pos))
            .collect();
        for (id, pos) in snapshots {
            let parcels = self.visible_parcels(pos);
            let others = self.visible_agents(&id, pos);
            if let Some(agent) = self.agents.get(&id) {
                let _ = agent.events.send(SensorEvent::Parcels(parcels));
                let _ = agent.events.send(SensorEvent::Agents(others));
            }
        }
    }
}

/// Handle to the simulated world; clone freely.
#[derive(Clone)]
pub struct SimWorld {
    state: Arc<Mutex<SimState>>,
}

impl SimWorld {
    pub fn new(width: u32, height: u32, codes: Vec<u8>) -> Result<Self, SimError> {
        if codes.len() != (width * height) as usize {
            return Err(SimError::BadMap(format!(
                "{} codes for a {width}x{height} map",
                codes.len()
            )));
        }
        if let Some(bad) = codes.iter().find(|c| **c > 5) {
            return Err(SimError::BadMap(format!("unknown tile code {bad}")));
        }
        let config = RawWorldConfig::default();
        let decay_ms = decay_ms_of(&config);
        Ok(Self {
            state: Arc::new(Mutex::new(SimState {
                width: width as i32,
                height: height as i32,
                codes,
                config,
                decay_ms,
                agents: HashMap::new(),
                parcels: HashMap::new(),
            })),
        })
    }

    /// Parse an ASCII map: `#` wall, `S` spawn, `D` depot, `.` floor. The
    /// first text row is the top of the map.
    pub fn from_ascii(art: &str) -> Result<Self, SimError> {
        let rows: Vec<&str> = art
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if rows.is_empty() {
            return Err(SimError::BadMap("empty map".into()));
        }
        let width = rows[0].chars().count();
        if rows.iter().any(|r| r.chars().count() != width) {
            return Err(SimError::BadMap("ragged rows".into()));
        }
        let height = rows.len();

        let mut codes = vec![0u8; width * height];
        for (row_idx, row) in rows.iter().enumerate() {
            let y = height - 1 - row_idx;
            for (x, ch) in row.chars().enumerate() {
                let code = match ch {
                    '#' => 0,
                    'S' => 1,
                    'D' => 2,
                    '.' => 3,
                    other => {
                        return Err(SimError::BadMap(format!("unknown tile char {other:?}")))
                    }
                };
                codes[y * width + x] = code;
            }
        }
        Self::new(width as u32, height as u32, codes)
    }

    pub fn set_config(&self, config: RawWorldConfig) {
        let mut state = self.state.lock().unwrap();
        state.decay_ms = decay_ms_of(&config);
        state.config = config;
    }

    /// Register an agent and hand back its client plus its sensor stream.
    /// The stream starts with the connection handshake: `Connected`,
    /// `Config`, `Map`, `You`, then a first sensing round.
    pub fn register_agent(
        &self,
        id: impl Into<String>,
        pos: Pos,
    ) -> Result<(Arc<SimClient>, mpsc::UnboundedReceiver<SensorEvent>), SimError> {
        let id = id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock().unwrap();
            if state.agents.contains_key(&id) {
                return Err(SimError::DuplicateAgent(id));
            }
            if !state.is_walkable(pos) {
                return Err(SimError::BadSpawnPoint(pos));
            }

            let _ = tx.send(SensorEvent::Connected);
            let _ = tx.send(SensorEvent::Config(state.config.clone()));
            let _ = tx.send(SensorEvent::Map {
                width: state.width as u32,
                height: state.height as u32,
                tiles: state.codes.clone(),
            });
            let _ = tx.send(SensorEvent::You(AgentSnapshot {
                id: id.clone(),
                x: pos.x,
                y: pos.y,
                score: 0,
            }));

            state.agents.insert(
                id.clone(),
                SimAgent {
                    pos,
                    carried: Vec::new(),
                    score: 0,
                    events: tx,
                },
            );
            state.broadcast_sensing();
        }
        Ok((
            Arc::new(SimClient {
                state: self.state.clone(),
                id,
            }),
            rx,
        ))
    }

    pub fn spawn_parcel(&self, id: impl Into<String>, pos: Pos, reward: i64) {
        let mut state = self.state.lock().unwrap();
        state.parcels.insert(
            id.into(),
            SimParcel {
                pos,
                reward,
                spawned_ms: now_ms(),
                carried_by: None,
            },
        );
        state.broadcast_sensing();
    }

    pub fn score(&self, agent_id: &str) -> i64 {
        self.state
            .lock()
            .unwrap()
            .agents
            .get(agent_id)
            .map(|a| a.score)
            .unwrap_or(0)
    }

    pub fn agent_pos(&self, agent_id: &str) -> Option<Pos> {
        self.state
            .lock()
            .unwrap()
            .agents
            .get(agent_id)
            .map(|a| a.pos)
    }

    /// Ids of ground parcels currently on `pos`.
    pub fn parcels_at(&self, pos: Pos) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<String> = state
            .parcels
            .iter()
            .filter(|(_, p)| p.carried_by.is_none() && p.pos == pos)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Re-send sensing to everyone; demos call this on a timer.
    pub fn refresh(&self) {
        self.state.lock().unwrap().broadcast_sensing();
    }

    /// Walkable tiles of the map, for placing agents.
    pub fn walkable_tiles(&self) -> Vec<Pos> {
        let state = self.state.lock().unwrap();
        (0..state.codes.len() as i32)
            .map(|i| Pos::new(i % state.width, i / state.width))
            .filter(|p| state.is_walkable(*p))
            .collect()
    }

    /// Spawn-marked tiles of the map.
    pub fn spawn_tiles(&self) -> Vec<Pos> {
        let state = self.state.lock().unwrap();
        (0..state.codes.len() as i32)
            .map(|i| Pos::new(i % state.width, i / state.width))
            .filter(|p| state.idx(*p).map(|i| state.codes[i] == 1).unwrap_or(false))
            .collect()
    }

    /// Depot tiles of the map.
    pub fn depot_tiles(&self) -> Vec<Pos> {
        let state = self.state.lock().unwrap();
        (0..state.codes.len() as i32)
            .map(|i| Pos::new(i % state.width, i / state.width))
            .filter(|p| state.idx(*p).map(|i| state.codes[i] == 2).unwrap_or(false))
            .collect()
    }

    /// End the match: every agent's sensor stream receives `Disconnected`
    /// and its worker winds down.
    pub fn disconnect_all(&self) {
        let state = self.state.lock().unwrap();
        for agent in state.agents.values() {
            let _ = agent.events.send(SensorEvent::Disconnected);
        }
    }
}

/// Per-agent connection into the simulated world.
pub struct SimClient {
    state: Arc<Mutex<SimState>>,
    id: String,
}

impl SimClient {
    pub fn agent_id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl GameClient for SimClient {
    async fn emit_move(&self, direction: Direction) -> Result<bool, ClientError> {
        let mut state = self.state.lock().unwrap();
        let Some(agent) = state.agents.get(&self.id) else {
            return Err(ClientError::ConnectionLost("agent unregistered".into()));
        };
        let (dx, dy) = direction.delta();
        let target = Pos::new(agent.pos.x + dx, agent.pos.y + dy);
        if !state.is_walkable(target) || state.occupied(target, &self.id) {
            return Ok(false);
        }

        let carried = {
            let agent = state.agents.get_mut(&self.id).unwrap();
            agent.pos = target;
            let _ = agent.events.send(SensorEvent::You(AgentSnapshot {
                id: self.id.clone(),
                x: target.x,
                y: target.y,
                score: agent.score,
            }));
            agent.carried.clone()
        };
        for parcel_id in carried {
            if let Some(parcel) = state.parcels.get_mut(&parcel_id) {
                parcel.pos = target;
            }
        }
        state.broadcast_sensing();
        Ok(true)
    }

    async fn emit_pickup(&self) -> Result<bool, ClientError> {
        let mut state = self.state.lock().unwrap();
        let Some(agent) = state.agents.get(&self.id) else {
            return Err(ClientError::ConnectionLost("agent unregistered".into()));
        };
        let here = agent.pos;
        let picked: Vec<String> = state
            .parcels
            .iter()
            .filter(|(_, p)| p.carried_by.is_none() && p.pos == here)
            .map(|(id, _)| id.clone())
            .collect();
        if picked.is_empty() {
            return Ok(false);
        }
        for id in &picked {
            state.parcels.get_mut(id).unwrap().carried_by = Some(self.id.clone());
        }
        state
            .agents
            .get_mut(&self.id)
            .unwrap()
            .carried
            .extend(picked.iter().cloned());
        debug!(agent = %self.id, count = picked.len(), "picked up");
        state.broadcast_sensing();
        Ok(true)
    }

    async fn emit_putdown(&self) -> Result<bool, ClientError> {
        let mut state = self.state.lock().unwrap();
        let Some(agent) = state.agents.get(&self.id) else {
            return Err(ClientError::ConnectionLost("agent unregistered".into()));
        };
        let here = agent.pos;
        let carried = agent.carried.clone();
        if carried.is_empty() {
            return Ok(false);
        }

        let now = now_ms();
        let decay = state.decay_ms;
        if state.is_depot(here) {
            let mut gained = 0;
            for id in &carried {
                if let Some(parcel) = state.parcels.remove(id) {
                    let decayed = if decay == 0 {
                        parcel.reward
                    } else {
                        parcel.reward - ((now.saturating_sub(parcel.spawned_ms)) / decay) as i64
                    };
                    gained += decayed.max(0);
                }
            }
            let agent = state.agents.get_mut(&self.id).unwrap();
            agent.score += gained;
            agent.carried.clear();
            debug!(agent = %self.id, gained, "delivered");
        } else {
            for id in &carried {
                if let Some(parcel) = state.parcels.get_mut(id) {
                    parcel.carried_by = None;
                    parcel.pos = here;
                }
            }
            state.agents.get_mut(&self.id).unwrap().carried.clear();
            debug!(agent = %self.id, count = carried.len(), "dropped on ground");
        }
        state.broadcast_sensing();
        Ok(true)
    }

    async fn emit_say(&self, to: &str, message: &CoordMessage) -> Result<(), ClientError> {
        // Round-trip through the wire codec so the JSON surface is exercised.
        let encoded = deliveroo_proto::encode_message(message)?;
        let decoded = deliveroo_proto::decode_message(&encoded)?;

        let state = self.state.lock().unwrap();
        let Some(recipient) = state.agents.get(to) else {
            return Err(ClientError::UnknownRecipient(to.to_string()));
        };
        let _ = recipient.events.send(SensorEvent::Msg {
            from: self.id.clone(),
            sender_name: self.id.clone(),
            payload: decoded,
        });
        Ok(())
    }
}

fn decay_ms_of(config: &RawWorldConfig) -> u64 {
    let raw = config.parcel_decading_interval.trim();
    if raw.eq_ignore_ascii_case("infinite") {
        return 0;
    }
    raw.trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<u64>()
        .map(|secs| secs * 1000)
        .unwrap_or(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<SensorEvent>) -> Vec<SensorEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn handshake_order_is_stable() {
        let sim = SimWorld::from_ascii("D.S").unwrap();
        let (_client, mut rx) = sim.register_agent("a1", Pos::new(1, 0)).unwrap();
        let events = drain(&mut rx);
        assert!(matches!(events[0], SensorEvent::Connected));
        assert!(matches!(events[1], SensorEvent::Config(_)));
        assert!(matches!(events[2], SensorEvent::Map { width: 3, .. }));
        assert!(matches!(events[3], SensorEvent::You(_)));
    }

    #[tokio::test]
    async fn walls_and_agents_block_moves() {
        let sim = SimWorld::from_ascii("..#.").unwrap();
        let (a, _rx_a) = sim.register_agent("a1", Pos::new(0, 0)).unwrap();
        let (_b, _rx_b) = sim.register_agent("a2", Pos::new(1, 0)).unwrap();

        // Companion tile.
        assert!(!a.emit_move(Direction::Right).await.unwrap());
        // Map edge.
        assert!(!a.emit_move(Direction::Left).await.unwrap());
        assert!(!a.emit_move(Direction::Down).await.unwrap());
    }

    #[tokio::test]
    async fn depot_putdown_scores() {
        let sim = SimWorld::from_ascii(".D").unwrap();
        let (a, _rx) = sim.register_agent("a1", Pos::new(0, 0)).unwrap();
        sim.spawn_parcel("p1", Pos::new(0, 0), 7);

        assert!(a.emit_pickup().await.unwrap());
        assert!(a.emit_move(Direction::Right).await.unwrap());
        assert!(a.emit_putdown().await.unwrap());
        assert_eq!(sim.score("a1"), 7);
        assert!(sim.parcels_at(Pos::new(1, 0)).is_empty());
    }

    #[tokio::test]
    async fn ground_putdown_leaves_parcels_behind() {
        let sim = SimWorld::from_ascii("...").unwrap();
        let (a, _rx) = sim.register_agent("a1", Pos::new(0, 0)).unwrap();
        sim.spawn_parcel("p1", Pos::new(0, 0), 5);

        assert!(a.emit_pickup().await.unwrap());
        assert!(a.emit_move(Direction::Right).await.unwrap());
        assert!(a.emit_putdown().await.unwrap());
        assert_eq!(sim.score("a1"), 0);
        assert_eq!(sim.parcels_at(Pos::new(1, 0)), vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn say_routes_in_order() {
        let sim = SimWorld::from_ascii("..").unwrap();
        let (a, _rx_a) = sim.register_agent("a1", Pos::new(0, 0)).unwrap();
        let (_b, mut rx_b) = sim.register_agent("a2", Pos::new(1, 0)).unwrap();
        drain(&mut rx_b);

        a.emit_say("a2", &CoordMessage::CompanionPosition { x: 0, y: 0 })
            .await
            .unwrap();
        a.emit_say(
            "a2",
            &CoordMessage::MultiPickup {
                parcel_ids: vec!["p1".into()],
            },
        )
        .await
        .unwrap();

        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 2);
        assert!(
            matches!(&events[0], SensorEvent::Msg { payload: CoordMessage::CompanionPosition { .. }, .. })
        );
        assert!(
            matches!(&events[1], SensorEvent::Msg { payload: CoordMessage::MultiPickup { .. }, .. })
        );
        assert!(a.emit_say("ghost", &CoordMessage::CompanionPosition { x: 0, y: 0 })
            .await
            .is_err());
    }
}
