use std::sync::Arc;

use deliveroo_grid::{Adversary, Parcel, Pos};
use deliveroo_proto::{now_ms, AgentSnapshot, CoordMessage, ParcelSnapshot, SensorEvent};
use tracing::{debug, info};

use crate::agent::AgentHandle;
use crate::coordination::Coordinator;
use crate::error::AgentError;
use crate::options::OptionGenerator;
use crate::world::WorldState;

/// Folds raw sensor events into the belief base and kicks the option
/// generator after every sensing round. One instance per worker; events are
/// handled strictly in arrival order.
pub struct Observer {
    world: Arc<WorldState>,
    agent: AgentHandle,
    coordinator: Coordinator,
    options: Arc<OptionGenerator>,
}

impl Observer {
    pub fn new(world: Arc<WorldState>, agent: AgentHandle, options: Arc<OptionGenerator>) -> Self {
        let coordinator = Coordinator::new(world.clone(), agent.clone());
        Self {
            world,
            agent,
            coordinator,
            options,
        }
    }

    pub fn handle_event(&self, event: SensorEvent) -> Result<(), AgentError> {
        match event {
            SensorEvent::Connected => info!("connected"),
            SensorEvent::Disconnected => info!("disconnected"),
            SensorEvent::Config(raw) => {
                self.world.set_config(&raw);
                debug!(decay = %raw.parcel_decading_interval, "world config received");
            }
            SensorEvent::Map {
                width,
                height,
                tiles,
            } => {
                self.world.install_map(width, height, &tiles)?;
                info!(width, height, "map installed");
            }
            SensorEvent::You(snapshot) => self.handle_you(snapshot),
            SensorEvent::Parcels(list) => {
                self.handle_parcels(list);
                self.options.generate();
            }
            SensorEvent::Agents(list) => {
                self.handle_agents(list);
                self.options.generate();
            }
            SensorEvent::Msg { from, payload, .. } => {
                self.coordinator.handle_message(&from, payload)?;
            }
        }
        Ok(())
    }

    fn handle_you(&self, snapshot: AgentSnapshot) {
        let pos = Pos::new(snapshot.x, snapshot.y);
        let cfg = self.agent.config();
        let changed = self.agent.set_position(pos);
        self.world
            .with_map_mut(|map| map.set_teammate_pos(cfg.role, pos));
        if changed && cfg.dual_agent {
            self.agent.send_to_companion(CoordMessage::CompanionPosition {
                x: pos.x,
                y: pos.y,
            });
        }
    }

    fn handle_parcels(&self, list: Vec<ParcelSnapshot>) {
        let now = now_ms();
        let decay = self.world.config().decay_ms;
        let parcels: Vec<Parcel> = list
            .into_iter()
            .filter(|p| p.carried_by.is_none())
            .map(|p| Parcel::new(p.id, Pos::new(p.x, p.y), p.reward, now))
            .collect();
        self.world
            .with_map_mut(|map| map.update_parcels(parcels, now, decay));
    }

    fn handle_agents(&self, list: Vec<AgentSnapshot>) {
        let now = now_ms();
        let cfg = self.agent.config();
        let mut adversaries = Vec::new();
        for snapshot in list {
            let pos = Pos::new(snapshot.x, snapshot.y);
            if snapshot.id == cfg.agent_id {
                self.agent.set_position(pos);
                self.world
                    .with_map_mut(|map| map.set_teammate_pos(cfg.role, pos));
            } else if cfg.companion_id.as_deref() == Some(snapshot.id.as_str()) {
                self.world
                    .with_map_mut(|map| map.set_teammate_pos(cfg.role.companion(), pos));
            } else {
                adversaries.push(Adversary {
                    id: snapshot.id,
                    pos,
                    timestamp_ms: now,
                });
            }
        }
        if !adversaries.is_empty() {
            self.world
                .with_map_mut(|map| map.update_adversaries(adversaries));
        }
    }
}
