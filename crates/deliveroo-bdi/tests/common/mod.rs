//! Shared harness: worlds built from raw codes, agents wired to a capture
//! channel instead of a real outbox consumer, and a recording game client.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deliveroo_bdi::{AgentHandle, WorkerConfig, WorldState};
use deliveroo_grid::Role;
use deliveroo_proto::{ClientError, CoordMessage, Direction, GameClient};
use tokio::sync::mpsc;

pub fn world_from_codes(role: Role, width: u32, height: u32, codes: &[u8]) -> Arc<WorldState> {
    let world = WorldState::new(role);
    world.install_map(width, height, codes).unwrap();
    world
}

pub fn open_world(role: Role, width: u32, height: u32) -> Arc<WorldState> {
    world_from_codes(role, width, height, &vec![3; (width * height) as usize])
}

pub fn agent_with_outbox(
    config: WorkerConfig,
) -> (AgentHandle, mpsc::UnboundedReceiver<CoordMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AgentHandle::new(Arc::new(config), tx), rx)
}

pub fn drain_outbox(rx: &mut mpsc::UnboundedReceiver<CoordMessage>) -> Vec<CoordMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Game client that records every RPC; results are configurable.
#[derive(Default)]
pub struct RecordingClient {
    pub moves: Mutex<Vec<Direction>>,
    pub pickups: Mutex<u32>,
    pub putdowns: Mutex<u32>,
    pub says: Mutex<Vec<(String, CoordMessage)>>,
    pub refuse_moves: AtomicBool,
    pub refuse_pickup: AtomicBool,
    /// Cancelled on the first move, to model an external stop arriving
    /// mid-execution.
    pub cancel_on_move: Mutex<Option<tokio_util::sync::CancellationToken>>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn move_count(&self) -> usize {
        self.moves.lock().unwrap().len()
    }
}

#[async_trait]
impl GameClient for RecordingClient {
    async fn emit_move(&self, direction: Direction) -> Result<bool, ClientError> {
        self.moves.lock().unwrap().push(direction);
        if let Some(token) = self.cancel_on_move.lock().unwrap().take() {
            token.cancel();
        }
        Ok(!self.refuse_moves.load(Ordering::SeqCst))
    }

    async fn emit_pickup(&self) -> Result<bool, ClientError> {
        *self.pickups.lock().unwrap() += 1;
        Ok(!self.refuse_pickup.load(Ordering::SeqCst))
    }

    async fn emit_putdown(&self) -> Result<bool, ClientError> {
        *self.putdowns.lock().unwrap() += 1;
        Ok(true)
    }

    async fn emit_say(&self, to: &str, message: &CoordMessage) -> Result<(), ClientError> {
        self.says
            .lock()
            .unwrap()
            .push((to.to_string(), message.clone()));
        Ok(())
    }
}
