//! Wire surface between the courier core and the game.
//!
//! Defines the sensor events the core consumes, the action surface it drives
//! (`GameClient`), and the JSON coordination messages the two cooperating
//! agents exchange over the per-agent `say` channel. The actual transport
//! (socket client, in-process simulator) lives elsewhere and implements
//! these types.

#![forbid(unsafe_code)]

pub mod client;
pub mod events;
pub mod messages;

use std::time::{SystemTime, UNIX_EPOCH};

pub use client::{ClientError, Direction, GameClient};
pub use events::{AgentSnapshot, ParcelSnapshot, RawWorldConfig, SensorEvent};
pub use messages::{
    decode_message, encode_message, Behavior, CoordMessage, DeliveryTileStatus, WireError,
};

/// Milliseconds since the Unix epoch; the timestamp base for all sensing.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
