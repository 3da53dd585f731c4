use core::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CoordMessage, WireError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Tile delta of one step in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("unknown recipient {0}")]
    UnknownRecipient(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Action surface of the game connection.
///
/// Implemented by the network transport in production and by the in-process
/// simulator in tests; the core only ever sees this trait. All calls resolve
/// once the server acknowledged (or rejected) the action.
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Step one tile. `false` means the server refused the move (blocked
    /// tile, desync); the caller retries or replans.
    async fn emit_move(&self, direction: Direction) -> Result<bool, ClientError>;

    /// Pick up every parcel on the current tile.
    async fn emit_pickup(&self) -> Result<bool, ClientError>;

    /// Put down every carried parcel on the current tile.
    async fn emit_putdown(&self) -> Result<bool, ClientError>;

    /// Send a coordination message to another agent. Delivery is in-order
    /// and lossless for connected recipients.
    async fn emit_say(&self, to: &str, message: &CoordMessage) -> Result<(), ClientError>;
}
