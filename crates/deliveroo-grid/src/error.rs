use thiserror::Error;

use crate::Pos;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Raw map payloads may only carry codes 0..=5; anything else means the
    /// server and client disagree about the protocol version.
    #[error("unknown tile type code {0}")]
    UnknownTileCode(u8),

    #[error("tile {0} outside the {1}x{2} map")]
    OutOfBounds(Pos, i32, i32),

    #[error("tile payload has {got} entries, expected {expected}")]
    BadDimensions { got: usize, expected: usize },
}
