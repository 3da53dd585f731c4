use core::fmt;

use serde::{Deserialize, Serialize};

use crate::GridError;

/// Grid coordinate. `(0, 0)` is the bottom-left corner; `up` increases `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn euclidean(self, other: Self) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_adjacent(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Wall,
    Spawn,
    Depot,
    Other,
}

impl TileKind {
    /// Decode a raw tile type code from the server map payload.
    ///
    /// Codes 3, 4 and 5 are all plain walkable floor; they differ only in how
    /// the official client renders them.
    pub fn from_code(code: u8) -> Result<Self, GridError> {
        match code {
            0 => Ok(TileKind::Wall),
            1 => Ok(TileKind::Spawn),
            2 => Ok(TileKind::Depot),
            3 | 4 | 5 => Ok(TileKind::Other),
            other => Err(GridError::UnknownTileCode(other)),
        }
    }

    pub fn is_walkable(self) -> bool {
        !matches!(self, TileKind::Wall)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub pos: Pos,
    pub kind: TileKind,
}

impl Tile {
    pub const fn new(pos: Pos, kind: TileKind) -> Self {
        Self { pos, kind }
    }
}
