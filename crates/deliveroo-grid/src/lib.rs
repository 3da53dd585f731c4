//! Spatial belief model for the Deliveroo courier agents.
//!
//! Pure, synchronous data structures: the tiled map with its depot and spawn
//! registries, the sensed parcels and adversary agents, and the A* pathfinder
//! that queries a map snapshot. Concurrency lives one layer up.

#![forbid(unsafe_code)]

pub mod error;
pub mod map;
pub mod parcel;
pub mod path;
pub mod tile;

pub use error::GridError;
pub use map::{Adversary, GridMap, Role};
pub use parcel::Parcel;
pub use path::{find_path, path_distance};
pub use tile::{Pos, Tile, TileKind};
