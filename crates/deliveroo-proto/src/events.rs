use serde::{Deserialize, Serialize};

use crate::CoordMessage;

/// One observed agent, ours or not; the observer decides which.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub score: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParcelSnapshot {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub reward: i64,
    #[serde(default)]
    pub carried_by: Option<String>,
}

/// Server match configuration, verbatim. Values arrive stringly typed
/// (`"1s"`); the world-state observer parses what the core needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct RawWorldConfig {
    pub parcel_decading_interval: String,
    pub parcels_observation_distance: u32,
    pub parcel_reward_avg: i64,
    pub parcel_reward_variance: i64,
}

impl Default for RawWorldConfig {
    fn default() -> Self {
        Self {
            parcel_decading_interval: "1s".to_string(),
            parcels_observation_distance: 5,
            parcel_reward_avg: 30,
            parcel_reward_variance: 10,
        }
    }
}

/// Everything the game pushes at a courier, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorEvent {
    Connected,
    Disconnected,
    Config(RawWorldConfig),
    Map {
        width: u32,
        height: u32,
        /// Row-major tile type codes, `tiles[y * width + x]`.
        tiles: Vec<u8>,
    },
    You(AgentSnapshot),
    Parcels(Vec<ParcelSnapshot>),
    Agents(Vec<AgentSnapshot>),
    Msg {
        from: String,
        sender_name: String,
        payload: CoordMessage,
    },
}
