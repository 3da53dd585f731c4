use deliveroo_grid::Pos;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hand-to-hand role a courier can be ordered into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Default solo behaviour: collect and deliver on your own.
    None,
    /// Collect parcels and leave them on the shared delivery tile.
    Gather,
    /// Ferry parcels from the shared delivery tile to a depot.
    Deliver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryTileStatus {
    Set,
    Error,
}

/// Everything the two couriers say to each other, discriminated by `action`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CoordMessage {
    /// Ordered pickup targets of the sender; the receiver ignores them.
    MultiPickup { parcel_ids: Vec<String> },
    /// Sender's current tile.
    CompanionPosition { x: i32, y: i32 },
    /// Role order from the leader's election (or `none` to stay solo).
    #[serde(rename = "hand2hand")]
    Hand2Hand { behavior: Behavior },
    /// Delivery-tile negotiation: the deliverer proposes with `set`, the
    /// gatherer rejects an unreachable proposal with `error`.
    DeliveryTile {
        status: DeliveryTileStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tile: Option<Pos>,
    },
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode_message(message: &CoordMessage) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode_message(json: &str) -> Result<CoordMessage, WireError> {
    Ok(serde_json::from_str(json)?)
}
