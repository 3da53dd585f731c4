use serde::{Deserialize, Serialize};

use crate::Pos;

/// A parcel the agent believes to be lying on the ground.
///
/// Parcels carried by some agent are never stored in the map; the observer
/// filters them out before they reach [`GridMap::update_parcels`][crate::GridMap::update_parcels].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: String,
    pub pos: Pos,
    /// Reward at sensing time. The live value decays by one per decay interval.
    pub reward: i64,
    /// Sensing timestamp, milliseconds.
    pub timestamp_ms: u64,
}

impl Parcel {
    pub fn new(id: impl Into<String>, pos: Pos, reward: i64, timestamp_ms: u64) -> Self {
        Self {
            id: id.into(),
            pos,
            reward,
            timestamp_ms,
        }
    }

    /// Reward the parcel is worth at `now_ms`, given the server decay interval.
    pub fn current_reward(&self, now_ms: u64, decay_ms: u64) -> i64 {
        if decay_ms == 0 {
            return self.reward;
        }
        let elapsed = now_ms.saturating_sub(self.timestamp_ms);
        self.reward - (elapsed / decay_ms) as i64
    }

    /// A parcel whose decayed reward dropped below zero no longer exists on
    /// the server and must be forgotten.
    pub fn is_expired(&self, now_ms: u64, decay_ms: u64) -> bool {
        self.current_reward(now_ms, decay_ms) < 0
    }
}
