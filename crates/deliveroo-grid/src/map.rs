use serde::{Deserialize, Serialize};

use crate::{GridError, Parcel, Pos, Tile, TileKind};

/// Which of the two cooperating couriers this worker is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    pub fn companion(self) -> Role {
        match self {
            Role::Leader => Role::Follower,
            Role::Follower => Role::Leader,
        }
    }
}

/// An agent that is not us and not our companion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Adversary {
    pub id: String,
    pub pos: Pos,
    pub timestamp_ms: u64,
}

/// The authoritative spatial belief: tiles plus everything sensed on them.
///
/// Tiles are stored row-major (`y * width + x`). The depot and spawn
/// registries are kept in sync with the tile kinds so the option generator
/// never has to scan the whole grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    depot_tiles: Vec<Pos>,
    spawn_tiles: Vec<Pos>,
    parcels: Vec<Parcel>,
    adversaries: Vec<Adversary>,
    leader_pos: Option<Pos>,
    follower_pos: Option<Pos>,
}

impl GridMap {
    /// Build the map from the raw server payload (row-major tile type codes).
    ///
    /// An unknown code is a hard error: the whole belief base would be
    /// untrustworthy, so the worker must not start.
    pub fn from_codes(width: u32, height: u32, codes: &[u8]) -> Result<Self, GridError> {
        let expected = (width as usize) * (height as usize);
        if codes.len() != expected {
            return Err(GridError::BadDimensions {
                got: codes.len(),
                expected,
            });
        }

        let mut tiles = Vec::with_capacity(expected);
        let mut depot_tiles = Vec::new();
        let mut spawn_tiles = Vec::new();
        for (i, &code) in codes.iter().enumerate() {
            let pos = Pos::new((i as i32) % (width as i32), (i as i32) / (width as i32));
            let kind = TileKind::from_code(code)?;
            match kind {
                TileKind::Depot => depot_tiles.push(pos),
                TileKind::Spawn => spawn_tiles.push(pos),
                _ => {}
            }
            tiles.push(Tile::new(pos, kind));
        }

        Ok(Self {
            width: width as i32,
            height: height as i32,
            tiles,
            depot_tiles,
            spawn_tiles,
            parcels: Vec::new(),
            adversaries: Vec::new(),
            leader_pos: None,
            follower_pos: None,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub(crate) fn idx(&self, pos: Pos) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: Pos) -> Option<Tile> {
        self.idx(pos).map(|i| self.tiles[i])
    }

    /// Replace a tile in place, keeping the depot/spawn registries coherent.
    pub fn update_tile(&mut self, tile: Tile) -> Result<(), GridError> {
        let Some(i) = self.idx(tile.pos) else {
            return Err(GridError::OutOfBounds(tile.pos, self.width, self.height));
        };

        let old = self.tiles[i];
        if old.kind != tile.kind {
            match old.kind {
                TileKind::Depot => self.depot_tiles.retain(|p| *p != tile.pos),
                TileKind::Spawn => self.spawn_tiles.retain(|p| *p != tile.pos),
                _ => {}
            }
            match tile.kind {
                TileKind::Depot => self.depot_tiles.push(tile.pos),
                TileKind::Spawn => self.spawn_tiles.push(tile.pos),
                _ => {}
            }
        }
        self.tiles[i] = tile;
        Ok(())
    }

    pub fn depot_tiles(&self) -> &[Pos] {
        &self.depot_tiles
    }

    pub fn spawn_tiles(&self) -> &[Pos] {
        &self.spawn_tiles
    }

    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    pub fn adversaries(&self) -> &[Adversary] {
        &self.adversaries
    }

    /// Merge a fresh parcel sensing into the belief: expired parcels are
    /// dropped first, then each new observation upserts by id, newer
    /// timestamp winning.
    pub fn update_parcels(&mut self, new_parcels: Vec<Parcel>, now_ms: u64, decay_ms: u64) {
        self.parcels.retain(|p| !p.is_expired(now_ms, decay_ms));
        for parcel in new_parcels {
            if parcel.is_expired(now_ms, decay_ms) {
                continue;
            }
            match self.parcels.iter_mut().find(|p| p.id == parcel.id) {
                Some(known) => {
                    if parcel.timestamp_ms >= known.timestamp_ms {
                        *known = parcel;
                    }
                }
                None => self.parcels.push(parcel),
            }
        }
    }

    /// Upsert adversary observations by id, newer timestamp winning.
    pub fn update_adversaries(&mut self, observed: Vec<Adversary>) {
        for adv in observed {
            match self.adversaries.iter_mut().find(|a| a.id == adv.id) {
                Some(known) => {
                    if adv.timestamp_ms >= known.timestamp_ms {
                        *known = adv;
                    }
                }
                None => self.adversaries.push(adv),
            }
        }
    }

    pub fn parcel_picked_up(&mut self, id: &str) {
        self.parcels.retain(|p| p.id != id);
    }

    pub fn set_teammate_pos(&mut self, role: Role, pos: Pos) {
        match role {
            Role::Leader => self.leader_pos = Some(pos),
            Role::Follower => self.follower_pos = Some(pos),
        }
    }

    pub fn teammate_pos(&self, role: Role) -> Option<Pos> {
        match role {
            Role::Leader => self.leader_pos,
            Role::Follower => self.follower_pos,
        }
    }

    pub fn companion_pos(&self, own_role: Role) -> Option<Pos> {
        self.teammate_pos(own_role.companion())
    }

    /// A tile the agent may step onto under current perception.
    ///
    /// `with_companion` opts in to treating the companion's tile as free; the
    /// default for path queries is to route around it.
    pub fn is_walkable(&self, pos: Pos, own_role: Role, with_companion: bool) -> bool {
        let Some(tile) = self.tile(pos) else {
            return false;
        };
        if !tile.kind.is_walkable() {
            return false;
        }
        if self.adversaries.iter().any(|a| a.pos == pos) {
            return false;
        }
        if !with_companion && self.companion_pos(own_role) == Some(pos) {
            return false;
        }
        true
    }

    pub fn walkable_tiles(&self, own_role: Role, with_companion: bool) -> Vec<Tile> {
        self.tiles
            .iter()
            .copied()
            .filter(|t| self.is_walkable(t.pos, own_role, with_companion))
            .collect()
    }

    /// 4-connected in-bounds neighbours.
    pub fn neighbors(&self, pos: Pos) -> Vec<Tile> {
        // Fixed order for determinism: up, right, down, left.
        [
            Pos::new(pos.x, pos.y + 1),
            Pos::new(pos.x + 1, pos.y),
            Pos::new(pos.x, pos.y - 1),
            Pos::new(pos.x - 1, pos.y),
        ]
        .into_iter()
        .filter_map(|p| self.tile(p))
        .collect()
    }

    /// Neighbours restricted to currently walkable tiles; the pathfinder's
    /// expansion query.
    pub fn walkable_neighbors(&self, pos: Pos, own_role: Role, with_companion: bool) -> Vec<Tile> {
        self.neighbors(pos)
            .into_iter()
            .filter(|t| self.is_walkable(t.pos, own_role, with_companion))
            .collect()
    }

    /// Directional adjacency facts over the walkable, unoccupied tiles, in
    /// the `<dir> tileX_Y tileX'_Y'` form the symbolic planner consumes.
    pub fn directional_facts(&self, own_role: Role) -> Vec<String> {
        let mut facts = Vec::new();
        for tile in self.walkable_tiles(own_role, false) {
            let p = tile.pos;
            for (dir, n) in [
                ("above", Pos::new(p.x, p.y + 1)),
                ("below", Pos::new(p.x, p.y - 1)),
                ("right", Pos::new(p.x + 1, p.y)),
                ("left", Pos::new(p.x - 1, p.y)),
            ] {
                if self.is_walkable(n, own_role, false) {
                    facts.push(format!("{dir} tile{}_{} tile{}_{}", n.x, n.y, p.x, p.y));
                }
            }
        }
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map(w: u32, h: u32) -> GridMap {
        GridMap::from_codes(w, h, &vec![3; (w * h) as usize]).unwrap()
    }

    #[test]
    fn registries_follow_tile_kinds() {
        let mut map = open_map(3, 3);
        map.update_tile(Tile::new(Pos::new(1, 1), TileKind::Depot)).unwrap();
        map.update_tile(Tile::new(Pos::new(2, 0), TileKind::Spawn)).unwrap();
        assert_eq!(map.depot_tiles(), &[Pos::new(1, 1)]);
        assert_eq!(map.spawn_tiles(), &[Pos::new(2, 0)]);

        map.update_tile(Tile::new(Pos::new(1, 1), TileKind::Wall)).unwrap();
        assert!(map.depot_tiles().is_empty());
    }

    #[test]
    fn update_tile_rejects_out_of_bounds() {
        let mut map = open_map(3, 3);
        let err = map
            .update_tile(Tile::new(Pos::new(3, 0), TileKind::Other))
            .unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds(..)));
    }

    #[test]
    fn adversaries_block_walkability() {
        let mut map = open_map(3, 3);
        map.update_adversaries(vec![Adversary {
            id: "a9".into(),
            pos: Pos::new(1, 0),
            timestamp_ms: 0,
        }]);
        assert!(!map.is_walkable(Pos::new(1, 0), Role::Leader, false));
        assert!(map.is_walkable(Pos::new(0, 0), Role::Leader, false));
    }

    #[test]
    fn companion_tile_blocked_unless_opted_in() {
        let mut map = open_map(3, 3);
        map.set_teammate_pos(Role::Follower, Pos::new(2, 2));
        assert!(!map.is_walkable(Pos::new(2, 2), Role::Leader, false));
        assert!(map.is_walkable(Pos::new(2, 2), Role::Leader, true));
        // Our own recorded position never blocks us.
        assert!(map.is_walkable(Pos::new(2, 2), Role::Follower, false));
    }

    #[test]
    fn parcel_upsert_keeps_newer_timestamp() {
        let mut map = open_map(3, 3);
        map.update_parcels(vec![Parcel::new("p1", Pos::new(0, 0), 10, 500)], 500, 1000);
        // A stale re-observation must not overwrite the fresher record.
        map.update_parcels(vec![Parcel::new("p1", Pos::new(1, 1), 9, 100)], 600, 1000);
        assert_eq!(map.parcels().len(), 1);
        assert_eq!(map.parcels()[0].pos, Pos::new(0, 0));
    }

    #[test]
    fn unknown_tile_code_is_fatal() {
        let err = GridMap::from_codes(1, 1, &[7]).unwrap_err();
        assert_eq!(err, GridError::UnknownTileCode(7));
    }
}
