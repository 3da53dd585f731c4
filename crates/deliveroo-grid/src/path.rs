//! A* over the walkable tiles of a map snapshot.
//!
//! Synchronous by design: callers take a snapshot of the map, query it, and
//! must tolerate that the world may have moved on by the time they act on the
//! result (the plan executor replans on repeated move failures).

use core::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{GridMap, Pos, Role};

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    pos: Pos,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, Pos, u64) {
        (self.f, self.g, self.pos, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        other.key().cmp(&self.key())
    }
}

/// Shortest path from `from` to `to` across currently walkable tiles.
///
/// The returned path excludes the start tile: `path[0]` is the first step,
/// the last element is `to`. `from == to` yields an empty path (success
/// without movement). `None` means the destination is unwalkable or cut off.
pub fn find_path(map: &GridMap, role: Role, from: Pos, to: Pos) -> Option<Vec<Pos>> {
    if from == to {
        return Some(Vec::new());
    }
    if !map.in_bounds(from) || !map.is_walkable(to, role, false) {
        return None;
    }

    let len = (map.width() * map.height()) as usize;
    let mut g_score = vec![u32::MAX; len];
    let mut came_from: Vec<Option<usize>> = vec![None; len];

    let start_idx = map.idx(from)?;
    let goal_idx = map.idx(to)?;
    g_score[start_idx] = 0;

    let mut open = BinaryHeap::new();
    let mut tie: u64 = 0;
    open.push(OpenNode {
        f: from.manhattan(to),
        g: 0,
        pos: from,
        tie,
    });
    tie += 1;

    while let Some(node) = open.pop() {
        if node.pos == to {
            return Some(reconstruct(map, &came_from, start_idx, goal_idx));
        }

        let node_idx = map.idx(node.pos)?;
        if node.g != g_score[node_idx] {
            // Stale heap entry.
            continue;
        }

        for neighbor in map.walkable_neighbors(node.pos, role, false) {
            let n_idx = map.idx(neighbor.pos)?;
            let tentative_g = node.g.saturating_add(1);
            if tentative_g >= g_score[n_idx] {
                continue;
            }
            g_score[n_idx] = tentative_g;
            came_from[n_idx] = Some(node_idx);
            open.push(OpenNode {
                f: tentative_g.saturating_add(neighbor.pos.manhattan(to)),
                g: tentative_g,
                pos: neighbor.pos,
                tie,
            });
            tie += 1;
        }
    }

    None
}

/// Path length in steps, used for scoring pickups. `None` when unreachable.
pub fn path_distance(map: &GridMap, role: Role, from: Pos, to: Pos) -> Option<usize> {
    find_path(map, role, from, to).map(|p| p.len())
}

fn reconstruct(map: &GridMap, came_from: &[Option<usize>], start: usize, goal: usize) -> Vec<Pos> {
    let mut out = Vec::new();
    let mut current = goal;
    while current != start {
        let pos = Pos::new(
            (current as i32) % map.width(),
            (current as i32) / map.width(),
        );
        out.push(pos);
        match came_from[current] {
            Some(prev) => current = prev,
            None => break,
        }
    }
    out.reverse();
    out
}
