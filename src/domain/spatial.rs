// Sparse uniform grid over world space. Cell side is a power of two so cell
// coordinates come from an arithmetic shift, which floors correctly for
// negative positions.

use crate::domain::entity::EntityKey;
use glam::Vec2;
use rayon::prelude::*;
use std::collections::HashMap;

type Cell = (i32, i32);

const NEIGHBORHOOD: [(i32, i32); 9] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Uniform spatial hash supporting insertion, incremental re-bucketing and
/// 3x3-neighborhood queries.
#[derive(Debug)]
pub struct SpatialGrid {
    /// log2 of the cell side length.
    shift: u32,
    buckets: HashMap<Cell, Vec<EntityKey>>,
    /// Current cell per indexed entity; the membership list diffed on update.
    entries: HashMap<EntityKey, Cell>,
}

impl SpatialGrid {
    pub fn new(shift: u32) -> Self {
        Self {
            shift,
            buckets: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    fn cell_of(shift: u32, pos: Vec2) -> Cell {
        ((pos.x.floor() as i32) >> shift, (pos.y.floor() as i32) >> shift)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: EntityKey, pos: Vec2) {
        let cell = Self::cell_of(self.shift, pos);
        if let Some(old) = self.entries.insert(key, cell) {
            if old == cell {
                return;
            }
            self.unbucket(key, old);
        }
        self.buckets.entry(cell).or_default().push(key);
    }

    pub fn remove(&mut self, key: EntityKey) {
        if let Some(cell) = self.entries.remove(&key) {
            self.unbucket(key, cell);
        }
    }

    /// Re-bucket moved entities and drop expired ones.
    ///
    /// The new cell for every entry is computed in parallel over a read-only
    /// snapshot of the membership list; relocation itself is serial and only
    /// touches entries whose cell actually changed, so buckets are never
    /// mutated while being iterated.
    pub fn update(&mut self, moves: &[(EntityKey, Vec2, bool)]) {
        let shift = self.shift;
        let targets: Vec<(EntityKey, Option<Cell>)> = moves
            .par_iter()
            .map(|&(key, pos, expired)| {
                let cell = (!expired).then(|| Self::cell_of(shift, pos));
                (key, cell)
            })
            .collect();

        for (key, target) in targets {
            match (self.entries.get(&key).copied(), target) {
                (Some(old), Some(new)) if old != new => {
                    self.unbucket(key, old);
                    self.buckets.entry(new).or_default().push(key);
                    self.entries.insert(key, new);
                }
                (Some(old), None) => {
                    self.unbucket(key, old);
                    self.entries.remove(&key);
                }
                (None, Some(new)) => {
                    self.buckets.entry(new).or_default().push(key);
                    self.entries.insert(key, new);
                }
                _ => {}
            }
        }
    }

    /// All entities bucketed in the 3x3 neighborhood of `pos`'s cell. A miss
    /// yields an empty sequence; having no neighbors is not an error.
    pub fn get_near(&self, pos: Vec2) -> impl Iterator<Item = EntityKey> + '_ {
        let (cx, cy) = Self::cell_of(self.shift, pos);
        NEIGHBORHOOD.iter().flat_map(move |&(dx, dy)| {
            self.buckets
                .get(&(cx + dx, cy + dy))
                .into_iter()
                .flatten()
                .copied()
        })
    }

    /// Remove `key` from `cell`'s bucket, dropping the bucket when emptied so
    /// sparse worlds stay bounded in memory.
    fn unbucket(&mut self, key: EntityKey, cell: Cell) {
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            bucket.retain(|k| *k != key);
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
