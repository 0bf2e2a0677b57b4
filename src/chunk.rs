// Copyright 2016 The Cartographer Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::bounds::Bounds;
use crate::key::ChunkKey;
use crate::tube::{self, Tube};
use crate::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Outcome of inserting a cell into a chunk.
pub enum Insert {
    /// The cell came to rest in this chunk's own grid.
    Placed,
    /// This chunk had already split; the caller must descend one depth
    /// and retry against the child chunk instead. Carries the cell back
    /// since this chunk never took ownership of it.
    AlreadySplit(Cell),
    /// This insert was the one that pushed the chunk over its overflow
    /// threshold. The chunk has flipped to split and drained every cell
    /// it was holding (including the one just inserted) into the
    /// returned vector; the caller must re-route each of them into the
    /// appropriate child chunk. Returning the whole batch here, rather
    /// than leaving the triggering cell "placed" and redistributing only
    /// the rest, keeps there being exactly one vector of cells ever in
    /// flight for this chunk's overflow, so no cell can be counted
    /// twice.
    JustSplit(Vec<Cell>),
}

/// One node of the on-disk tree: a grid of tubes over its own cubic
/// bounds, plus an overflow bucket used before the chunk has enough
/// cells to justify splitting. Depths at or below the configured split
/// depth ("base" chunks) split once overflowing; depths beyond that
/// ("infinite" chunks, e.g. the leaves) never split and just grow their
/// tube array, trading split cost for memory at the bottom of the tree.
pub struct Chunk {
    key: ChunkKey,
    cube: Bounds,
    grid_span: u32,
    tubes: Vec<Mutex<Tube>>,
    overflow: Mutex<Option<Vec<Cell>>>,
    overflow_threshold: usize,
    can_split: bool,
    split: AtomicBool,
}

impl Chunk {
    pub fn new(key: ChunkKey, cube: Bounds, grid_span: u32, overflow_threshold: usize, can_split: bool) -> Self {
        let n = (grid_span * grid_span) as usize;
        let mut tubes = Vec::with_capacity(n);
        for _ in 0..n {
            tubes.push(Mutex::new(Tube::new()));
        }
        Chunk {
            key,
            cube,
            grid_span,
            tubes,
            overflow: Mutex::new(Some(Vec::new())),
            overflow_threshold,
            can_split,
            split: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn cube(&self) -> &Bounds {
        &self.cube
    }

    pub fn is_split(&self) -> bool {
        self.split.load(Ordering::Acquire)
    }

    pub fn num_points(&self) -> usize {
        let tube_total: usize = self.tubes.iter().map(|t| t.lock().unwrap().len()).sum();
        let overflow_total = self.overflow.lock().unwrap().as_ref().map_or(0, Vec::len);
        tube_total + overflow_total
    }

    /// Attempts to place `cell` into this chunk. A chunk's own tube grid
    /// never rejects a cell outright: a tube collision pushes the
    /// incumbent into the overflow bucket rather than discarding it, so
    /// only overflow growth can trigger a split.
    pub fn insert(&self, cell: Cell) -> Insert {
        if self.is_split() {
            return Insert::AlreadySplit(cell);
        }

        let (tube_index, tick) = tube::locate(cell.point(), &self.cube, self.grid_span);
        let displaced = {
            let mut tube = self.tubes[tube_index].lock().unwrap();
            tube.insert(tick, cell)
        };

        let overflowed = match displaced {
            Some(cell) => cell,
            None => return Insert::Placed,
        };

        if !self.can_split {
            // Infinite chunks never split: park the collision in the
            // overflow bucket permanently, it is still served from this
            // chunk.
            let mut overflow = self.overflow.lock().unwrap();
            overflow.as_mut().expect("overflow taken on non-splitting chunk").push(overflowed);
            return Insert::Placed;
        }

        let mut overflow = self.overflow.lock().unwrap();
        let bucket = match overflow.as_mut() {
            Some(bucket) => bucket,
            None => return Insert::AlreadySplit(overflowed),
        };
        bucket.push(overflowed);
        if bucket.len() < self.overflow_threshold {
            return Insert::Placed;
        }

        // Threshold crossed: drain everything, including what the tube
        // grid is holding, and flip to split under the same lock so no
        // concurrent inserter can observe a half-drained state.
        let mut drained = overflow.take().expect("just populated");
        self.split.store(true, Ordering::Release);
        drop(overflow);

        for tube in &self.tubes {
            let mut guard = tube.lock().unwrap();
            drained.extend(std::mem::take(&mut *guard).into_cells());
        }

        Insert::JustSplit(drained)
    }

    /// All resident cells, draining the chunk. Used when evicting a
    /// chunk whose ref count has reached zero: after this call the
    /// chunk is empty and must not be reused.
    pub fn drain(&self) -> Vec<Cell> {
        let mut out = Vec::new();
        if let Some(bucket) = self.overflow.lock().unwrap().as_mut() {
            out.append(bucket);
        }
        for tube in &self.tubes {
            out.extend(std::mem::take(&mut *tube.lock().unwrap()).into_cells());
        }
        out
    }

    /// A read-only copy of every resident cell, leaving the chunk
    /// intact. Used by `save`, which persists every resident chunk
    /// without disturbing it so inserts may continue concurrently.
    pub fn snapshot(&self) -> Vec<Cell> {
        let mut out = Vec::new();
        if let Some(bucket) = self.overflow.lock().unwrap().as_ref() {
            out.extend(bucket.iter().cloned());
        }
        for tube in &self.tubes {
            out.extend(tube.lock().unwrap().iter().map(|(_, cell)| cell.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    fn cube() -> Bounds {
        Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(8.0, 8.0, 8.0))
    }

    #[test]
    fn insert_without_collision_places() {
        let chunk = Chunk::new(ChunkKey::root(0), cube(), 4, 8, true);
        let cell = Cell::new(Point::new(1.0, 1.0, 1.0), vec![]);
        assert!(matches!(chunk.insert(cell), Insert::Placed));
        assert_eq!(chunk.num_points(), 1);
    }

    #[test]
    fn overflow_triggers_split_with_all_cells_drained() {
        let chunk = Chunk::new(ChunkKey::root(0), cube(), 1, 2, true);
        // grid_span 1: every point lands in the same tube, so each new
        // insert after the first collides and grows the overflow bucket.
        let a = Cell::new(Point::new(1.0, 1.0, 1.0), vec![1]);
        let b = Cell::new(Point::new(1.0, 1.0, 2.0), vec![2]);
        let c = Cell::new(Point::new(1.0, 1.0, 3.0), vec![3]);

        assert!(matches!(chunk.insert(a), Insert::Placed));
        assert!(matches!(chunk.insert(b), Insert::Placed));
        match chunk.insert(c) {
            Insert::JustSplit(drained) => assert_eq!(drained.len(), 3),
            _ => panic!("expected split"),
        }
        assert!(chunk.is_split());
    }

    #[test]
    fn insert_after_split_reports_already_split() {
        let chunk = Chunk::new(ChunkKey::root(0), cube(), 1, 1, true);
        let a = Cell::new(Point::new(1.0, 1.0, 1.0), vec![1]);
        let b = Cell::new(Point::new(1.0, 1.0, 2.0), vec![2]);
        assert!(matches!(chunk.insert(a), Insert::Placed));
        assert!(matches!(chunk.insert(b), Insert::JustSplit(_)));
        let c = Cell::new(Point::new(1.0, 1.0, 3.0), vec![3]);
        assert!(matches!(chunk.insert(c), Insert::AlreadySplit(_)));
    }

    #[test]
    fn non_splitting_chunk_never_splits() {
        let chunk = Chunk::new(ChunkKey::root(0), cube(), 1, 1, false);
        for i in 0..10 {
            let cell = Cell::new(Point::new(1.0, 1.0, i as f64), vec![]);
            assert!(matches!(chunk.insert(cell), Insert::Placed));
        }
        assert!(!chunk.is_split());
        assert_eq!(chunk.num_points(), 10);
    }
}
