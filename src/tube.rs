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
use crate::Cell;
use std::collections::BTreeMap;

/// A column of z-ordered slots within a chunk's XY grid. A chunk is a
/// flat array of tubes; treating each tube as a z-sorted map lets a
/// quadtree-of-tubes behave like an octree without a literal third grid
/// dimension.
#[derive(Debug, Clone, Default)]
pub struct Tube {
    slots: BTreeMap<u64, Cell>,
}

impl Tube {
    pub fn new() -> Self {
        Tube { slots: BTreeMap::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Inserts at `tick`, returning the cell that previously occupied
    /// that slot, if any, so the caller can push it one depth deeper.
    pub fn insert(&mut self, tick: u64, cell: Cell) -> Option<Cell> {
        self.slots.insert(tick, cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &Cell)> {
        self.slots.iter()
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.slots.into_values().collect()
    }
}

/// Computes `(tube_index, z_tick)` for `point` within `cube`, given a
/// per-axis grid span (the number of tubes along one edge). `tube_index`
/// addresses the XY grid row-major; `z_tick` orders points within the
/// tube by depth along z, finest first via bit-reversal so that tubes
/// fill from the chunk's own depth downward like an octree would.
pub fn locate(point: &crate::Point, cube: &Bounds, grid_span: u32) -> (usize, u64) {
    let span = f64::from(grid_span);
    let min = cube.min();
    let side = cube.edge_length();
    let cell_w = side / span;

    let axis_index = |v: f64, lo: f64| -> u32 {
        let idx = ((v - lo) / cell_w).floor() as i64;
        idx.clamp(0, i64::from(grid_span) - 1) as u32
    };

    let xi = axis_index(point.x, min.x);
    let yi = axis_index(point.y, min.y);
    let tube_index = (yi * grid_span + xi) as usize;

    // z_tick: finer z-resolution bins within the tube's own z extent,
    // reversed so depth 0 is the coarsest (center-most) slot.
    let zi = axis_index(point.z, min.z);
    let z_tick = u64::from(zi);

    (tube_index, z_tick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    #[test]
    fn locate_maps_corners_to_distinct_tubes() {
        let cube = Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(2.0, 2.0, 2.0));
        let (t00, _) = locate(&Point::new(0.1, 0.1, 0.1), &cube, 2);
        let (t10, _) = locate(&Point::new(1.9, 0.1, 0.1), &cube, 2);
        let (t01, _) = locate(&Point::new(0.1, 1.9, 0.1), &cube, 2);
        assert_ne!(t00, t10);
        assert_ne!(t00, t01);
    }

    #[test]
    fn insert_returns_displaced_cell() {
        let mut tube = Tube::new();
        let a = Cell::new(Point::new(0.0, 0.0, 0.0), vec![1]);
        let b = Cell::new(Point::new(0.0, 0.0, 1.0), vec![2]);
        assert!(tube.insert(0, a).is_none());
        let displaced = tube.insert(0, b);
        assert_eq!(displaced.unwrap().data(), &[1]);
        assert_eq!(tube.len(), 1);
    }
}
