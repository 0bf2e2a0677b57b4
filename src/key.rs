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
use crate::Point;

/// Identifies a node in the implicit octree rooted at the scaled cubic
/// bounds: `(depth, position)` uniquely names a chunk file, addressed
/// by per-axis ticks rather than an octal path string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    depth: u32,
    position: [u64; 3],
}

impl ChunkKey {
    pub fn new(depth: u32, position: [u64; 3]) -> Self {
        ChunkKey { depth, position }
    }

    pub fn root(base_depth: u32) -> Self {
        ChunkKey { depth: base_depth, position: [0, 0, 0] }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn position(&self) -> [u64; 3] {
        self.position
    }

    /// The child of this key in the given octant (bit 2 = x, bit 1 = y,
    /// bit 0 = z), one depth further down.
    pub fn child(&self, octant: u8) -> ChunkKey {
        debug_assert!(octant < 8);
        ChunkKey {
            depth: self.depth + 1,
            position: [
                self.position[0] * 2 + u64::from((octant >> 2) & 1),
                self.position[1] * 2 + u64::from((octant >> 1) & 1),
                self.position[2] * 2 + u64::from(octant & 1),
            ],
        }
    }

    pub fn parent(&self) -> Option<ChunkKey> {
        if self.depth == 0 {
            return None;
        }
        Some(ChunkKey {
            depth: self.depth - 1,
            position: [self.position[0] / 2, self.position[1] / 2, self.position[2] / 2],
        })
    }

    /// This chunk's cube within `root_cube`, the scaled cubic bounds of
    /// the whole index.
    pub fn cube(&self, root_cube: &Bounds) -> Bounds {
        let divisions = (1u64 << self.depth) as f64;
        let side = root_cube.edge_length() / divisions;
        let min = root_cube.min();
        let lo = Point::new(
            min.x + self.position[0] as f64 * side,
            min.y + self.position[1] as f64 * side,
            min.z + self.position[2] as f64 * side,
        );
        let hi = Point::new(lo.x + side, lo.y + side, lo.z + side);
        Bounds::new(lo, hi)
    }

    /// `postfix` is `-<subsetId>` at depths below the shared depth, empty
    /// otherwise; `subset_postfix` is already formatted by the caller
    /// (see `Subset::postfix`).
    pub fn file_stem(&self, subset_postfix: &str) -> String {
        format!(
            "{}-{}-{}-{}{}",
            self.depth, self.position[0], self.position[1], self.position[2], subset_postfix
        )
    }
}

/// Iterates through tree depths computing the key at each level for one
/// point. After `magnify_to(p, d)`, the climber names the unique chunk at
/// depth `d` that contains `p` in the cubic bounds. A point exactly on a
/// split plane goes to the lower-coordinate child (half-open `[lo, hi)`
/// intervals, tie broken low).
#[derive(Debug, Clone, Copy)]
pub struct Climber {
    key: ChunkKey,
}

impl Climber {
    pub fn new(base_depth: u32) -> Self {
        Climber { key: ChunkKey::root(base_depth) }
    }

    pub fn at(key: ChunkKey) -> Self {
        Climber { key }
    }

    pub fn reset(&mut self, base_depth: u32) {
        self.key = ChunkKey::root(base_depth);
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Advances one depth, selecting the octant of `root_cube` containing
    /// `point` at the climber's *current* key.
    pub fn step(&mut self, point: &Point, root_cube: &Bounds) {
        let cube = self.key.cube(root_cube);
        let half = cube.edge_length() / 2.0;
        let min = cube.min();
        let bit = |v: f64, lo: f64| -> u8 {
            if v - lo > half {
                1
            } else {
                0
            }
        };
        let octant = (bit(point.x, min.x) << 2) | (bit(point.y, min.y) << 1) | bit(point.z, min.z);
        self.key = self.key.child(octant);
    }

    /// Fast-forwards to `depth`, stepping once per level in between.
    pub fn magnify_to(&mut self, point: &Point, root_cube: &Bounds, depth: u32) {
        while self.key.depth < depth {
            self.step(point, root_cube);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> Bounds {
        Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn child_and_parent_roundtrip() {
        let root = ChunkKey::root(0);
        let child = root.child(5);
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent(), Some(root));
    }

    #[test]
    fn step_picks_lower_octant_on_tie() {
        let cube = unit_cube();
        let mut climber = Climber::new(0);
        // Exactly on the split plane at every axis -> lower child (0).
        climber.step(&Point::new(0.5, 0.5, 0.5), &cube);
        assert_eq!(climber.key().position(), [0, 0, 0]);
    }

    #[test]
    fn step_picks_upper_octant_past_midpoint() {
        let cube = unit_cube();
        let mut climber = Climber::new(0);
        climber.step(&Point::new(0.6, 0.6, 0.6), &cube);
        assert_eq!(climber.key().position(), [1, 1, 1]);
    }

    #[test]
    fn magnify_to_names_the_containing_chunk() {
        let cube = unit_cube();
        let mut climber = Climber::new(0);
        climber.magnify_to(&Point::new(0.1, 0.9, 0.4), &cube, 2);
        let key = climber.key();
        assert_eq!(key.depth(), 2);
        let found = key.cube(&cube);
        assert!(found.contains(&Point::new(0.1, 0.9, 0.4)));
    }
}
