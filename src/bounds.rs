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

use crate::Point;
use serde::{Deserialize, Serialize};

/// An axis-aligned cube or box, in whichever coordinate space (native or
/// scaled) its caller keeps track of. The index addresses space with the
/// *cubic* form: the smallest enclosing cube of the conforming bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min: Point,
    max: Point,
}

impl Bounds {
    pub fn new(min: Point, max: Point) -> Self {
        Bounds { min, max }
    }

    pub fn min(&self) -> Point {
        self.min
    }

    pub fn max(&self) -> Point {
        self.max
    }

    pub fn grow(&mut self, p: &Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x < self.max.x
            && p.y < self.max.y
            && p.z < self.max.z
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// The smallest enclosing cube, power-of-two aligned to the next
    /// representable edge length above the conforming bounds' longest
    /// side. This is the addressing space every `ChunkKey` is relative
    /// to.
    pub fn cubic(&self) -> Bounds {
        let side = self.max.x - self.min.x;
        let side = side.max(self.max.y - self.min.y);
        let side = side.max(self.max.z - self.min.z);
        let side = side.max(1.0);
        let center = nalgebra::Point3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        );
        let half = side / 2.0;
        Bounds::new(
            Point::new(center.x - half, center.y - half, center.z - half),
            Point::new(center.x + half, center.y + half, center.z + half),
        )
    }

    pub fn edge_length(&self) -> f64 {
        self.max.x - self.min.x
    }
}
