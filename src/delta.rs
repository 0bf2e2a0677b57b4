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
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Maps native coordinates to integer scaled space: `scaled =
/// round((native - offset) / scale)`. Applied consistently across the
/// whole index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    scale: Vector3<f64>,
    offset: Vector3<f64>,
}

impl Delta {
    pub fn new(scale: Vector3<f64>, offset: Vector3<f64>) -> Self {
        Delta { scale, offset }
    }

    pub fn uniform(scale: f64, offset: f64) -> Self {
        Delta {
            scale: Vector3::new(scale, scale, scale),
            offset: Vector3::new(offset, offset, offset),
        }
    }

    pub fn scale(&self) -> Vector3<f64> {
        self.scale
    }

    pub fn offset(&self) -> Vector3<f64> {
        self.offset
    }

    /// Applies the delta, rounding to the nearest integer in scaled space.
    pub fn to_scaled(&self, native: &Point) -> Point {
        Point::new(
            ((native.x - self.offset.x) / self.scale.x).round(),
            ((native.y - self.offset.y) / self.scale.y).round(),
            ((native.z - self.offset.z) / self.scale.z).round(),
        )
    }

    pub fn to_native(&self, scaled: &Point) -> Point {
        Point::new(
            scaled.x * self.scale.x + self.offset.x,
            scaled.y * self.scale.y + self.offset.y,
            scaled.z * self.scale.z + self.offset.z,
        )
    }
}

impl Default for Delta {
    /// Default scale 0.01, default offset 0.
    fn default() -> Self {
        Delta::uniform(0.01, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_scale_offset() {
        let delta = Delta::uniform(0.01, 100.0);
        let native = Point::new(123.456, -45.0, 100.0);
        let scaled = delta.to_scaled(&native);
        assert_eq!(scaled, Point::new(2346.0, -14500.0, 0.0));
        let back = delta.to_native(&scaled);
        approx::assert_relative_eq!(back.x, native.x, epsilon = 1e-9);
    }

    #[test]
    fn default_uses_centimeter_scale() {
        let delta = Delta::default();
        assert_eq!(delta.scale(), Vector3::new(0.01, 0.01, 0.01));
        assert_eq!(delta.offset(), Vector3::new(0.0, 0.0, 0.0));
    }
}
