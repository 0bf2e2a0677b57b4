// Copyright 2016 Google Inc.
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

//! Entwine indexes massive unstructured point clouds into a spatially
//! partitioned, chunked, on-disk octree-like structure suitable for
//! streaming queries by bounding box and depth. This crate is the spatial
//! indexing engine: the in-memory tree of chunks, the climber/key
//! machinery, the overflow/split policy, the clipper, and the
//! subset/merge protocol. Point-file decoding, storage transport, and the
//! CLI live at the edges and are modeled here as traits (`Executor`,
//! `Endpoint`).

#![recursion_limit = "1024"]

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate serde_derive;

pub mod bounds;
pub mod builder;
pub mod chunk;
pub mod clip;
pub mod config;
pub mod delta;
pub mod endpoint;
pub mod errors;
pub mod executor;
pub mod hierarchy;
pub mod key;
pub mod manifest;
pub mod merger;
pub mod metadata;
pub mod pool;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod subset;
pub mod thread_pools;
pub mod tube;

pub use crate::bounds::Bounds;
pub use crate::builder::Builder;
pub use crate::config::Config;
pub use crate::delta::Delta;
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::key::{ChunkKey, Climber};
pub use crate::merger::Merger;
pub use crate::metadata::Metadata;
pub use crate::schema::Schema;

use nalgebra::Point3;

/// A point in scaled integer space: `round((native - offset) / scale)`,
/// stored as `f64` so it can address arbitrarily large coordinate
/// ranges without a dedicated bignum type.
pub type Point = Point3<f64>;

/// One point plus its opaque attribute bytes. Cells are owned by exactly
/// one chunk at any time; a cell decoded from a refaulted chunk blob has
/// its attribute buffer drawn from a `Pool` rather than freshly
/// allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    point: Point,
    data: Vec<u8>,
}

impl Cell {
    pub fn new(point: Point, data: Vec<u8>) -> Self {
        Cell { point, data }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_parts(self) -> (Point, Vec<u8>) {
        (self.point, self.data)
    }
}
