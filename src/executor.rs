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

use crate::delta::Delta;
use crate::errors::Result;
use crate::schema::Schema;
use crate::{Cell, Point};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decodes one point file into a stream of scaled `Cell`s. Point-format
/// specifics (LAS, PLY, ASCII, reprojection) live behind this trait;
/// the indexing core only ever sees cells. Partial success mid-file is
/// treated as all-or-nothing: an `Err` here marks the whole file
/// `FileStatus::Error` rather than keeping whatever was inserted before
/// the failure.
pub trait Executor: Send + Sync {
    fn run(
        &self,
        path: &Path,
        delta: &Delta,
        schema: &Schema,
        callback: &mut dyn FnMut(Cell),
    ) -> Result<()>;
}

/// Reference decoder for the engine's own tests: a flat little-endian
/// binary format identical to `storage::BinaryChunkStorage`'s layout
/// but read from an arbitrary input path rather than a chunk blob.
pub struct RawExecutor;

impl Executor for RawExecutor {
    fn run(&self, path: &Path, delta: &Delta, schema: &Schema, callback: &mut dyn FnMut(Cell)) -> Result<()> {
        let point_size = schema.point_size();
        let mut reader = BufReader::new(File::open(path)?);
        let count = reader.read_u64::<LittleEndian>()?;
        for _ in 0..count {
            let x = reader.read_f64::<LittleEndian>()?;
            let y = reader.read_f64::<LittleEndian>()?;
            let z = reader.read_f64::<LittleEndian>()?;
            let mut data = vec![0u8; point_size];
            std::io::Read::read_exact(&mut reader, &mut data)?;
            let scaled = delta.to_scaled(&Point::new(x, y, z));
            callback(Cell::new(scaled, data));
        }
        Ok(())
    }
}
