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

use super::ChunkStorage;
use crate::errors::{Error, ErrorKind, Result};
use crate::pool::Pool;
use crate::schema::Schema;
use crate::{Cell, Point};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Plain byte layout: a little-endian `u64` cell count, then for each
/// cell three little-endian `f64`s (the scaled point) followed by the
/// schema's fixed-width attribute bytes. No compression; a development
/// and testing backend standing in for a real point-cloud codec.
pub struct BinaryChunkStorage {
    schema: Schema,
}

impl BinaryChunkStorage {
    pub fn new(schema: Schema) -> Self {
        BinaryChunkStorage { schema }
    }
}

impl ChunkStorage for BinaryChunkStorage {
    fn serialize(&self, cells: &[Cell]) -> Result<Vec<u8>> {
        let point_size = self.schema.point_size();
        let mut out = Vec::with_capacity(8 + cells.len() * (24 + point_size));
        out.write_u64::<LittleEndian>(cells.len() as u64)?;
        for cell in cells {
            let point = cell.point();
            out.write_f64::<LittleEndian>(point.x)?;
            out.write_f64::<LittleEndian>(point.y)?;
            out.write_f64::<LittleEndian>(point.z)?;
            let data = cell.data();
            if data.len() != point_size {
                return Err(Error::from(ErrorKind::Storage(format!(
                    "cell data width {} does not match schema width {}",
                    data.len(),
                    point_size
                ))));
            }
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    fn deserialize(&self, bytes: &[u8], pool: &Pool) -> Result<Vec<Cell>> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.read_u64::<LittleEndian>()? as usize;
        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let x = cursor.read_f64::<LittleEndian>()?;
            let y = cursor.read_f64::<LittleEndian>()?;
            let z = cursor.read_f64::<LittleEndian>()?;
            let mut data = pool.acquire();
            std::io::Read::read_exact(&mut cursor, &mut data)?;
            cells.push(Cell::new(Point::new(x, y, z), data));
        }
        Ok(cells)
    }

    fn extension(&self) -> &'static str {
        "bin"
    }
}
