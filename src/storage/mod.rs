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

mod binary;
mod laszip;

pub use binary::BinaryChunkStorage;
pub use laszip::LaszipChunkStorage;

use crate::errors::Result;
use crate::pool::Pool;
use crate::schema::Schema;
use crate::Cell;

/// The capability a chunk needs to turn its cells into bytes and back,
/// selected once at `Metadata` construction time and shared by every
/// chunk in the index. Owns no state beyond the schema it was built
/// with, so one adapter instance serves the whole tree.
pub trait ChunkStorage: Send + Sync {
    fn serialize(&self, cells: &[Cell]) -> Result<Vec<u8>>;
    /// Draws each decoded cell's attribute buffer from `pool` instead of
    /// allocating fresh, since a refault is exactly the steady-state,
    /// same-width, repeated allocation the pool exists to amortize.
    fn deserialize(&self, bytes: &[u8], pool: &Pool) -> Result<Vec<Cell>>;
    fn extension(&self) -> &'static str;
}

pub fn storage_for(kind: &str, schema: Schema) -> Result<Box<dyn ChunkStorage>> {
    match kind {
        "binary" => Ok(Box::new(BinaryChunkStorage::new(schema))),
        "laszip" => Ok(Box::new(LaszipChunkStorage::new(schema))),
        other => Err(crate::errors::Error::from(crate::errors::ErrorKind::Config(format!(
            "unknown dataStorage: {}",
            other
        )))),
    }
}
