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
use crate::Cell;

/// Compressed LAS chunk storage. Wiring a real LASzip codec in is out of
/// scope here; this adapter exists so `dataStorage: "laszip"` is a
/// recognised, schema-carrying configuration rather than a silent
/// fallback to `binary`, and so callers get a clear `StorageError`
/// instead of a panic if a build actually selects it.
pub struct LaszipChunkStorage {
    #[allow(dead_code)]
    schema: Schema,
}

impl LaszipChunkStorage {
    pub fn new(schema: Schema) -> Self {
        LaszipChunkStorage { schema }
    }
}

impl ChunkStorage for LaszipChunkStorage {
    fn serialize(&self, _cells: &[Cell]) -> Result<Vec<u8>> {
        Err(Error::from(ErrorKind::Storage("laszip chunk storage is not available in this build".into())))
    }

    fn deserialize(&self, _bytes: &[u8], _pool: &Pool) -> Result<Vec<Cell>> {
        Err(Error::from(ErrorKind::Storage("laszip chunk storage is not available in this build".into())))
    }

    fn extension(&self) -> &'static str {
        "laz"
    }
}
