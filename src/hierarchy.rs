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

use crate::errors::Result;
use crate::key::ChunkKey;
use fnv::FnvHashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// A lookup structure letting a reader decide, for any node, how many
/// points are stored at or below it without opening every descendant
/// chunk. Each entry already holds the *cumulative* count across the
/// whole subtree rooted at that key: `increment` walks from the
/// inserted-into chunk up through every ancestor, so no separate
/// per-node "direct" count is ever needed.
#[derive(Default)]
pub struct Hierarchy {
    counts: Mutex<FnvHashMap<ChunkKey, u64>>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Hierarchy { counts: Mutex::new(FnvHashMap::default()) }
    }

    pub fn increment(&self, key: ChunkKey, delta: u64) {
        let mut counts = self.counts.lock().unwrap();
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            *counts.entry(k).or_insert(0) += delta;
            cursor = k.parent();
        }
    }

    pub fn count_at(&self, key: &ChunkKey) -> u64 {
        self.counts.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn merge(&self, other: &Hierarchy) {
        let other_counts = other.counts.lock().unwrap();
        let mut counts = self.counts.lock().unwrap();
        for (key, count) in other_counts.iter() {
            *counts.entry(*key).or_insert(0) += count;
        }
    }

    /// Persists one JSON block per depth present in the hierarchy, named
    /// `h/<depth>-0-0-0.json`. Per-depth blocks are the simplest scheme
    /// that satisfies streaming a reader only the levels it needs; a
    /// finer per-prefix scheme is a reasonable future refinement but is
    /// not required by anything this index currently does.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let counts = self.counts.lock().unwrap();
        let mut by_depth: FnvHashMap<u32, Vec<(ChunkKey, u64)>> = FnvHashMap::default();
        for (key, count) in counts.iter() {
            by_depth.entry(key.depth()).or_insert_with(Vec::new).push((*key, *count));
        }
        for (depth, entries) in by_depth {
            let serializable: Vec<_> = entries
                .iter()
                .map(|(key, count)| {
                    let [x, y, z] = key.position();
                    serde_json::json!({ "x": x, "y": y, "z": z, "count": count })
                })
                .collect();
            let path = dir.join(format!("{}-0-0-0.json", depth));
            let bytes = serde_json::to_vec(&serializable)?;
            fs::write(path, bytes)?;
        }
        Ok(())
    }

    /// Reads back every per-depth block `save` wrote, reconstructing the
    /// same cumulative counts. Missing directory means nothing was ever
    /// saved (a brand new index): returns an empty hierarchy rather than
    /// an error.
    pub fn load(dir: &Path) -> Result<Hierarchy> {
        let hierarchy = Hierarchy::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(hierarchy),
            Err(err) => return Err(err.into()),
        };

        for entry in entries {
            let entry = entry?;
            let depth: u32 = match entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.split('-').next())
                .and_then(|s| s.parse().ok())
            {
                Some(depth) => depth,
                None => continue,
            };
            let bytes = fs::read(entry.path())?;
            let records: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
            for record in records {
                let x = record["x"].as_u64().unwrap_or(0);
                let y = record["y"].as_u64().unwrap_or(0);
                let z = record["z"].as_u64().unwrap_or(0);
                let count = record["count"].as_u64().unwrap_or(0);
                let key = ChunkKey::new(depth, [x, y, z]);
                hierarchy.increment_leaf_only(key, count);
            }
        }
        Ok(hierarchy)
    }

    /// Sets an absolute count at exactly `key` without walking ancestors
    /// — used only when rebuilding from already-cumulative persisted
    /// records, where every key (including ancestors) already has its
    /// own correct entry on disk.
    fn increment_leaf_only(&self, key: ChunkKey, count: u64) {
        *self.counts.lock().unwrap().entry(key).or_insert(0) += count;
    }
}
