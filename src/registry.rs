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
use crate::chunk::{Chunk, Insert};
use crate::clip::{Clipper, ReffedChunk};
use crate::endpoint::Endpoint;
use crate::hierarchy::Hierarchy;
use crate::key::{ChunkKey, Climber};
use crate::pool::Pool;
use crate::storage::ChunkStorage;
use crate::subset::Subset;
use crate::Cell;
use fnv::FnvHashMap;
use std::sync::{Arc, Mutex};

/// Where to look for a chunk's prior contents when a key misses the
/// resident map — set once a build awakens an existing index, so a
/// point landing in a chunk that was persisted and evicted in an earlier
/// run gets that chunk's cells back before any new cell is inserted.
struct Backend {
    endpoint: Arc<dyn Endpoint>,
    storage: Arc<dyn ChunkStorage>,
    subset: Option<Subset>,
}

/// A chunk's file-name suffix is `-<id>` only below the shared depth a
/// subset partitions at; chunks at or past that depth are uniquely owned
/// by one subset, so no two subsets can ever name the same file and no
/// suffix is needed. Above it, every subset replicates the same shared
/// prefix with its own partial content, so each needs its own name.
fn chunk_postfix(subset: Option<&Subset>, depth: u32) -> String {
    match subset {
        Some(subset) if depth < subset.shared_depth() => subset.postfix(),
        _ => String::new(),
    }
}

/// The live, in-memory tree: one resident map from `ChunkKey` to chunk,
/// guaranteeing the at-most-one-resident-copy invariant by construction
/// (there is exactly one map slot per key). Chunk creation and lookup
/// share a single lock; chunk *content* mutation happens inside each
/// `Chunk`'s own finer-grained locks, so the registry lock is only ever
/// held for the short map lookup/insert, not for point insertion itself.
pub struct Registry {
    root_cube: Bounds,
    base_depth: u32,
    grid_span: u32,
    overflow_threshold: usize,
    overflow_depth: u32,
    resident: Mutex<FnvHashMap<ChunkKey, Arc<ReffedChunk>>>,
    hierarchy: Hierarchy,
    backend: Mutex<Option<Backend>>,
    pool: Pool,
}

impl Registry {
    pub fn new(
        root_cube: Bounds,
        base_depth: u32,
        grid_span: u32,
        overflow_threshold: usize,
        overflow_depth: u32,
        point_size: usize,
    ) -> Self {
        Registry {
            root_cube,
            base_depth,
            grid_span,
            overflow_threshold,
            overflow_depth,
            resident: Mutex::new(FnvHashMap::default()),
            hierarchy: Hierarchy::new(),
            backend: Mutex::new(None),
            pool: Pool::new(point_size),
        }
    }

    pub fn root_cube(&self) -> &Bounds {
        &self.root_cube
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn resident_count(&self) -> usize {
        self.resident.lock().unwrap().len()
    }

    /// Points a future chunk miss at where that chunk's prior contents
    /// (if any) were persisted, so awakening an existing index doesn't
    /// silently start every chunk empty. Called once, right after
    /// `Builder` resolves an awaken vs. initialize decision.
    pub fn set_backend(&self, endpoint: Arc<dyn Endpoint>, storage: Arc<dyn ChunkStorage>, subset: Option<Subset>) {
        *self.backend.lock().unwrap() = Some(Backend { endpoint, storage, subset });
    }

    fn get_or_create(&self, key: ChunkKey) -> Arc<ReffedChunk> {
        let mut resident = self.resident.lock().unwrap();
        if let Some(existing) = resident.get(&key) {
            return Arc::clone(existing);
        }

        let cube = key.cube(&self.root_cube);
        // Overflow (and therefore splitting) only applies at or below
        // the configured overflow depth; deeper chunks are treated as
        // infinite and just grow.
        let can_split = key.depth() <= self.overflow_depth;
        let chunk = Chunk::new(key, cube, self.grid_span, self.overflow_threshold, can_split);
        if let Some(cells) = self.refault(&key) {
            for cell in cells {
                chunk.insert(cell);
            }
        }
        let reffed = Arc::new(ReffedChunk::new(chunk));
        resident.insert(key, Arc::clone(&reffed));
        reffed
    }

    /// Re-faults one chunk's previously persisted cells, if this
    /// registry has a backend and that chunk was ever written. A chunk
    /// that was saved while still below its overflow threshold was never
    /// split, so replaying its cells back through `Chunk::insert`
    /// reconstructs the exact tube layout it had before eviction.
    fn refault(&self, key: &ChunkKey) -> Option<Vec<Cell>> {
        let backend = self.backend.lock().unwrap();
        let backend = backend.as_ref()?;
        let postfix = chunk_postfix(backend.subset.as_ref(), key.depth());
        let file_name = format!("{}.{}", key.file_stem(&postfix), backend.storage.extension());
        if !backend.endpoint.exists(&file_name) {
            return None;
        }
        let bytes = backend.endpoint.get(&file_name).ok()?;
        backend.storage.deserialize(&bytes, &self.pool).ok()
    }

    pub fn lookup(&self, key: &ChunkKey) -> Option<Arc<ReffedChunk>> {
        self.resident.lock().unwrap().get(key).cloned()
    }

    /// Routes one cell into the tree, descending from the base depth
    /// until it lands in a chunk that accepts it, splitting chunks along
    /// the way as their overflow threshold is crossed. Every chunk the
    /// cell (or a descendant cell produced by a split) passes through is
    /// marked in `clipper` and has its hierarchy count incremented, so
    /// every ancestor's count stays a running total of its subtree.
    pub fn add_point(&self, cell: Cell, clipper: &mut Clipper) {
        let climber = Climber::new(self.base_depth);
        self.add_point_from(cell, climber, clipper);
    }

    /// The chunk that just split is not itself credited with any of the
    /// cells it drained; each is re-walked one depth further and
    /// re-inserted independently via this same routine, so the
    /// hierarchy count lands on whichever descendant chunk ends up
    /// holding it, and no cell is ever double-counted.
    fn add_point_from(&self, cell: Cell, mut climber: Climber, clipper: &mut Clipper) {
        let mut cell = cell;
        loop {
            let key = climber.key();
            let chunk = self.get_or_create(key);
            clipper.mark(key, &chunk);

            match chunk.chunk().insert(cell) {
                Insert::Placed => {
                    self.hierarchy.increment(key, 1);
                    return;
                }
                Insert::AlreadySplit(returned) => {
                    cell = returned;
                    climber.step(cell.point(), &self.root_cube);
                }
                Insert::JustSplit(drained) => {
                    for drained_cell in drained {
                        let mut sub_climber = climber;
                        sub_climber.step(drained_cell.point(), &self.root_cube);
                        self.add_point_from(drained_cell, sub_climber, clipper);
                    }
                    return;
                }
            }
        }
    }

    /// Total resident point count across every chunk currently in
    /// memory, used by tests to check conservation.
    pub fn resident_point_count(&self) -> usize {
        self.resident
            .lock()
            .unwrap()
            .values()
            .map(|c| c.chunk().num_points())
            .sum()
    }

    /// Persists every resident chunk without removing it, so concurrent
    /// inserts may continue; calling this twice in a row with no
    /// intervening inserts writes the same bytes both times.
    pub fn save(
        &self,
        endpoint: &dyn crate::endpoint::Endpoint,
        storage: &dyn crate::storage::ChunkStorage,
        subset: Option<&Subset>,
    ) -> crate::errors::Result<()> {
        let resident: Vec<_> = self.resident.lock().unwrap().iter().map(|(k, v)| (*k, v.clone())).collect();
        for (key, chunk) in resident {
            let cells = chunk.chunk().snapshot();
            if cells.is_empty() {
                continue;
            }
            let bytes = storage.serialize(&cells)?;
            let postfix = chunk_postfix(subset, key.depth());
            let name = format!("{}.{}", key.file_stem(&postfix), storage.extension());
            endpoint.put(&name, &bytes)?;
            // `cells` is a snapshot copy distinct from what the chunk's
            // tubes still hold, so its buffers are free to recycle now
            // that they've been copied into `bytes`.
            for cell in cells {
                self.pool.release(cell.into_parts().1);
            }
        }
        Ok(())
    }

    /// Drains and persists the chunks named in `keys` (as produced by a
    /// `Clipper::clip` call), then removes them from the resident map so
    /// a later reference re-deserialises them from scratch.
    pub fn evict(
        &self,
        keys: &[ChunkKey],
        endpoint: &dyn crate::endpoint::Endpoint,
        storage: &dyn crate::storage::ChunkStorage,
        subset: Option<&Subset>,
    ) -> crate::errors::Result<()> {
        for key in keys {
            let chunk = self.resident.lock().unwrap().remove(key);
            if let Some(chunk) = chunk {
                let cells = chunk.chunk().drain();
                if !cells.is_empty() {
                    let bytes = storage.serialize(&cells)?;
                    let postfix = chunk_postfix(subset, key.depth());
                    let name = format!("{}.{}", key.file_stem(&postfix), storage.extension());
                    endpoint.put(&name, &bytes)?;
                    for cell in cells {
                        self.pool.release(cell.into_parts().1);
                    }
                }
            }
        }
        Ok(())
    }

    /// Combines `other` into `self`: chunks present in both have their
    /// cells concatenated and re-run through overflow/split, which
    /// already walks `hierarchy.increment` for every landing chunk;
    /// chunks present only in `other` are adopted wholesale, with their
    /// point count added to `self`'s hierarchy once, directly, since no
    /// `add_point` call happens for them to do it. Folding `other`'s
    /// whole hierarchy on top regardless of which branch ran would
    /// double-count every key the overlap branch already walked.
    pub fn merge(&self, other: &Registry, clipper: &mut Clipper) {
        let other_chunks: Vec<_> = other.resident.lock().unwrap().iter().map(|(k, v)| (*k, v.clone())).collect();
        for (key, their_chunk) in other_chunks {
            let overlaps = self.resident.lock().unwrap().contains_key(&key);
            if overlaps {
                for cell in their_chunk.chunk().drain() {
                    self.add_point(cell, clipper);
                }
            } else {
                let count = their_chunk.chunk().num_points() as u64;
                self.hierarchy.increment(key, count);
                self.resident.lock().unwrap().insert(key, their_chunk);
            }
        }
    }

    /// Releases every resident chunk without persisting, used to tear
    /// down a transient Builder (e.g. a merged-in subset) once its
    /// content has already been adopted elsewhere.
    pub fn purge(&self) {
        self.resident.lock().unwrap().clear();
    }

    /// Faults every persisted chunk this registry's backend knows about
    /// into residency, without waiting for an `add_point` to land on
    /// each key the way `get_or_create`'s lazy refault otherwise
    /// requires. Needed before `merge`: a registry awakened purely to be
    /// folded into another one (as `Merger` does for every sibling
    /// subset) never inserts a single point itself, so nothing would
    /// ever trigger the lazy path.
    ///
    /// Walks down from the base depth, stopping at any key whose chunk
    /// turns out non-empty (a genuine leaf) and descending into a key's
    /// children only when it refaults empty, meaning its cells live one
    /// depth further down after a split.
    pub fn hydrate(&self) {
        self.hydrate_from(ChunkKey::root(self.base_depth));
    }

    fn hydrate_from(&self, key: ChunkKey) {
        if self.hierarchy.count_at(&key) == 0 {
            return;
        }
        let chunk = self.get_or_create(key);
        if chunk.chunk().num_points() > 0 {
            return;
        }
        for octant in 0..8u8 {
            self.hydrate_from(key.child(octant));
        }
    }

    /// Every chunk key whose cube intersects `bounds`, down to
    /// `max_depth`, pruned by the hierarchy's point counts so empty
    /// subtrees are never descended into. This is the full extent of
    /// query planning this engine does: a reader combines the returned
    /// keys with `ChunkKey::file_stem` to know which chunk blobs to
    /// fetch for a bounding-box request; it does not rank, cache, or
    /// stream results itself.
    pub fn query(&self, bounds: &Bounds, max_depth: u32) -> Vec<ChunkKey> {
        let mut results = Vec::new();
        self.query_from(ChunkKey::root(self.base_depth), bounds, max_depth, &mut results);
        results
    }

    fn query_from(&self, key: ChunkKey, bounds: &Bounds, max_depth: u32, results: &mut Vec<ChunkKey>) {
        if self.hierarchy.count_at(&key) == 0 {
            return;
        }
        if !key.cube(&self.root_cube).intersects(bounds) {
            return;
        }
        results.push(key);
        if key.depth() >= max_depth {
            return;
        }
        for octant in 0..8u8 {
            self.query_from(key.child(octant), bounds, max_depth, results);
        }
    }
}
