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

use crate::chunk::Chunk;
use crate::key::ChunkKey;
use fnv::FnvHashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A chunk plus the count of origins currently holding a reference to
/// it. Reaching zero refs makes the chunk eligible for eviction by the
/// clip pool; it does not evict the chunk itself, since another origin
/// may re-touch it before the clip pool gets around to it.
pub struct ReffedChunk {
    chunk: Chunk,
    refs: AtomicUsize,
}

impl ReffedChunk {
    pub fn new(chunk: Chunk) -> Self {
        ReffedChunk { chunk, refs: AtomicUsize::new(0) }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases one reference, returning true if it reached zero.
    fn release(&self) -> bool {
        self.refs.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

/// Tracks the set of chunks one origin (one input file's ingestion
/// worker) has touched since its last clip point. Calling `clip()`
/// periodically bounds per-origin memory: without it, an origin
/// streaming across the whole tree would pin every chunk it has ever
/// visited resident for the rest of the run.
#[derive(Default)]
pub struct Clipper {
    touched: FnvHashSet<ChunkKey>,
}

impl Clipper {
    pub fn new() -> Self {
        Clipper { touched: FnvHashSet::default() }
    }

    /// Marks `key` touched, adding a reference the first time this
    /// clipper has seen it since the last `clip()`.
    pub fn mark(&mut self, key: ChunkKey, chunk: &Arc<ReffedChunk>) {
        if self.touched.insert(key) {
            chunk.add_ref();
        }
    }

    /// Releases a reference for every chunk touched since the last
    /// clip, returning the keys whose ref count reached zero so the
    /// caller can enqueue them for persistence/eviction.
    pub fn clip<F>(&mut self, mut lookup: F) -> Vec<ChunkKey>
    where
        F: FnMut(&ChunkKey) -> Option<Arc<ReffedChunk>>,
    {
        let mut drained = Vec::new();
        for key in self.touched.drain() {
            if let Some(chunk) = lookup(&key) {
                if chunk.release() {
                    drained.push(key);
                }
            }
        }
        drained
    }

    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }
}
