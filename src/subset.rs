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

use serde::{Deserialize, Serialize};

/// Identifies this build as one of `of` horizontal shards (1-based `id`)
/// splitting the root cube's children at the depth where the number of
/// nodes first reaches or exceeds `of`. `of` is required to be a power
/// of 8 so that depth divides evenly: `shared_depth = log8(of)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Subset {
    id: u64,
    of: u64,
}

impl Subset {
    pub fn new(id: u64, of: u64) -> Option<Self> {
        if id == 0 || id > of || !is_power_of_eight(of) {
            return None;
        }
        Some(Subset { id, of })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn of(&self) -> u64 {
        self.of
    }

    /// The depth at which the root cube's nodes are partitioned one per
    /// subset: `8^shared_depth == of`.
    pub fn shared_depth(&self) -> u32 {
        let mut depth = 0;
        let mut n = 1u64;
        while n < self.of {
            n *= 8;
            depth += 1;
        }
        depth
    }

    /// `true` if `position` at `depth` falls within this subset's share
    /// of the root cube, addressed as a flat index into the `of`
    /// same-depth nodes in row-major xyz order.
    pub fn owns(&self, depth: u32, position: [u64; 3]) -> bool {
        if depth < self.shared_depth() {
            return true;
        }
        let span = 1u64 << self.shared_depth();
        let [x, y, z] = [
            position[0] >> (depth - self.shared_depth()),
            position[1] >> (depth - self.shared_depth()),
            position[2] >> (depth - self.shared_depth()),
        ];
        let flat = x * span * span + y * span + z;
        flat + 1 == self.id
    }

    /// Suffix appended to a subset's metadata files (and to chunk files
    /// below the shared depth, per `ChunkKey::file_stem`'s caller), e.g.
    /// `-3`; the un-sharded case has no postfix.
    pub fn postfix(&self) -> String {
        format!("-{}", self.id)
    }
}

fn is_power_of_eight(n: u64) -> bool {
    if n == 0 {
        return false;
    }
    let mut v = n;
    while v > 1 {
        if v % 8 != 0 {
            return false;
        }
        v /= 8;
    }
    true
}
