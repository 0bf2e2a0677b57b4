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

/// Describes one attribute dimension carried alongside a point's xyz
/// (color, intensity, classification, ...). Layout is a flat byte range
/// within the cell's opaque data buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimInfo {
    pub name: String,
    pub size: usize,
}

/// The attribute layout shared by every cell in an index. `point_size()`
/// is the number of opaque bytes a `Cell` carries beyond its xyz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    dims: Vec<DimInfo>,
}

impl Schema {
    pub fn new(dims: Vec<DimInfo>) -> Self {
        Schema { dims }
    }

    pub fn dims(&self) -> &[DimInfo] {
        &self.dims
    }

    pub fn point_size(&self) -> usize {
        self.dims.iter().map(|d| d.size).sum()
    }
}

impl Default for Schema {
    /// RGB color as the default point attribute set.
    fn default() -> Self {
        Schema::new(vec![
            DimInfo { name: "Red".into(), size: 1 },
            DimInfo { name: "Green".into(), size: 1 },
            DimInfo { name: "Blue".into(), size: 1 },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_size_sums_dims() {
        let schema = Schema::default();
        assert_eq!(schema.point_size(), 3);
    }
}
