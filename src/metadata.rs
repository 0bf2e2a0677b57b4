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
use crate::delta::Delta;
use crate::errors::{Error, ErrorKind, Result};
use crate::manifest::Manifest;
use crate::schema::Schema;
use crate::subset::Subset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bumped whenever the on-disk layout changes incompatibly; an index
/// built by a different version refuses to open rather than silently
/// misreading chunk contents.
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    version: u32,
    conforming_bounds: Bounds,
    cubic_bounds: Bounds,
    schema: Schema,
    delta: Delta,
    subset: Option<Subset>,
}

impl Metadata {
    pub fn new(conforming_bounds: Bounds, schema: Schema, delta: Delta, subset: Option<Subset>) -> Self {
        let cubic_bounds = conforming_bounds.cubic();
        Metadata {
            version: CURRENT_VERSION,
            conforming_bounds,
            cubic_bounds,
            schema,
            delta,
            subset,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn conforming_bounds(&self) -> &Bounds {
        &self.conforming_bounds
    }

    pub fn cubic_bounds(&self) -> &Bounds {
        &self.cubic_bounds
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn delta(&self) -> &Delta {
        &self.delta
    }

    pub fn subset(&self) -> Option<Subset> {
        self.subset
    }

    /// Clears the subset marker once every sibling has been folded in,
    /// so the merged index is indistinguishable from a whole build.
    pub fn make_whole(&mut self) {
        self.subset = None;
    }

    /// `""` when this build is not a subset, else `-<id>-<of>`, so every
    /// shard's metadata and chunk files live side by side in the same
    /// output directory without colliding.
    pub fn postfix(&self) -> String {
        self.subset.map(|s| s.postfix()).unwrap_or_default()
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version != CURRENT_VERSION {
            return Err(Error::from(ErrorKind::InvalidVersion(self.version)));
        }
        Ok(())
    }

    fn metadata_path(dir: &Path, postfix: &str) -> std::path::PathBuf {
        dir.join(format!("entwine{}.json", postfix))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(Self::metadata_path(dir, &self.postfix()), bytes)?;
        Ok(())
    }

    pub fn load(dir: &Path, postfix: &str) -> Result<Metadata> {
        let bytes = fs::read(Self::metadata_path(dir, postfix))?;
        let metadata: Metadata = serde_json::from_slice(&bytes)?;
        metadata.check_version()?;
        Ok(metadata)
    }
}

/// The separately persisted, append-only file list, kept apart from
/// `Metadata` so resuming a build after a crash only needs to rewrite
/// the (small, frequently updated) manifest rather than the whole
/// metadata block each time a file finishes.
pub fn manifest_path(dir: &Path, postfix: &str) -> std::path::PathBuf {
    dir.join(format!("entwine-files{}.json", postfix))
}

pub fn save_manifest(dir: &Path, postfix: &str, manifest: &Manifest) -> Result<()> {
    fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(manifest)?;
    fs::write(manifest_path(dir, postfix), bytes)?;
    Ok(())
}

pub fn load_manifest(dir: &Path, postfix: &str) -> Result<Manifest> {
    let bytes = fs::read(manifest_path(dir, postfix))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    #[test]
    fn postfix_empty_without_subset() {
        let metadata = Metadata::new(
            Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 1.0)),
            Schema::default(),
            Delta::default(),
            None,
        );
        assert_eq!(metadata.postfix(), "");
    }

    #[test]
    fn postfix_identifies_subset() {
        let subset = Subset::new(3, 8).unwrap();
        let metadata = Metadata::new(
            Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 1.0)),
            Schema::default(),
            Delta::default(),
            Some(subset),
        );
        assert_eq!(metadata.postfix(), "-3");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir::TempDir::new("entwine-metadata-test").unwrap();
        let metadata = Metadata::new(
            Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(4.0, 4.0, 4.0)),
            Schema::default(),
            Delta::default(),
            None,
        );
        metadata.save(dir.path()).unwrap();
        let loaded = Metadata::load(dir.path(), "").unwrap();
        assert_eq!(loaded.conforming_bounds(), metadata.conforming_bounds());
    }
}
