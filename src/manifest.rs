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

/// An input file's ingestion state, persisted alongside the tree so a
/// restarted build knows which files still need (re-)processing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FileStatus {
    /// Not yet attempted, or a previous attempt was interrupted before
    /// every point was inserted; a restart reprocesses it from scratch.
    Outstanding,
    /// Fully streamed and inserted; a restart skips it.
    Inserted,
    /// Explicitly excluded, e.g. it failed schema/bounds validation
    /// during a dry pass.
    Omitted,
    /// Every retry was exhausted; recorded so a restart does not loop on
    /// the same unrecoverable file forever.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub status: FileStatus,
    pub points: Option<u64>,
    /// Points streamed from this file that fell outside the index's
    /// conforming bounds and were never inserted. Tracked separately
    /// from `points` (which counts only successful inserts) so the two
    /// add up to the file's true point count for conservation checks.
    pub out_of_bounds: u64,
}

impl FileInfo {
    pub fn outstanding(path: impl Into<String>) -> Self {
        FileInfo { path: path.into(), status: FileStatus::Outstanding, points: None, out_of_bounds: 0 }
    }
}

/// The append-only record of every input file an index was built from:
/// its origin id is its position in this list. Origin ids are stable
/// across restarts because the manifest is written before the first
/// point of a build is ever inserted and never reordered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    files: Vec<FileInfo>,
}

impl Manifest {
    pub fn new(files: Vec<FileInfo>) -> Self {
        Manifest { files }
    }

    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, origin: u64) -> Option<&FileInfo> {
        self.files.get(origin as usize)
    }

    pub fn set_status(&mut self, origin: u64, status: FileStatus) {
        if let Some(info) = self.files.get_mut(origin as usize) {
            info.status = status;
        }
    }

    pub fn set_points(&mut self, origin: u64, points: u64) {
        if let Some(info) = self.files.get_mut(origin as usize) {
            info.points = Some(points);
        }
    }

    pub fn add_out_of_bounds(&mut self, origin: u64, count: u64) {
        if let Some(info) = self.files.get_mut(origin as usize) {
            info.out_of_bounds += count;
        }
    }

    /// Origins still needing (re-)processing on this run: everything
    /// that isn't already `Inserted` or permanently `Omitted`/`Error`.
    pub fn outstanding(&self) -> impl Iterator<Item = u64> + '_ {
        self.files.iter().enumerate().filter_map(|(i, info)| {
            if info.status == FileStatus::Outstanding {
                Some(i as u64)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outstanding_skips_inserted_and_omitted() {
        let mut manifest = Manifest::new(vec![
            FileInfo::outstanding("a.laz"),
            FileInfo::outstanding("b.laz"),
            FileInfo::outstanding("c.laz"),
        ]);
        manifest.set_status(0, FileStatus::Inserted);
        manifest.set_status(2, FileStatus::Omitted);
        let remaining: Vec<_> = manifest.outstanding().collect();
        assert_eq!(remaining, vec![1]);
    }
}
