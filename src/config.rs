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
use crate::subset::Subset;
use crate::Point;
use nalgebra::Vector3;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Below this, the clip cadence heuristic would clip so often the
/// constant per-cycle cost would dominate over actual insert work; the
/// original build tool enforces the same floor rather than trusting a
/// small configured value outright.
const MIN_SLEEP_COUNT: u64 = 65_536;

/// Wraps the JSON configuration document, exposing every field as a
/// typed accessor with its documented default, and pulling typed values
/// out on demand rather than committing to a rigid
/// `#[derive(Deserialize)]` struct up front, so newer optional fields
/// don't require a schema migration.
#[derive(Debug, Clone)]
pub struct Config {
    doc: Value,
}

impl Config {
    pub fn parse(json: &str) -> Result<Config> {
        let doc: Value = serde_json::from_str(json)?;
        Ok(Config { doc })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        Config::parse(&text)
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    /// Input paths, with any directory entries expanded to the regular
    /// files directly inside them (recursively) so a config can point at
    /// a whole drop folder instead of enumerating every file by hand.
    pub fn input(&self) -> Result<Vec<String>> {
        let raw: Vec<String> = match self.doc.get("input") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            _ => return Err(Error::from(ErrorKind::Config("missing required field: input".into()))),
        };

        let mut expanded = Vec::new();
        for entry in raw {
            let path = Path::new(&entry);
            if path.is_dir() {
                for dirent in walkdir::WalkDir::new(path).into_iter().filter_map(std::result::Result::ok) {
                    if dirent.file_type().is_file() {
                        expanded.push(dirent.path().to_string_lossy().into_owned());
                    }
                }
            } else {
                expanded.push(entry);
            }
        }
        Ok(expanded)
    }

    pub fn output(&self) -> Result<String> {
        self.doc
            .get("output")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::from(ErrorKind::Config("missing required field: output".into())))
    }

    pub fn tmp(&self) -> String {
        self.doc
            .get("tmp")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| std::env::temp_dir().to_string_lossy().into_owned())
    }

    /// `(work_threads, clip_threads)`. A bare number splits evenly
    /// between the two pools (rounded so the work pool gets the larger
    /// share); a two-element array assigns each directly.
    pub fn threads(&self) -> (usize, usize) {
        match self.doc.get("threads") {
            Some(Value::Array(items)) if items.len() == 2 => {
                let work = items[0].as_u64().unwrap_or(4) as usize;
                let clip = items[1].as_u64().unwrap_or(4) as usize;
                (work.max(1), clip.max(1))
            }
            Some(v) => {
                let total = v.as_u64().unwrap_or(8).max(2) as usize;
                let work = total - total / 4;
                (work.max(1), (total - work).max(1))
            }
            None => {
                let total = num_cpus::get().max(2);
                let work = total - total / 4;
                (work.max(1), (total - work).max(1))
            }
        }
    }

    /// `splits` is `log2(gridSpan)`; this returns `gridSpan` directly.
    pub fn grid_span(&self) -> u32 {
        let splits = self.doc.get("splits").and_then(Value::as_u64).unwrap_or(8);
        1u32 << splits
    }

    pub fn overflow_depth(&self) -> u32 {
        self.doc.get("overflowDepth").and_then(Value::as_u64).unwrap_or(4) as u32
    }

    pub fn overflow_ratio(&self) -> f64 {
        self.doc.get("overflowRatio").and_then(Value::as_f64).unwrap_or(0.5)
    }

    /// Overflow threshold in cells, derived from `gridSpan` and the
    /// configured ratio so heavier `splits` configurations absorb
    /// proportionally more before cascading into a split.
    pub fn overflow_threshold(&self) -> usize {
        let span = f64::from(self.grid_span());
        (span * span * self.overflow_ratio()).max(1.0) as usize
    }

    pub fn data_storage(&self) -> String {
        self.doc
            .get("dataStorage")
            .and_then(Value::as_str)
            .unwrap_or("laszip")
            .to_string()
    }

    pub fn hierarchy_storage(&self) -> String {
        self.doc
            .get("hierarchyStorage")
            .and_then(Value::as_str)
            .unwrap_or("json")
            .to_string()
    }

    pub fn sleep_count(&self) -> u64 {
        let configured = self.doc.get("sleepCount").and_then(Value::as_u64).unwrap_or(MIN_SLEEP_COUNT);
        configured.max(MIN_SLEEP_COUNT)
    }

    pub fn trust_headers(&self) -> bool {
        self.doc.get("trustHeaders").and_then(Value::as_bool).unwrap_or(true)
    }

    pub fn force(&self) -> bool {
        self.doc.get("force").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn verbose(&self) -> bool {
        self.doc.get("verbose").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn delta(&self) -> Delta {
        let scale = self.vec3_or(self.doc.get("scale"), 0.01);
        let offset = self.vec3_or(self.doc.get("offset"), 0.0);
        Delta::new(scale, offset)
    }

    fn vec3_or(&self, value: Option<&Value>, default: f64) -> Vector3<f64> {
        match value {
            Some(Value::Array(items)) if items.len() == 3 => Vector3::new(
                items[0].as_f64().unwrap_or(default),
                items[1].as_f64().unwrap_or(default),
                items[2].as_f64().unwrap_or(default),
            ),
            Some(v) => {
                let scalar = v.as_f64().unwrap_or(default);
                Vector3::new(scalar, scalar, scalar)
            }
            None => Vector3::new(default, default, default),
        }
    }

    /// The conforming bounds a build should index into, given as
    /// `[xmin, ymin, zmin, xmax, ymax, zmax]`. Automatic inference from
    /// input file headers (what a full `entwine infer` pass would do)
    /// is out of scope for the indexing engine itself; callers that
    /// need it run their own pre-pass and feed the result in here.
    pub fn bounds(&self) -> Result<Bounds> {
        let array = self
            .doc
            .get("bounds")
            .and_then(Value::as_array)
            .filter(|a| a.len() == 6)
            .ok_or_else(|| Error::from(ErrorKind::Config("missing required field: bounds".into())))?;
        let n = |i: usize| array[i].as_f64().unwrap_or(0.0);
        Ok(Bounds::new(Point::new(n(0), n(1), n(2)), Point::new(n(3), n(4), n(5))))
    }

    /// The raw reprojection document, if any, passed through verbatim to
    /// whichever executor performs SRS transforms; this layer never
    /// interprets it.
    pub fn reprojection(&self) -> Option<&Value> {
        self.doc.get("reprojection")
    }

    pub fn subset(&self) -> Result<Option<Subset>> {
        match self.doc.get("subset") {
            None => Ok(None),
            Some(v) => {
                let id = v
                    .get("id")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::from(ErrorKind::Config("subset.id missing".into())))?;
                let of = v
                    .get("of")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::from(ErrorKind::Config("subset.of missing".into())))?;
                Subset::new(id, of)
                    .map(Some)
                    .ok_or_else(|| Error::from(ErrorKind::Config(format!("invalid subset ({}, {})", id, of))))
            }
        }
    }

    /// Clones this config with `subset.id` replaced, used by `Merger` to
    /// awaken each sibling subset in turn without re-reading the
    /// original config document from disk.
    pub fn with_subset_id(&self, id: u64) -> Config {
        let mut doc = self.doc.clone();
        if let Some(subset) = doc.get_mut("subset") {
            subset["id"] = Value::from(id);
        }
        Config { doc }
    }

    /// Whether the output already holds an index this build should
    /// resume (awaken) rather than (re)initialize — mirrors the
    /// original build tool's constructor check: an existing metadata
    /// file wins unless `force` says to ignore it.
    pub fn is_continuation(&self, output_dir: &Path, postfix: &str) -> bool {
        if self.force() {
            return false;
        }
        output_dir.join(format!("entwine{}.json", postfix)).is_file()
    }
}
