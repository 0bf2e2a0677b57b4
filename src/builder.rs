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
use crate::clip::Clipper;
use crate::config::Config;
use crate::delta::Delta;
use crate::endpoint::{Endpoint, LocalEndpoint};
use crate::errors::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::hierarchy::Hierarchy;
use crate::manifest::{FileInfo, FileStatus, Manifest};
use crate::metadata::{self, Metadata};
use crate::registry::Registry;
use crate::schema::Schema;
use crate::storage::{self, ChunkStorage};
use crate::thread_pools::ThreadPools;
use crate::Cell;
use pbr::ProgressBar;
use rayon::prelude::*;
use std::io::Stderr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FETCH_RETRY_LIMIT: u32 = 8;

/// Fetches one logical input (a path or URL from `Config::input`) to a
/// local path the executor can open. The default implementation treats
/// every input as already-local; remote transports implement this trait
/// themselves and are handed to `Builder::with_fetcher`.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, input: &str, tmp_dir: &Path) -> Result<PathBuf>;
}

struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn fetch(&self, input: &str, _tmp_dir: &Path) -> Result<PathBuf> {
        let path = PathBuf::from(input);
        if !path.is_file() {
            return Err(Error::from(ErrorKind::Fetch(0, 1)));
        }
        Ok(path)
    }
}

/// Orchestrates one build: resolves or awakens the persisted index at
/// `config.output()`, then streams every outstanding input file through
/// an `Executor` and into the `Registry`, clipping and persisting chunks
/// along the way. Leaves out scheduling niceties like progress
/// estimation and SRS auto-detection that depend on transports this
/// crate doesn't implement.
pub struct Builder {
    config: Config,
    metadata: Metadata,
    manifest: Mutex<Manifest>,
    registry: Registry,
    pools: ThreadPools,
    endpoint: Arc<dyn Endpoint>,
    storage: Arc<dyn ChunkStorage>,
    executor: Box<dyn Executor>,
    fetcher: Box<dyn Fetcher>,
    output_dir: PathBuf,
    inserted: AtomicU64,
}

impl Builder {
    pub fn new(config: Config, executor: Box<dyn Executor>) -> Result<Self> {
        Self::with_fetcher(config, executor, Box::new(LocalFetcher))
    }

    pub fn with_fetcher(config: Config, executor: Box<dyn Executor>, fetcher: Box<dyn Fetcher>) -> Result<Self> {
        let output = config.output()?;
        let output_dir = PathBuf::from(&output);
        let subset = config.subset()?;
        let postfix = subset.map(|s| s.postfix()).unwrap_or_default();

        let endpoint: Arc<dyn Endpoint> = Arc::new(LocalEndpoint::new(&output_dir)?);
        let schema = Schema::default();
        let storage: Arc<dyn ChunkStorage> = Arc::from(storage::storage_for(&config.data_storage(), schema.clone())?);

        let is_continuation = config.is_continuation(&output_dir, &postfix);
        let (metadata, manifest) = if is_continuation {
            log::info!("awakening existing index at {}", output_dir.display());
            let metadata = Metadata::load(&output_dir, &postfix)?;
            let manifest = metadata::load_manifest(&output_dir, &postfix)?;
            (metadata, manifest)
        } else {
            log::info!("initializing new index at {}", output_dir.display());
            let bounds = config.bounds()?;
            let delta = config.delta();
            let metadata = Metadata::new(bounds, schema, delta, subset);
            let inputs = config.input()?;
            let manifest = Manifest::new(inputs.into_iter().map(FileInfo::outstanding).collect());
            (metadata, manifest)
        };

        let grid_span = config.grid_span();
        let overflow_threshold = config.overflow_threshold();
        let overflow_depth = config.overflow_depth();
        let point_size = metadata.schema().point_size();
        let registry = Registry::new(*metadata.cubic_bounds(), 0, grid_span, overflow_threshold, overflow_depth, point_size);
        if is_continuation {
            registry.set_backend(Arc::clone(&endpoint), Arc::clone(&storage), subset);
            let loaded = Hierarchy::load(&output_dir.join("h"))?;
            registry.hierarchy().merge(&loaded);
        }
        let pools = ThreadPools::new(&config)?;

        Ok(Builder {
            config,
            metadata,
            manifest: Mutex::new(manifest),
            registry,
            pools,
            endpoint,
            storage,
            executor,
            fetcher,
            output_dir,
            inserted: AtomicU64::new(0),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clears this build's subset marker once a merge has folded in
    /// every sibling, so the persisted metadata reads as a whole index.
    pub fn make_whole(&mut self) {
        self.metadata.make_whole();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn postfix(&self) -> String {
        self.metadata.postfix()
    }

    /// Streams every outstanding input file through the executor and
    /// into the registry, running insert tasks across the work pool.
    pub fn go(&self) -> Result<()> {
        let outstanding: Vec<u64> = self.manifest.lock().unwrap().outstanding().collect();
        log::info!("starting build: {} outstanding files", outstanding.len());

        let progress: Option<Mutex<ProgressBar<Stderr>>> = if self.config.verbose() {
            Some(Mutex::new(ProgressBar::on(std::io::stderr(), outstanding.len() as u64)))
        } else {
            None
        };

        self.pools.work().install(|| {
            outstanding.par_iter().for_each(|&origin| {
                self.process_origin(origin);
                if let Some(bar) = &progress {
                    bar.lock().unwrap().inc();
                }
            });
        });

        log::info!("build finished: {} points inserted", self.inserted.load(Ordering::Relaxed));
        Ok(())
    }

    fn process_origin(&self, origin: u64) {
        let input = match self.manifest.lock().unwrap().get(origin) {
            Some(info) => info.path.clone(),
            None => return,
        };

        match self.insert_one(origin, &input) {
            Ok((inserted, out_of_bounds)) => {
                let mut manifest = self.manifest.lock().unwrap();
                manifest.set_points(origin, inserted);
                manifest.add_out_of_bounds(origin, out_of_bounds);
                manifest.set_status(origin, FileStatus::Inserted);
            }
            Err(err) => {
                log::error!("file {} ({}) failed: {}", origin, input, err);
                self.manifest.lock().unwrap().set_status(origin, FileStatus::Error);
            }
        }
    }

    /// Streams one file's points into the registry, returning
    /// `(inserted, out_of_bounds)`. Every point streamed from the
    /// executor lands in exactly one of those two buckets, so the pair
    /// always sums to the file's true point count.
    fn insert_one(&self, origin: u64, input: &str) -> Result<(u64, u64)> {
        let local_path = self.fetch_with_retry(origin, input)?;

        let mut clipper = Clipper::new();
        let mut inserted: u64 = 0;
        let mut out_of_bounds: u64 = 0;
        let sleep_count = self.config.sleep_count();
        let delta = *self.metadata.delta();
        let schema = self.metadata.schema().clone();
        let bounds = *self.metadata.conforming_bounds();

        let mut insert = |cell: Cell| {
            if bounds.contains(&delta.to_native(cell.point())) {
                self.registry.add_point(cell, &mut clipper);
                inserted += 1;
                self.inserted.fetch_add(1, Ordering::Relaxed);
            } else {
                log::warn!("origin {} produced an out-of-bounds point", origin);
                out_of_bounds += 1;
            }
            if (inserted + out_of_bounds) % sleep_count == 0 {
                self.clip(&mut clipper);
            }
        };

        self.executor.run(&local_path, &delta, &schema, &mut insert)?;
        self.clip(&mut clipper);
        Ok((inserted, out_of_bounds))
    }

    fn clip(&self, clipper: &mut Clipper) {
        let drained = clipper.clip(|key| self.registry.lookup(key));
        if drained.is_empty() {
            return;
        }
        log::debug!("clipping {} chunks", drained.len());
        let subset = self.metadata.subset();
        self.pools.clip().install(|| {
            if let Err(err) =
                self.registry.evict(&drained, self.endpoint.as_ref(), self.storage.as_ref(), subset.as_ref())
            {
                log::error!("chunk eviction failed: {}", err);
            }
        });
    }

    fn fetch_with_retry(&self, origin: u64, input: &str) -> Result<PathBuf> {
        let tmp_dir = PathBuf::from(self.config.tmp());
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetcher.fetch(input, &tmp_dir) {
                Ok(path) => return Ok(path),
                Err(err) if attempt < FETCH_RETRY_LIMIT => {
                    log::warn!("fetch attempt {} for origin {} failed: {}", attempt, origin, err);
                    std::thread::sleep(Duration::from_secs(u64::from(attempt - 1)));
                }
                Err(_) => return Err(Error::from(ErrorKind::Fetch(origin, u64::from(attempt)))),
            }
        }
    }

    /// Drains both thread pools, then persists hierarchy, registry, and
    /// metadata in that order, so a crash between writes never leaves a
    /// metadata file pointing at chunks that were never flushed.
    pub fn save(&self) -> Result<()> {
        self.pools.cycle();
        let postfix = self.postfix();

        let hierarchy_dir = self.output_dir.join("h");
        self.registry.hierarchy().save(&hierarchy_dir)?;
        let subset = self.metadata.subset();
        self.registry.save(self.endpoint.as_ref(), self.storage.as_ref(), subset.as_ref())?;

        let manifest = self.manifest.lock().unwrap().clone();
        metadata::save_manifest(&self.output_dir, &postfix, &manifest)?;
        self.metadata.save(&self.output_dir)?;

        log::info!("save complete at {}", self.output_dir.display());
        Ok(())
    }

    /// Folds `other` (a sibling subset) into `self`, which must be
    /// subset 0. Join semantics: registry, metadata, and hierarchy are
    /// all merged; `other` is left empty.
    pub fn merge(&self, other: &Builder) -> Result<()> {
        let is_subset_zero = self
            .metadata
            .subset()
            .map(|s| s.id() == 1)
            .unwrap_or(false);
        if !is_subset_zero {
            return Err(Error::from(ErrorKind::Merge("merge target must be subset 0".into())));
        }
        other.pools.cycle();
        let mut clipper = Clipper::new();
        self.registry.merge(&other.registry, &mut clipper);
        other.registry.purge();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RawExecutor;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::fs::File;
    use std::io::Write;

    fn write_raw_fixture(path: &Path, points: &[(f64, f64, f64)]) {
        let mut file = File::create(path).unwrap();
        file.write_u64::<LittleEndian>(points.len() as u64).unwrap();
        for (x, y, z) in points {
            file.write_f64::<LittleEndian>(*x).unwrap();
            file.write_f64::<LittleEndian>(*y).unwrap();
            file.write_f64::<LittleEndian>(*z).unwrap();
            file.write_all(&[0u8; 3]).unwrap();
        }
    }

    #[test]
    fn builder_ingests_and_saves_a_single_file() {
        let dir = tempdir::TempDir::new("entwine-builder-test").unwrap();
        let input_path = dir.path().join("a.bin");
        write_raw_fixture(&input_path, &[(0.1, 0.1, 0.1), (0.9, 0.9, 0.9), (0.5, 0.5, 0.5)]);

        let output_dir = dir.path().join("out");
        let config = Config::parse(&format!(
            r#"{{"input":"{}","output":"{}","bounds":[0,0,0,1,1,1],"splits":1,"overflowRatio":1.0,"dataStorage":"binary","threads":2}}"#,
            input_path.display().to_string().replace('\\', "\\\\"),
            output_dir.display().to_string().replace('\\', "\\\\"),
        ))
        .unwrap();

        let builder = Builder::new(config, Box::new(RawExecutor)).unwrap();
        builder.go().unwrap();
        assert_eq!(builder.registry().resident_point_count(), 3);
        builder.save().unwrap();
        assert!(output_dir.join("entwine.json").is_file());
    }

    #[test]
    fn out_of_bounds_points_are_counted_not_inserted() {
        let dir = tempdir::TempDir::new("entwine-builder-oob-test").unwrap();
        let input_path = dir.path().join("a.bin");
        // Two points inside [0,1)^3, one well outside it.
        write_raw_fixture(&input_path, &[(0.1, 0.1, 0.1), (0.9, 0.9, 0.9), (5.0, 5.0, 5.0)]);

        let output_dir = dir.path().join("out");
        let config = Config::parse(&format!(
            r#"{{"input":"{}","output":"{}","bounds":[0,0,0,1,1,1],"splits":1,"overflowRatio":1.0,"dataStorage":"binary","threads":2}}"#,
            input_path.display().to_string().replace('\\', "\\\\"),
            output_dir.display().to_string().replace('\\', "\\\\"),
        ))
        .unwrap();

        let builder = Builder::new(config, Box::new(RawExecutor)).unwrap();
        builder.go().unwrap();
        assert_eq!(builder.registry().resident_point_count(), 2);

        let manifest = builder.manifest.lock().unwrap();
        let info = &manifest.files()[0];
        assert_eq!(info.status, crate::manifest::FileStatus::Inserted);
        assert_eq!(info.points, Some(2));
        assert_eq!(info.out_of_bounds, 1);
    }

    #[test]
    fn unreachable_input_marks_the_file_error_after_retries() {
        let dir = tempdir::TempDir::new("entwine-builder-error-test").unwrap();
        let output_dir = dir.path().join("out");
        let config = Config::parse(&format!(
            r#"{{"input":"{}","output":"{}","bounds":[0,0,0,1,1,1]}}"#,
            dir.path().join("missing.bin").display(),
            output_dir.display(),
        ))
        .unwrap();

        let builder = Builder::new(config, Box::new(RawExecutor)).unwrap();
        builder.go().unwrap();
        let manifest = builder.manifest.lock().unwrap();
        assert_eq!(manifest.files()[0].status, crate::manifest::FileStatus::Error);
    }
}
