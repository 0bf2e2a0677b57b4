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

use crate::config::Config;
use crate::errors::Result;

/// The two pools a build runs on: the work pool streams and routes
/// points from input files; the clip pool persists and evicts chunks a
/// clipper has released. Kept distinct so a save's pressure on the clip
/// pool never starves file ingestion, and vice versa.
pub struct ThreadPools {
    work: rayon::ThreadPool,
    clip: rayon::ThreadPool,
}

impl ThreadPools {
    pub fn new(config: &Config) -> Result<Self> {
        let (work_threads, clip_threads) = config.threads();
        Self::with_counts(work_threads, clip_threads)
    }

    pub fn with_counts(work_threads: usize, clip_threads: usize) -> Result<Self> {
        let work = rayon::ThreadPoolBuilder::new()
            .num_threads(work_threads)
            .thread_name(|i| format!("entwine-work-{}", i))
            .build()
            .map_err(|e| crate::errors::Error::from(crate::errors::ErrorKind::Config(e.to_string())))?;
        let clip = rayon::ThreadPoolBuilder::new()
            .num_threads(clip_threads)
            .thread_name(|i| format!("entwine-clip-{}", i))
            .build()
            .map_err(|e| crate::errors::Error::from(crate::errors::ErrorKind::Config(e.to_string())))?;
        Ok(ThreadPools { work, clip })
    }

    pub fn work(&self) -> &rayon::ThreadPool {
        &self.work
    }

    pub fn clip(&self) -> &rayon::ThreadPool {
        &self.clip
    }

    /// Blocks until both pools have drained every queued task; a save
    /// must not begin before both have quiesced.
    pub fn cycle(&self) {
        self.work.install(|| {});
        self.clip.install(|| {});
    }
}
