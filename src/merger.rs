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

use crate::builder::Builder;
use crate::config::Config;
use crate::errors::{Error, ErrorKind, Result};
use crate::executor::Executor;
use rayon::prelude::*;

/// Folds every sibling subset of a sharded build back into subset 0.
/// Awakens subsets in batches of roughly `1.2 × thread_count` at a time
/// rather than one at a time, the same ratio the original merge tool
/// uses to keep disk fetches pipelined slightly ahead of merge compute.
pub struct Merger {
    subset_zero: Builder,
    of: u64,
}

impl Merger {
    pub fn new(config: Config, make_executor: impl Fn() -> Box<dyn Executor>) -> Result<Self> {
        let zero_config = config.with_subset_id(1);
        let subset_zero = Builder::new(zero_config, make_executor())?;
        let of = subset_zero
            .metadata()
            .subset()
            .ok_or_else(|| Error::from(ErrorKind::Merge("this path is already whole, no merge needed".into())))?
            .of();
        subset_zero.registry().hydrate();
        Ok(Merger { subset_zero, of })
    }

    /// The whole-index builder merged results land in, usable once
    /// `go` has returned.
    pub fn builder(&self) -> &Builder {
        &self.subset_zero
    }

    /// Merges every sibling into subset 0, then clears the subset marker
    /// and performs the final save.
    pub fn go(&mut self, config: &Config, make_executor: impl Fn() -> Box<dyn Executor> + Sync) -> Result<()> {
        let thread_count = num_cpus::get().max(1);
        let batch_size = ((thread_count as f64) * 1.2).ceil() as u64;

        let mut next = 2u64;
        while next <= self.of {
            let end = (next + batch_size).min(self.of + 1);
            let ids: Vec<u64> = (next..end).collect();
            log::info!("merging subsets {}..{} of {}", next, end - 1, self.of);

            let awakened: Vec<Result<Builder>> = ids
                .par_iter()
                .map(|&id| Builder::new(config.with_subset_id(id), make_executor()))
                .collect();

            for result in awakened {
                let sibling = result?;
                sibling.registry().hydrate();
                self.subset_zero.merge(&sibling)?;
            }

            next = end;
        }

        self.subset_zero.make_whole();
        self.subset_zero.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RawExecutor;

    #[test]
    fn merger_rejects_a_path_that_is_already_whole() {
        let dir = tempdir::TempDir::new("entwine-merger-test").unwrap();
        let output_dir = dir.path().join("out");
        let config = Config::parse(&format!(
            r#"{{"input":[],"output":"{}","bounds":[0,0,0,1,1,1]}}"#,
            output_dir.display(),
        ))
        .unwrap();

        // No subset configured: constructing subset 0 directly should
        // fail the "already whole" check once it loads.
        let result = Merger::new(config, || Box::new(RawExecutor));
        assert!(result.is_err());
    }
}
