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

use entwine::config::Config;
use entwine::executor::RawExecutor;
use entwine::merger::Merger;
use entwine::Builder;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "entwine-build")]
enum Command {
    /// Build (or resume building) an index from a JSON config file.
    Build {
        #[structopt(parse(from_os_str))]
        config: PathBuf,
    },
    /// Merge every sibling subset of a sharded build back into subset 0.
    Merge {
        #[structopt(parse(from_os_str))]
        config: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Config {
    match Config::from_path(path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {}", err);
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::init();
    let command = Command::from_args();

    let result = match command {
        Command::Build { config } => {
            let config = load_config(&config);
            Builder::new(config, Box::new(RawExecutor)).and_then(|builder| {
                builder.go()?;
                builder.save()
            })
        }
        Command::Merge { config } => {
            let config = load_config(&config);
            Merger::new(config.clone(), || Box::new(RawExecutor) as Box<dyn entwine::executor::Executor>)
                .and_then(|mut merger| merger.go(&config, || Box::new(RawExecutor)))
        }
    };

    if let Err(err) = result {
        eprintln!("fatal build error: {}", err);
        process::exit(2);
    }
}
