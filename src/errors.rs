//
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

use std::io;

error_chain! {
    foreign_links {
        io::Error, Io;
        ::serde_json::Error, Json;
        ::walkdir::Error, WalkDir;
    }

    errors {
        /// A file could not be fetched after exhausting its retry budget.
        /// The file is marked `FileStatus::Error` and the build continues.
        Fetch(origin: u64, attempts: u64) {
            description("fetch failed after exhausting retries")
            display("failed to fetch origin {} after {} attempts", origin, attempts)
        }

        /// A file's contents could not be decoded by the executor. Not
        /// retriable; the file is marked `FileStatus::Error`.
        Decode(origin: u64, message: String) {
            description("point file could not be decoded")
            display("failed to decode origin {}: {}", origin, message)
        }

        /// A write through a chunk storage or endpoint adapter failed.
        /// Fatal to the `save` call that triggered it.
        Storage(message: String) {
            description("storage adapter write failed")
            display("storage error: {}", message)
        }

        /// Merge was attempted on an incompatible pair of builds: the
        /// receiver is not subset 0, the sibling is missing, or the
        /// metadata (bounds, schema, delta) of the two builds disagree.
        Merge(message: String) {
            description("merge precondition violated")
            display("cannot merge: {}", message)
        }

        /// A configuration value was invalid or unusable at startup (e.g.
        /// a non-local tmp path, an uncreatable output directory).
        Config(message: String) {
            description("invalid configuration")
            display("configuration error: {}", message)
        }

        /// Attempt to read a chunk or node id that was never written.
        NodeNotFound {
            description("node not found")
            display("requested node does not exist in this index")
        }

        /// The persisted index on disk is of an unsupported version.
        InvalidVersion(version: u32) {
            description("invalid index version on disk")
            display(
                "index at this output has version {}, only version {} is supported",
                version, crate::metadata::CURRENT_VERSION
            )
        }
    }
}
