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

use std::sync::Mutex;

/// A reusable free-list of `Vec<u8>` buffers, sized to a point's schema
/// width, so steady-state refaulting of chunks evicted earlier in the
/// same build doesn't keep re-allocating one buffer per cell. Callers
/// acquire a buffer, fill it, and release it back once the cell it
/// backed is no longer needed (typically right after that cell has been
/// serialized back out to storage).
pub struct Pool {
    width: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl Pool {
    pub fn new(width: usize) -> Self {
        Pool { width, free: Mutex::new(Vec::new()) }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn acquire(&self) -> Vec<u8> {
        match self.free.lock().unwrap().pop() {
            Some(mut buf) => {
                buf.clear();
                buf.resize(self.width, 0);
                buf
            }
            None => vec![0u8; self.width],
        }
    }

    pub fn release(&self, buf: Vec<u8>) {
        self.free.lock().unwrap().push(buf);
    }

    pub fn outstanding_capacity(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_reuses_buffer() {
        let pool = Pool::new(4);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 4);
        pool.release(buf);
        assert_eq!(pool.outstanding_capacity(), 1);
        let reused = pool.acquire();
        assert_eq!(reused.len(), 4);
        assert_eq!(pool.outstanding_capacity(), 0);
    }
}
