/*
 * Copyright 2021 Luca Fulchir <luker@fenrirproject.org>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/// Configuration errors. Lookups never fail, they return `Option`
#[derive(::thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("ring needs at least one virtual replica per node")]
    ZeroReplicas,
    #[error(
        "bounded cache needs a capacity of at least one entry, \
         use an unbounded cache to opt out of eviction"
    )]
    ZeroCapacity,
    #[error("sharded cache needs at least one shard")]
    ZeroShards,
    #[error("sharded cache must be bounded, give every shard a capacity")]
    UnboundedShards,
}

/// Outcome of inserting into an [`LRU`](crate::lru::LRU)
#[derive(Debug, PartialEq, Eq)]
pub enum InsertResult<K, V> {
    /// the key was already present: its value was replaced in place and
    /// this is the old one
    OldEntry(V),
    /// the cache was full and this least-recently-used entry was evicted
    OldTail(K, V),
    /// new entry, nothing else changed
    Success,
}

impl<K, V> InsertResult<K, V> {
    /// true if the insert pushed some other entry out of the cache
    pub fn evicted(&self) -> bool {
        match self {
            InsertResult::OldTail(_, _) => true,
            _ => false,
        }
    }
}
