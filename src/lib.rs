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

//! Coordination primitives for a cache partitioned over many peers
//!
//! Three independent pieces, composed by whoever fills the cache:
//! * [`Ring`](ring::Ring): consistent hashing, tells which peer owns a key
//! * [`LRU`](lru::LRU): bounded least-recently-used cache for what we keep
//!   locally
//! * [`Group`](flight::Group): collapses concurrent requests for the same key
//!   into a single execution, so a miss on a hot key does not turn into a
//!   stampede
//!
//! A typical request for key `K` enters the `Group` under `K`, the single
//! execution that survives checks the `LRU`, and on a miss asks the `Ring`
//! whether `K` is local or has to be fetched from a peer. The result goes in
//! the `LRU` and back to every waiter.
//!
//! # Threads
//!
//! * the `Group` is internally synchronized
//! * the `LRU` is single-owner, see [`shared`] for locked and sharded
//!   wrappers
//! * the `Ring` has no lock: concurrent `get` are fine once it is built
//!
//! Transport, serialization and peer discovery are not in here.

pub mod config;
pub mod flight;
pub mod lru;
/// common errors and result for insert operations
pub mod results;
pub mod ring;
pub mod shared;
pub mod user;

pub use flight::Group;
pub use lru::LRU;
pub use results::{Error, InsertResult};
pub use ring::{Crc32, Ring, RingHash};
