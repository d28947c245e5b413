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

//! Plain configuration values for the primitives.
//!
//! With the `serde` feature they can be loaded from whatever format the
//! application uses. Nothing is checked until `validate()` or `build()`.

use crate::lru::LRU;
use crate::results::Error;
use crate::ring::{Crc32, Ring, RingHash};
use crate::shared::ShardedLRU;
use ::std::hash::Hash;
use ::std::num::NonZeroUsize;

/// virtual replicas per node if not told otherwise
pub const DEFAULT_REPLICAS: usize = 50;
pub const DEFAULT_ENTRIES: usize = 1024;
pub const DEFAULT_SHARDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(default)
)]
pub struct RingConfig {
    /// positions on the ring for each node
    pub replicas: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            replicas: DEFAULT_REPLICAS,
        }
    }
}

impl RingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        match self.replicas {
            0 => Err(Error::ZeroReplicas),
            _ => Ok(()),
        }
    }
    /// Empty ring with the default CRC-32 hash
    pub fn build(&self) -> Result<Ring<Crc32>, Error> {
        Ring::new(self.replicas)
    }
    pub fn build_with<H: RingHash>(&self, hash: H) -> Result<Ring<H>, Error> {
        Ring::with_hash(self.replicas, hash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(default)
)]
pub struct CacheConfig {
    /// maximum number of entries, per shard for sharded caches
    pub entries: usize,
    /// ignore `entries` and never evict. Has to be asked for explicitly
    pub unbounded: bool,
    /// only used by [`CacheConfig::build_sharded`]
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            entries: DEFAULT_ENTRIES,
            unbounded: false,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl CacheConfig {
    pub fn unbounded() -> Self {
        CacheConfig {
            unbounded: true,
            ..CacheConfig::default()
        }
    }
    /// `None` means unbounded
    pub fn capacity(&self) -> Result<Option<NonZeroUsize>, Error> {
        match (self.unbounded, NonZeroUsize::new(self.entries)) {
            (true, _) => Ok(None),
            (false, None) => Err(Error::ZeroCapacity),
            (false, Some(cap)) => Ok(Some(cap)),
        }
    }
    pub fn validate(&self) -> Result<(), Error> {
        self.capacity()?;
        Ok(())
    }
    pub fn build<K: Hash + Clone + Eq, V>(&self) -> Result<LRU<K, V>, Error> {
        match self.capacity()? {
            None => Ok(LRU::unbounded()),
            Some(cap) => LRU::new(cap.get()),
        }
    }
    /// Sharded caches are always bounded: an unbounded config is
    /// [`Error::UnboundedShards`]
    pub fn build_sharded<K: Hash + Clone + Eq, V>(
        &self,
    ) -> Result<ShardedLRU<K, V>, Error> {
        match self.unbounded {
            true => Err(Error::UnboundedShards),
            false => ShardedLRU::new(self.shards, self.entries),
        }
    }
}
