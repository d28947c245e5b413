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

//! Thread-safe wrappers over the single-owner [`LRU`]
//!
//! * [`SharedLRU`]: one lock held for the whole of every operation
//! * [`ShardedLRU`]: keys are split over N independent LRUs, each with its
//!   own lock, so unrelated keys rarely contend
//!
//! Values are cloned out of the lock, so use something cheap to clone
//! (`Arc<V>`, `bytes`, ...) for big values.
//! The eviction hook runs with the lock held: it must not touch the cache.

use crate::lru::LRU;
use crate::results::{Error, InsertResult};
use crate::user;
use ::hashbrown::hash_map::DefaultHashBuilder;
use ::parking_lot::Mutex;
use ::std::borrow::Borrow;
use ::std::hash::{BuildHasher, Hash, Hasher};
use ::std::num::NonZeroUsize;

/// An [`LRU`] behind a single mutex
pub struct SharedLRU<K, V, E = user::NoEvict, HB = DefaultHashBuilder> {
    _lru: Mutex<LRU<K, V, E, HB>>,
}

impl<K, V, E, HB> From<LRU<K, V, E, HB>> for SharedLRU<K, V, E, HB> {
    fn from(lru: LRU<K, V, E, HB>) -> Self {
        SharedLRU {
            _lru: Mutex::new(lru),
        }
    }
}

impl<K, V, E, HB> SharedLRU<K, V, E, HB>
where
    K: Hash + Clone + Eq,
    E: user::Evict<K, V>,
    HB: BuildHasher,
{
    pub fn insert(&self, key: K, val: V) -> InsertResult<K, V> {
        self._lru.lock().insert(key, val)
    }
    /// Look up and refresh a key, returning a clone of the value
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self._lru.lock().get(key).cloned()
    }
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self._lru.lock().remove(key)
    }
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self._lru.lock().remove_oldest()
    }
    pub fn len(&self) -> usize {
        self._lru.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self._lru.lock().is_empty()
    }
    pub fn clear(&self) {
        self._lru.lock().clear()
    }
    /// Run more operations under the same lock
    pub fn with_lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut LRU<K, V, E, HB>) -> R,
    {
        f(&mut self._lru.lock())
    }
    pub fn into_inner(self) -> LRU<K, V, E, HB> {
        self._lru.into_inner()
    }
}

/// Keys split over independently locked [`LRU`]s.
///
/// Each shard has its own capacity, so the total is
/// `shards * per_shard_capacity` and the recency order is only per shard.
pub struct ShardedLRU<K, V, E = user::NoEvict, HB = DefaultHashBuilder> {
    _shards: Vec<Mutex<LRU<K, V, E, HB>>>,
    _hasher: DefaultHashBuilder,
}

impl<K: Hash + Clone + Eq, V> ShardedLRU<K, V> {
    pub fn new(
        shards: usize,
        per_shard_capacity: usize,
    ) -> Result<ShardedLRU<K, V>, Error> {
        let capacity =
            NonZeroUsize::new(per_shard_capacity).ok_or(Error::ZeroCapacity)?;
        ShardedLRU::with_shards(shards, |_| {
            LRU::with_evict_and_hasher(
                Some(capacity),
                user::NoEvict {},
                DefaultHashBuilder::default(),
            )
        })
    }
}

impl<K, V, E, HB> ShardedLRU<K, V, E, HB>
where
    K: Hash + Clone + Eq,
    E: user::Evict<K, V>,
    HB: BuildHasher,
{
    /// Build each shard with `make_shard(shard_index)`
    pub fn with_shards<F>(
        shards: usize,
        make_shard: F,
    ) -> Result<ShardedLRU<K, V, E, HB>, Error>
    where
        F: FnMut(usize) -> LRU<K, V, E, HB>,
    {
        if shards == 0 {
            return Err(Error::ZeroShards);
        }
        Ok(ShardedLRU {
            _shards: (0..shards).map(make_shard).map(Mutex::new).collect(),
            _hasher: DefaultHashBuilder::default(),
        })
    }
    pub fn shards(&self) -> usize {
        self._shards.len()
    }
    pub fn insert(&self, key: K, val: V) -> InsertResult<K, V> {
        self.shard(&key).lock().insert(key, val)
    }
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.shard(key).lock().get(key).cloned()
    }
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).lock().remove(key)
    }
    /// Sum of all shards. Each shard is locked in turn, so with concurrent
    /// writers this is only a snapshot
    pub fn len(&self) -> usize {
        self._shards.iter().map(|s| s.lock().len()).sum()
    }
    pub fn is_empty(&self) -> bool {
        self._shards.iter().all(|s| s.lock().is_empty())
    }
    pub fn clear(&self) {
        for shard in self._shards.iter() {
            shard.lock().clear();
        }
    }

    fn shard<Q>(&self, key: &Q) -> &Mutex<LRU<K, V, E, HB>>
    where
        Q: Hash + ?Sized,
    {
        let mut hasher = self._hasher.build_hasher();
        key.hash(&mut hasher);
        let idx = (hasher.finish() % self._shards.len() as u64) as usize;
        &self._shards[idx]
    }
}
