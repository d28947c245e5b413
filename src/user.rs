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

/// The trait Evict defines what runs when an entry leaves the LRU
///
/// It is called exactly once per entry that leaves the cache, be it for
/// capacity overflow, explicit removal or a full clear.
/// It runs synchronously on the thread that triggered the eviction and it
/// must **not** try to use the cache that is calling it.
pub trait Evict<K, V> {
    /// run every time an entry is pushed out of the cache.
    /// The entry is already unlinked when this runs, but the caller still
    /// gets it back when the operation returns it
    fn on_evict(&mut self, key: &K, val: &V);
}

/// The simplest of implementation for eviction:
/// No callback, don't take up space and don't  do anything
#[derive(Default, Debug, Clone, Copy)]
pub struct NoEvict {}

impl<K, V> Evict<K, V> for NoEvict {
    #[inline]
    fn on_evict(&mut self, _key: &K, _val: &V) {}
}

/// Any closure taking the key and the value works as eviction callback,
/// boxed closures included
impl<K, V, F> Evict<K, V> for F
where
    F: FnMut(&K, &V),
{
    #[inline]
    fn on_evict(&mut self, key: &K, val: &V) {
        (self)(key, val)
    }
}
