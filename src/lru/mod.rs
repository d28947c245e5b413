/*
 * Copyright 2021 Luca Fulchir <luca@fenrirproject.org>
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

mod arena;

pub use arena::Iter;

use crate::results::{Error, InsertResult};
use crate::user;
use ::hashbrown::hash_map::DefaultHashBuilder;
use ::std::borrow::Borrow;
use ::std::hash::{BuildHasher, Hash};
use ::std::num::NonZeroUsize;

/// Simple LRU implementation
///
/// Entries live in stable slots, the hashmap only keeps the index of the slot,
/// so every operation is O(1).
/// note that we store the value as-is, so **if your values are big, or you
/// want to hand them out without copies, use `Box<V>` or `Arc<V>` as the
/// value**
///
/// This is single-owner only, wrap it in a lock (see [`crate::shared`]) if
/// you need to share it between threads.
///
/// Every entry that leaves the cache (capacity overflow, [`LRU::remove`],
/// [`LRU::remove_oldest`], [`LRU::clear`]) goes through the
/// [`user::Evict`] hook exactly once. Replacing the value of a key already
/// present is **not** an eviction.
pub struct LRU<K, V, E = user::NoEvict, HB = DefaultHashBuilder> {
    // None: unbounded, eviction is up to the caller
    _capacity: Option<NonZeroUsize>,
    _hmap: ::hashbrown::HashMap<K, usize, HB>,
    _arena: arena::Arena<K, V>,
    _evict: E,
}

impl<K: Hash + Clone + Eq, V> LRU<K, V> {
    /// LRU that holds at most `entries` elements.
    ///
    /// `entries == 0` is rejected: use [`LRU::unbounded`] if you really want
    /// a cache that never evicts by itself
    pub fn new(entries: usize) -> Result<LRU<K, V>, Error> {
        match NonZeroUsize::new(entries) {
            None => Err(Error::ZeroCapacity),
            Some(cap) => Ok(LRU::with_evict_and_hasher(
                Some(cap),
                user::NoEvict {},
                DefaultHashBuilder::default(),
            )),
        }
    }
    /// LRU with no limit. Entries only go away with `remove`,
    /// `remove_oldest` or `clear`
    pub fn unbounded() -> LRU<K, V> {
        LRU::with_evict_and_hasher(
            None,
            user::NoEvict {},
            DefaultHashBuilder::default(),
        )
    }
}

impl<K: Hash + Clone + Eq, V, E: user::Evict<K, V>, HB: BuildHasher>
    LRU<K, V, E, HB>
{
    pub fn with_evict_and_hasher(
        capacity: Option<NonZeroUsize>,
        evict: E,
        hash_builder: HB,
    ) -> LRU<K, V, E, HB> {
        let prealloc = match capacity {
            // one more: on insert we go over capacity before removing the
            // tail, avoid a reallocation right then
            Some(cap) => cap.get().saturating_add(1),
            None => 0,
        };
        LRU {
            _capacity: capacity,
            _hmap: ::hashbrown::HashMap::with_capacity_and_hasher(
                prealloc,
                hash_builder,
            ),
            _arena: arena::Arena::with_capacity(prealloc),
            _evict: evict,
        }
    }
    /// Swap the eviction hook, keeping all the entries.
    pub fn with_on_evict<E2: user::Evict<K, V>>(
        self,
        evict: E2,
    ) -> LRU<K, V, E2, HB> {
        LRU {
            _capacity: self._capacity,
            _hmap: self._hmap,
            _arena: self._arena,
            _evict: evict,
        }
    }
    /// `None` if the cache is unbounded
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self._capacity
    }
    pub fn len(&self) -> usize {
        self._arena.len()
    }
    pub fn is_empty(&self) -> bool {
        self._arena.len() == 0
    }
    /// Add or update an entry, making it the most recently used.
    ///
    /// If the key was already there its value is replaced and the old one
    /// returned. Otherwise the new entry can push the least recently used
    /// one out, which is then returned after the eviction hook ran.
    pub fn insert(&mut self, key: K, val: V) -> InsertResult<K, V> {
        let existing = self._hmap.get(&key).copied();
        if let Some(idx) = existing {
            self._arena.make_head(idx);
            return match self._arena.val_mut(idx) {
                Some(old_val) => {
                    InsertResult::OldEntry(::std::mem::replace(old_val, val))
                }
                None => InsertResult::Success,
            };
        }
        let idx = self._arena.push_head(key.clone(), val);
        self._hmap.insert(key, idx);
        match self._capacity {
            Some(cap) if self._arena.len() > cap.get() => {
                match self.evict_tail() {
                    Some((k, v)) => {
                        ::tracing::trace!(
                            len = self._arena.len(),
                            "capacity reached, evicted least recently used"
                        );
                        InsertResult::OldTail(k, v)
                    }
                    None => InsertResult::Success,
                }
            }
            _ => InsertResult::Success,
        }
    }
    /// Look up a key and make it the most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self._hmap.get(key)?;
        self._arena.make_head(idx);
        self._arena.get(idx).map(|(_, v)| v)
    }
    /// Same as [`LRU::get`], but the value can be modified in place
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self._hmap.get(key)?;
        self._arena.make_head(idx);
        self._arena.val_mut(idx)
    }
    /// Look up a key without touching the recency order
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self._hmap.get(key)?;
        self._arena.get(idx).map(|(_, v)| v)
    }
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self._hmap.contains_key(key)
    }
    /// Remove a key, if present. The eviction hook runs before the value is
    /// handed back
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self._hmap.remove(key)?;
        let (k, v) = self._arena.remove(idx)?;
        self._evict.on_evict(&k, &v);
        Some(v)
    }
    /// Remove the least recently used entry, if any
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        self.evict_tail()
    }
    /// Remove everything. The eviction hook runs for every entry still in
    /// the cache, from the most to the least recently used.
    /// Afterwards the cache is as good as new
    pub fn clear(&mut self) {
        let dropped = self._arena.len();
        if dropped == 0 {
            return;
        }
        for (k, v) in self._arena.iter() {
            self._evict.on_evict(k, v);
        }
        self._arena.clear();
        self._hmap.clear();
        ::tracing::debug!(dropped, "cache cleared");
    }
    /// Iterate from the most to the least recently used entry.
    /// Does not change the recency order
    pub fn iter(&self) -> Iter<'_, K, V> {
        self._arena.iter()
    }

    fn evict_tail(&mut self) -> Option<(K, V)> {
        let idx = self._arena.tail()?;
        let (k, v) = self._arena.remove(idx)?;
        self._hmap.remove(&k);
        self._evict.on_evict(&k, &v);
        Some((k, v))
    }
}

impl<K, V, E, HB> ::std::fmt::Debug for LRU<K, V, E, HB> {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        f.debug_struct("LRU")
            .field("capacity", &self._capacity)
            .field("len", &self._arena.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::std::cell::RefCell;
    use ::std::rc::Rc;

    fn keys<E, HB>(lru: &LRU<&'static str, u32, E, HB>) -> Vec<&'static str>
    where
        E: user::Evict<&'static str, u32>,
        HB: BuildHasher,
    {
        lru.iter().map(|(k, _)| *k).collect()
    }

    fn recording(
        cap: usize,
    ) -> (
        LRU<&'static str, u32, impl user::Evict<&'static str, u32>>,
        Rc<RefCell<Vec<(&'static str, u32)>>>,
    ) {
        let evicted = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&evicted);
        let lru = LRU::new(cap)
            .unwrap()
            .with_on_evict(move |k: &&'static str, v: &u32| {
                RefCell::borrow_mut(&log).push((*k, *v))
            });
        (lru, evicted)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            LRU::<u32, u32>::new(0).unwrap_err(),
            Error::ZeroCapacity
        );
    }

    #[test]
    fn get_refreshes_recency() {
        let mut lru = LRU::new(2).unwrap();
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.get("a"), Some(&1));
        assert_eq!(lru.insert("c", 3), InsertResult::OldTail("b", 2));

        assert_eq!(lru.get("a"), Some(&1));
        assert_eq!(lru.get("c"), Some(&3));
        assert_eq!(lru.get("b"), None);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn insert_existing_updates_in_place() {
        let (mut lru, evicted) = recording(2);
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.insert("a", 10), InsertResult::OldEntry(1));
        assert_eq!(keys(&lru), vec!["a", "b"]);
        assert_eq!(lru.peek("a"), Some(&10));
        assert_eq!(lru.len(), 2);
        assert!(RefCell::borrow(&evicted).is_empty());
    }

    #[test]
    fn overflow_evicts_the_tail_and_fires_hook() {
        let (mut lru, evicted) = recording(2);
        assert_eq!(lru.insert("a", 1), InsertResult::Success);
        assert_eq!(lru.insert("b", 2), InsertResult::Success);
        assert!(lru.insert("c", 3).evicted());
        assert_eq!(*RefCell::borrow(&evicted), vec![("a", 1)]);
        assert_eq!(keys(&lru), vec!["c", "b"]);
        assert!(!lru.contains_key("a"));
    }

    #[test]
    fn peek_does_not_touch_order() {
        let mut lru = LRU::new(2).unwrap();
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.peek("a"), Some(&1));
        lru.insert("c", 3);
        assert_eq!(lru.peek("a"), None);
    }

    #[test]
    fn get_mut_modifies_and_refreshes() {
        let mut lru = LRU::new(2).unwrap();
        lru.insert("a", 1);
        lru.insert("b", 2);
        *lru.get_mut("a").unwrap() += 5;
        assert_eq!(keys(&lru), vec!["a", "b"]);
        assert_eq!(lru.peek("a"), Some(&6));
    }

    #[test]
    fn remove_fires_hook_once() {
        let (mut lru, evicted) = recording(3);
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.remove("a"), Some(1));
        assert_eq!(lru.remove("a"), None);
        assert_eq!(lru.remove("zzz"), None);
        assert_eq!(*RefCell::borrow(&evicted), vec![("a", 1)]);
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn remove_oldest_takes_the_tail() {
        let (mut lru, evicted) = recording(3);
        assert_eq!(lru.remove_oldest(), None);
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.get("a");
        assert_eq!(lru.remove_oldest(), Some(("b", 2)));
        assert_eq!(lru.remove_oldest(), Some(("a", 1)));
        assert_eq!(lru.remove_oldest(), None);
        assert_eq!(*RefCell::borrow(&evicted), vec![("b", 2), ("a", 1)]);
        assert!(lru.is_empty());
    }

    #[test]
    fn clear_fires_hook_for_every_entry() {
        let (mut lru, evicted) = recording(3);
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.insert("c", 3);
        lru.clear();
        let mut seen = RefCell::borrow(&evicted).clone();
        seen.sort();
        assert_eq!(seen, vec![("a", 1), ("b", 2), ("c", 3)]);
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.get("a"), None);

        // as good as new
        lru.insert("d", 4);
        assert_eq!(keys(&lru), vec!["d"]);
    }

    #[test]
    fn clear_on_empty_cache_is_a_noop() {
        let (mut lru, evicted) = recording(3);
        lru.clear();
        lru.clear();
        assert!(RefCell::borrow(&evicted).is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn unbounded_never_evicts_by_itself() {
        let mut lru = LRU::unbounded();
        for i in 0..1000u32 {
            assert_eq!(lru.insert(i, i), InsertResult::Success);
        }
        assert_eq!(lru.len(), 1000);
        assert_eq!(lru.capacity(), None);
        assert_eq!(lru.remove_oldest(), Some((0, 0)));
    }

    #[test]
    fn owned_keys_lookup_by_borrow() {
        let mut lru: LRU<String, u32> = LRU::new(2).unwrap();
        lru.insert("a".to_string(), 1);
        assert_eq!(lru.get("a"), Some(&1));
        assert!(lru.contains_key("a"));
        assert_eq!(lru.remove("a"), Some(1));
    }

    ::proptest::proptest! {
        #[test]
        fn len_never_exceeds_capacity(
            cap in 1usize..16,
            ops in ::proptest::collection::vec((0u8..32, ::proptest::bool::ANY), 0..200),
        ) {
            let mut lru = LRU::new(cap).unwrap();
            for (key, is_get) in ops {
                match is_get {
                    true => {
                        lru.get(&key);
                    }
                    false => {
                        lru.insert(key, ());
                    }
                }
                ::proptest::prop_assert!(lru.len() <= cap);
                ::proptest::prop_assert_eq!(lru.len(), lru.iter().count());
            }
        }
    }
}
