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

//! Stable slots for the LRU entries
//!
//! Entries never move once inserted, so the index of a slot can be kept in
//! the hashmap and used for O(1) access. Removed slots go in a free list and
//! are reused by the next insert.
//!
//! The recency order is a doubly linked list threaded through the slots by
//! index: `ll_head` points towards the most recently used entry, `ll_tail`
//! towards the least recently used one.

/// marks the end of the linked list
pub(crate) const NIL: usize = usize::MAX;

struct Entry<K, V> {
    key: K,
    val: V,
}

struct Slot<K, V> {
    // None if the slot is in the free list
    entry: Option<Entry<K, V>>,
    // linked list towards head
    ll_head: usize,
    // linked list towards tail
    ll_tail: usize,
}

pub(crate) struct Arena<K, V> {
    _slots: Vec<Slot<K, V>>,
    _free: Vec<usize>,
    _head: usize,
    _tail: usize,
    _len: usize,
}

impl<K, V> Arena<K, V> {
    pub(crate) fn with_capacity(entries: usize) -> Self {
        Arena {
            _slots: Vec::with_capacity(entries),
            _free: Vec::new(),
            _head: NIL,
            _tail: NIL,
            _len: 0,
        }
    }
    pub(crate) fn len(&self) -> usize {
        self._len
    }
    pub(crate) fn tail(&self) -> Option<usize> {
        match self._tail {
            NIL => None,
            idx => Some(idx),
        }
    }
    /// put a new entry in front of everything else and return its index
    pub(crate) fn push_head(&mut self, key: K, val: V) -> usize {
        let slot = Slot {
            entry: Some(Entry { key, val }),
            ll_head: NIL,
            ll_tail: NIL,
        };
        let idx = match self._free.pop() {
            Some(idx) => {
                self._slots[idx] = slot;
                idx
            }
            None => {
                self._slots.push(slot);
                self._slots.len() - 1
            }
        };
        self.link_head(idx);
        self._len += 1;
        idx
    }
    /// promote an existing entry to the head of the list
    pub(crate) fn make_head(&mut self, idx: usize) {
        if idx == self._head || !self.is_used(idx) {
            return;
        }
        self.unlink(idx);
        self.link_head(idx);
    }
    /// unlink the entry and give back its key and value.
    /// The slot is then free for reuse
    pub(crate) fn remove(&mut self, idx: usize) -> Option<(K, V)> {
        if !self.is_used(idx) {
            return None;
        }
        self.unlink(idx);
        let entry = self._slots[idx].entry.take()?;
        self._free.push(idx);
        self._len -= 1;
        Some((entry.key, entry.val))
    }
    pub(crate) fn get(&self, idx: usize) -> Option<(&K, &V)> {
        match self._slots.get(idx) {
            Some(Slot {
                entry: Some(entry), ..
            }) => Some((&entry.key, &entry.val)),
            _ => None,
        }
    }
    pub(crate) fn val_mut(&mut self, idx: usize) -> Option<&mut V> {
        match self._slots.get_mut(idx) {
            Some(Slot {
                entry: Some(entry), ..
            }) => Some(&mut entry.val),
            _ => None,
        }
    }
    pub(crate) fn clear(&mut self) {
        self._slots.clear();
        self._free.clear();
        self._head = NIL;
        self._tail = NIL;
        self._len = 0;
    }
    /// walk the entries from the most to the least recently used
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            arena: self,
            next: self._head,
            remaining: self._len,
        }
    }

    fn is_used(&self, idx: usize) -> bool {
        match self._slots.get(idx) {
            Some(slot) => slot.entry.is_some(),
            None => false,
        }
    }
    fn link_head(&mut self, idx: usize) {
        self._slots[idx].ll_head = NIL;
        self._slots[idx].ll_tail = self._head;
        match self._head {
            NIL => {
                // first entry, both head and tail
                self._tail = idx;
            }
            old_head => {
                self._slots[old_head].ll_head = idx;
            }
        }
        self._head = idx;
    }
    fn unlink(&mut self, idx: usize) {
        let towards_head = self._slots[idx].ll_head;
        let towards_tail = self._slots[idx].ll_tail;
        match towards_head {
            NIL => self._head = towards_tail,
            node => self._slots[node].ll_tail = towards_tail,
        }
        match towards_tail {
            NIL => self._tail = towards_head,
            node => self._slots[node].ll_head = towards_head,
        }
        self._slots[idx].ll_head = NIL;
        self._slots[idx].ll_tail = NIL;
    }
}

pub struct Iter<'a, K, V> {
    arena: &'a Arena<K, V>,
    next: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NIL {
            return None;
        }
        let slot = &self.arena._slots[self.next];
        self.next = slot.ll_tail;
        self.remaining -= 1;
        slot.entry.as_ref().map(|e| (&e.key, &e.val))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}
