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

mod hash;

pub use hash::{Crc32, RingHash};

use crate::results::Error;
use ::std::num::NonZeroUsize;

/// Consistent hash ring
///
/// Every node is placed on the ring `replicas` times, at the position
/// `hash(i ++ node)` for `i` in `0..replicas`. A key belongs to the node at
/// the first position equal or after `hash(key)`, wrapping around to the
/// smallest position if there is none.
///
/// Adding a node only moves the keys that now fall before one of its
/// positions, everything else stays where it was.
///
/// The ring is append-only: to drop a node build a new ring from the
/// surviving ones with [`Ring::rebuild`] or [`Ring::without`].
///
/// No internal locking: `get` is fine from many threads once all the `add`
/// are done, mixing the two needs a lock around the ring.
#[derive(Clone)]
pub struct Ring<H = Crc32> {
    _hash: H,
    _replicas: NonZeroUsize,
    // sorted, duplicates allowed
    _points: Vec<u32>,
    // on position clash the last node added wins
    _assignment: ::hashbrown::HashMap<u32, String>,
    // in the order they were first added
    _nodes: Vec<String>,
}

impl Ring<Crc32> {
    /// Empty ring using the default CRC-32 hash
    pub fn new(replicas: usize) -> Result<Ring<Crc32>, Error> {
        Ring::with_hash(replicas, Crc32 {})
    }
}

impl<H: RingHash> Ring<H> {
    /// Empty ring with a custom hash.
    /// Zero `replicas` would leave the ring without positions, so it is
    /// rejected
    pub fn with_hash(replicas: usize, hash: H) -> Result<Ring<H>, Error> {
        match NonZeroUsize::new(replicas) {
            None => Err(Error::ZeroReplicas),
            Some(replicas) => Ok(Ring::empty(replicas, hash)),
        }
    }
    /// Ring already populated with `nodes`
    pub fn with_nodes<I, S>(
        replicas: usize,
        hash: H,
        nodes: I,
    ) -> Result<Ring<H>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = Ring::with_hash(replicas, hash)?;
        ring.add(nodes);
        Ok(ring)
    }
    fn empty(replicas: NonZeroUsize, hash: H) -> Ring<H> {
        Ring {
            _hash: hash,
            _replicas: replicas,
            _points: Vec::new(),
            _assignment: ::hashbrown::HashMap::new(),
            _nodes: Vec::new(),
        }
    }
    pub fn replicas(&self) -> NonZeroUsize {
        self._replicas
    }
    /// number of positions on the ring, duplicates included
    pub fn len(&self) -> usize {
        self._points.len()
    }
    pub fn is_empty(&self) -> bool {
        self._points.is_empty()
    }
    /// The distinct nodes added so far, sorted by name
    pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self._nodes.iter().map(String::as_str)
    }
    /// Place the nodes on the ring.
    ///
    /// Adding a node twice puts it on the same positions again, which only
    /// duplicates the positions: lookups do not change.
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added: usize = 0;
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self._replicas.get() {
                let label = format!("{}{}", i, node);
                let point = self._hash.hash(label.as_bytes());
                self._points.push(point);
                self._assignment.insert(point, node.to_owned());
            }
            match self._nodes.binary_search_by(|n| n.as_str().cmp(node)) {
                Ok(_) => {}
                Err(pos) => self._nodes.insert(pos, node.to_owned()),
            }
            added += 1;
        }
        self._points.sort_unstable();
        ::tracing::debug!(
            added,
            points = self._points.len(),
            "nodes added to ring"
        );
    }
    /// The node that owns `key`, `None` only if the ring is empty.
    pub fn get<Q>(&self, key: &Q) -> Option<&str>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        if self._points.is_empty() {
            return None;
        }
        let hash = self._hash.hash(key.as_ref());
        // first position >= hash
        let idx = self._points.partition_point(|point| *point < hash);
        let point = match self._points.get(idx) {
            Some(point) => point,
            // past the last position, back to the start of the ring
            None => self._points.first()?,
        };
        self._assignment.get(point).map(String::as_str)
    }
}

impl<H: RingHash + Clone> Ring<H> {
    /// A brand new ring over `nodes`, same hash and replicas as this one.
    ///
    /// This is the way to remove nodes: the positions of the surviving nodes
    /// do not depend on the removed ones, so only the keys of the removed
    /// nodes move.
    pub fn rebuild<I, S>(&self, nodes: I) -> Ring<H>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = Ring::empty(self._replicas, self._hash.clone());
        ring.add(nodes);
        ring
    }
    /// Rebuild the ring with every node except `node`
    pub fn without(&self, node: &str) -> Ring<H> {
        self.rebuild(self.nodes().filter(|n| *n != node))
    }
}

impl<H> ::std::fmt::Debug for Ring<H> {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        f.debug_struct("Ring")
            .field("replicas", &self._replicas)
            .field("points", &self._points.len())
            .field("nodes", &self._nodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::rand::Rng;

    // "12" hashes to 12: positions can be computed by hand
    fn decimal(data: &[u8]) -> u32 {
        ::std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn zero_replicas_is_rejected() {
        assert_eq!(Ring::new(0).unwrap_err(), Error::ZeroReplicas);
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let ring = Ring::new(3).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.get("anything"), None);
    }

    #[test]
    fn fixed_hash_positions() {
        // nodes 6, 4, 2 with 3 replicas:
        // 2, 4, 6, 12, 14, 16, 22, 24, 26
        let mut ring = Ring::with_hash(3, decimal).unwrap();
        ring.add(&["6", "4", "2"]);
        assert_eq!(ring.len(), 9);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, node) in cases.iter() {
            assert_eq!(ring.get(*key), Some(*node), "key {}", key);
        }

        // 8, 18, 28: 27 now goes to 8 instead of wrapping to 2
        ring.add(&["8"]);
        assert_eq!(ring.get("27"), Some("8"));
        assert_eq!(ring.get("11"), Some("2"));
    }

    #[test]
    fn past_the_last_position_wraps_to_the_first() {
        let ring = Ring::with_nodes(1, decimal, &["5", "10"]).unwrap();
        // positions: 5 ("05" -> 5), 10 ("010" -> 10)
        assert_eq!(ring.get("10"), Some("10"));
        assert_eq!(ring.get("11"), Some("5"));
        assert_eq!(ring.get("4294967295"), Some("5"));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = Ring::with_nodes(50, Crc32 {}, &["a", "b", "c"]).unwrap();
        let b = Ring::with_nodes(50, Crc32 {}, &["c", "a", "b"]).unwrap();
        for i in 0..500 {
            let key = format!("key-{}", i);
            assert_eq!(a.get(&key), b.get(&key));
        }
    }

    #[test]
    fn nodes_are_listed_once_and_sorted() {
        let mut ring = Ring::with_nodes(3, Crc32 {}, &["c", "a"]).unwrap();
        ring.add(&["b", "c"]);
        assert_eq!(ring.nodes().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        let other = Ring::with_nodes(3, Crc32 {}, &["b", "a", "c"]).unwrap();
        assert!(ring.nodes().eq(other.nodes()));
        let smaller = ring.without("b");
        assert_eq!(smaller.nodes().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn re_adding_a_node_changes_nothing() {
        let mut ring = Ring::with_nodes(10, Crc32 {}, &["a", "b"]).unwrap();
        let before: Vec<_> = (0..200)
            .map(|i| ring.get(&format!("k{}", i)).map(str::to_owned))
            .collect();
        ring.add(&["a"]);
        assert_eq!(ring.len(), 30);
        assert_eq!(ring.nodes().collect::<Vec<_>>(), vec!["a", "b"]);
        let after: Vec<_> = (0..200)
            .map(|i| ring.get(&format!("k{}", i)).map(str::to_owned))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn removing_a_node_only_moves_its_keys() {
        let ring =
            Ring::with_nodes(50, Crc32 {}, &["n1", "n2", "n3", "n4"]).unwrap();
        let smaller = ring.without("n3");
        assert_eq!(smaller.nodes().collect::<Vec<_>>(), vec!["n1", "n2", "n4"]);
        assert_eq!(smaller.len(), 150);
        for i in 0..1000 {
            let key = format!("key-{}", i);
            let old = ring.get(&key).unwrap();
            let new = smaller.get(&key).unwrap();
            assert_ne!(new, "n3");
            if old != "n3" {
                assert_eq!(old, new, "key {} moved", key);
            }
        }
    }

    #[test]
    fn replicas_spread_the_load() {
        let nodes = ["10.0.0.1:8000", "10.0.0.2:8000", "10.0.0.3:8000"];
        let ring = Ring::with_nodes(100, Crc32 {}, &nodes).unwrap();
        let mut rng = ::rand::thread_rng();
        let mut counts = ::hashbrown::HashMap::new();
        let samples = 30_000;
        for _ in 0..samples {
            let key: u64 = rng.gen();
            let owner = ring.get(&key.to_string()).unwrap();
            *counts.entry(owner).or_insert(0usize) += 1;
        }
        assert_eq!(counts.len(), nodes.len());
        for node in nodes.iter() {
            let share = counts[node] as f64 / samples as f64;
            assert!(share > 0.15 && share < 0.55, "{} got {}", node, share);
        }
    }

    ::proptest::proptest! {
        #[test]
        fn lookups_are_deterministic_and_total(
            nodes in ::proptest::collection::hash_set("[a-z0-9:.]{1,12}", 1..8),
            replicas in 1usize..20,
            key in ".*",
        ) {
            let ring = Ring::with_nodes(replicas, Crc32 {}, &nodes).unwrap();
            let owner = ring.get(&key);
            ::proptest::prop_assert!(owner.is_some());
            ::proptest::prop_assert_eq!(owner, ring.get(&key));
            ::proptest::prop_assert!(nodes.contains(owner.unwrap()));
        }
    }
}
