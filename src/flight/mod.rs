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

//! Duplicate call suppression
//!
//! A [`Group`] makes sure that, for any key, only one unit of work is running
//! at a time. The first caller for a key (the leader) runs its work function,
//! everyone else asking for the same key while it runs (the followers) blocks
//! and gets a clone of the leader's result, errors included.
//!
//! This deduplicates *concurrent* work only: as soon as the leader is done
//! the key is forgotten, and the next call runs the work again. Put a cache
//! in front of it if you want the result to stick around.
//!
//! If the leader panics the key is released anyway and the followers wake
//! up: one of them becomes the new leader and runs its own work function.
//!
//! There is no timeout or cancellation: a follower waits for as long as the
//! leader takes.

use ::parking_lot::{Condvar, Mutex};
use ::std::hash::Hash;
use ::std::sync::Arc;

enum State<T, E> {
    Pending,
    Done(Result<T, E>),
    // the leader panicked before storing anything
    Abandoned,
}

impl<T, E> State<T, E> {
    fn is_pending(&self) -> bool {
        match self {
            State::Pending => true,
            _ => false,
        }
    }
}

/// one in-flight call. The result is written once, then only read
struct Call<T, E> {
    state: Mutex<State<T, E>>,
    done: Condvar,
}

impl<T: Clone, E: Clone> Call<T, E> {
    fn new() -> Self {
        Call {
            state: Mutex::new(State::Pending),
            done: Condvar::new(),
        }
    }
    /// block until the leader is done.
    /// `None` if the leader gave up without a result
    fn wait(&self) -> Option<Result<T, E>> {
        let mut state = self.state.lock();
        while state.is_pending() {
            self.done.wait(&mut state);
        }
        match &*state {
            State::Done(res) => Some(res.clone()),
            _ => None,
        }
    }
    fn finish(&self, res: Result<T, E>) {
        *self.state.lock() = State::Done(res);
        self.done.notify_all();
    }
}

type Pending<K, T, E> = Mutex<::hashbrown::HashMap<K, Arc<Call<T, E>>>>;

/// Releases the key when the leader is done, panics included
struct Landing<'a, K: Hash + Eq, T, E> {
    pending: &'a Pending<K, T, E>,
    call: &'a Call<T, E>,
    key: K,
}

impl<'a, K: Hash + Eq, T, E> Drop for Landing<'a, K, T, E> {
    fn drop(&mut self) {
        // only the leader writes the state, so this can not change under us
        let abandoned = self.call.state.lock().is_pending();
        match abandoned {
            true => {
                // the key must be gone before the followers wake up, or
                // they would find this same call again
                self.pending.lock().remove(&self.key);
                *self.call.state.lock() = State::Abandoned;
                self.call.done.notify_all();
            }
            false => {
                self.pending.lock().remove(&self.key);
            }
        }
    }
}

/// A namespace of work with duplicate suppression
///
/// Internally synchronized: share it between threads by reference or `Arc`.
/// Calls on different keys never wait on each other.
pub struct Group<K, T, E> {
    _pending: Pending<K, T, E>,
}

impl<K, T, E> Default for Group<K, T, E> {
    fn default() -> Self {
        Group {
            _pending: Mutex::new(::hashbrown::HashMap::new()),
        }
    }
}

impl<K: Hash + Eq + Clone, T: Clone, E: Clone> Group<K, T, E> {
    pub fn new() -> Self {
        Self::default()
    }
    /// Run `func`, unless a call for the same key is already running: then
    /// wait for it and return its result.
    ///
    /// The work runs synchronously on the calling thread. Every caller of
    /// the same execution gets the same `Ok` or `Err`, as returned by the
    /// work function, with no retries.
    pub fn work<F>(&self, key: K, func: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        loop {
            let mut pending = self._pending.lock();
            let existing = pending.get(&key).map(Arc::clone);
            match existing {
                Some(call) => {
                    drop(pending);
                    ::tracing::trace!("joining call already in flight");
                    match call.wait() {
                        Some(res) => return res,
                        None => {
                            ::tracing::trace!(
                                "leader gave up, running the work again"
                            );
                        }
                    }
                }
                None => {
                    let call = Arc::new(Call::new());
                    pending.insert(key.clone(), Arc::clone(&call));
                    drop(pending);
                    ::tracing::trace!("leading new call");
                    return self.lead(key, &call, func);
                }
            }
        }
    }
    /// Number of keys with a call in flight right now
    pub fn in_flight(&self) -> usize {
        self._pending.lock().len()
    }

    fn lead<F>(&self, key: K, call: &Call<T, E>, func: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let landing = Landing {
            pending: &self._pending,
            call,
            key,
        };
        let res = func();
        call.finish(res.clone());
        drop(landing);
        res
    }
}

impl<K, T, E> ::std::fmt::Debug for Group<K, T, E> {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        f.debug_struct("Group")
            .field("in_flight", &self._pending.lock().len())
            .finish()
    }
}
