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

/// Hash function that places nodes and keys on the ring
///
/// Must be deterministic: the same bytes always give the same position,
/// on every peer, or the peers will not agree on who owns a key.
pub trait RingHash {
    fn hash(&self, data: &[u8]) -> u32;
}

/// Default ring hash: IEEE CRC-32
#[derive(Default, Debug, Clone, Copy)]
pub struct Crc32 {}

impl RingHash for Crc32 {
    #[inline]
    fn hash(&self, data: &[u8]) -> u32 {
        ::crc32fast::hash(data)
    }
}

/// Plain functions and closures work too, mostly useful in tests to pin
/// down exact positions
impl<F> RingHash for F
where
    F: Fn(&[u8]) -> u32,
{
    #[inline]
    fn hash(&self, data: &[u8]) -> u32 {
        (self)(data)
    }
}
