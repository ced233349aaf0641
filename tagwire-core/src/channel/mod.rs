// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Transport contract.
//!
//! A [`Channel`] moves primitive arrays addressed by `(wire_tag, commit)` and
//! hands out fresh wire tags. It knows nothing about entities. Two reference
//! transports ship with the crate:
//!
//! - [`StreamChannel`], a sequential byte-stream transport for anything that
//!   is `Read + Write` (sockets, pipes), with [`loopback`] for in-process pairs;
//! - [`MemoryStore`], a keyed store that keeps every record of every commit,
//!   the shape of a checkpoint database.

mod memory;
mod stream;

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

pub use memory::MemoryStore;
pub use stream::{loopback, PipeEnd, StreamChannel, DEFAULT_MAX_RECORD_LEN};

use crate::error::Error;
use crate::types::{CommitTag, WireTag, FIRST_WIRE_TAG};

static NEXT_CHANNEL_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u32);

impl ChannelId {
    pub fn next() -> ChannelId {
        ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Monotonic wire tag source, shared by the handles of one session.
#[derive(Clone, Debug)]
pub struct WireTagAllocator {
    next: Arc<AtomicI32>,
}

impl Default for WireTagAllocator {
    fn default() -> Self {
        WireTagAllocator {
            next: Arc::new(AtomicI32::new(FIRST_WIRE_TAG)),
        }
    }
}

impl WireTagAllocator {
    pub fn allocate(&self) -> WireTag {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// A transport or session endpoint.
///
/// Implementations report every transport problem as an `Err` value and never
/// panic; whether to retry is the caller's decision. Receive calls fill a
/// buffer the caller has already sized, so the expected length is always known
/// and a record of a different length is a [`Error::FrameMismatch`].
pub trait Channel {
    fn identity(&self) -> ChannelId;

    /// A wire tag never handed out before on this channel.
    fn allocate_wire_tag(&mut self) -> WireTag;

    /// Whether every commit stays readable on its own, as in a checkpoint
    /// store. Versioned aggregates always send full topology to such channels.
    fn retains_history(&self) -> bool {
        false
    }

    fn send_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[i32],
    ) -> Result<(), Error>;

    fn send_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[f64],
    ) -> Result<(), Error>;

    fn send_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[u8],
    ) -> Result<(), Error>;

    fn receive_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [i32],
    ) -> Result<(), Error>;

    fn receive_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [f64],
    ) -> Result<(), Error>;

    fn receive_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [u8],
    ) -> Result<(), Error>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn identity(&self) -> ChannelId {
        (**self).identity()
    }

    fn allocate_wire_tag(&mut self) -> WireTag {
        (**self).allocate_wire_tag()
    }

    fn retains_history(&self) -> bool {
        (**self).retains_history()
    }

    fn send_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[i32],
    ) -> Result<(), Error> {
        (**self).send_ints(wire_tag, commit, data)
    }

    fn send_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[f64],
    ) -> Result<(), Error> {
        (**self).send_doubles(wire_tag, commit, data)
    }

    fn send_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[u8],
    ) -> Result<(), Error> {
        (**self).send_bytes(wire_tag, commit, data)
    }

    fn receive_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [i32],
    ) -> Result<(), Error> {
        (**self).receive_ints(wire_tag, commit, out)
    }

    fn receive_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [f64],
    ) -> Result<(), Error> {
        (**self).receive_doubles(wire_tag, commit, out)
    }

    fn receive_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [u8],
    ) -> Result<(), Error> {
        (**self).receive_bytes(wire_tag, commit, out)
    }
}
