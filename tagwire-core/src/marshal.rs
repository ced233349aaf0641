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

use crate::channel::Channel;
use crate::communicator::Communicator;
use crate::error::Error;
use crate::slot::TagSlotTable;
use crate::types::{ClassTag, CommitTag, WireTag};

/// Capability of every type that travels through a [`Communicator`].
///
/// `encode` and `decode` must be mirror images: the communicator calls made by
/// `decode` follow, in order and shape, the calls made by `encode`. A typical
/// implementation:
///
/// 1. stages flags, counts and class tags into its table,
/// 2. writes (reads) the header with [`Communicator::write_header`],
/// 3. moves every field, feeding each result into an
///    [`Accumulator`](crate::error::Accumulator) so that one failed field does
///    not stop the others.
pub trait Marshal {
    /// The instance's header table, sized for its schema on first call.
    fn slot_table(&mut self) -> &mut TagSlotTable;

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error>;

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error>;

    /// Wire tag of this instance on `channel`, assigned on first use and
    /// reused afterwards.
    fn wire_tag(&mut self, channel: &mut dyn Channel) -> WireTag {
        self.slot_table().own_wire_tag(channel)
    }
}

/// A member of an open family whose concrete type is only known from the wire.
pub trait Polymorphic: Marshal {
    fn class_tag(&self) -> ClassTag;
}

/// Primitive element types a channel can carry.
pub trait Scalar: Copy + Default + 'static {
    fn send(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[Self],
    ) -> Result<(), Error>;

    fn receive(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [Self],
    ) -> Result<(), Error>;
}

impl Scalar for i32 {
    fn send(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[Self],
    ) -> Result<(), Error> {
        channel.send_ints(wire_tag, commit, data)
    }

    fn receive(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [Self],
    ) -> Result<(), Error> {
        channel.receive_ints(wire_tag, commit, out)
    }
}

impl Scalar for f64 {
    fn send(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[Self],
    ) -> Result<(), Error> {
        channel.send_doubles(wire_tag, commit, data)
    }

    fn receive(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [Self],
    ) -> Result<(), Error> {
        channel.receive_doubles(wire_tag, commit, out)
    }
}

impl Scalar for u8 {
    fn send(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[Self],
    ) -> Result<(), Error> {
        channel.send_bytes(wire_tag, commit, data)
    }

    fn receive(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [Self],
    ) -> Result<(), Error> {
        channel.receive_bytes(wire_tag, commit, out)
    }
}

impl Scalar for bool {
    fn send(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[Self],
    ) -> Result<(), Error> {
        let bytes: Vec<u8> = data.iter().map(|&b| b as u8).collect();
        channel.send_bytes(wire_tag, commit, &bytes)
    }

    fn receive(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [Self],
    ) -> Result<(), Error> {
        let mut bytes = vec![0u8; out.len()];
        channel.receive_bytes(wire_tag, commit, &mut bytes)?;
        for (dst, src) in out.iter_mut().zip(bytes) {
            *dst = match src {
                0 => false,
                1 => true,
                other => return Err(Error::invalid_data(format!("invalid bool byte {}", other))),
            };
        }
        Ok(())
    }
}

impl Scalar for i64 {
    // carried as two ints, low word first
    fn send(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[Self],
    ) -> Result<(), Error> {
        let words: Vec<i32> = data
            .iter()
            .flat_map(|&v| [v as i32, (v >> 32) as i32])
            .collect();
        channel.send_ints(wire_tag, commit, &words)
    }

    fn receive(
        channel: &mut dyn Channel,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [Self],
    ) -> Result<(), Error> {
        let mut words = vec![0i32; out.len() * 2];
        channel.receive_ints(wire_tag, commit, &mut words)?;
        for (dst, pair) in out.iter_mut().zip(words.chunks_exact(2)) {
            *dst = (pair[0] as u32 as i64) | ((pair[1] as i64) << 32);
        }
        Ok(())
    }
}
