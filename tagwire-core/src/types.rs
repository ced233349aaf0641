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

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Stable identifier of a domain entity within its container type.
pub type Tag = i32;

/// Location of a record on one specific channel.
pub type WireTag = i32;

/// Stable integer naming a concrete subtype of a polymorphic family.
pub type ClassTag = i32;

/// Generation counter of a versioned aggregate ("geometry stamp").
pub type CommitVersion = u64;

/// Commit counter of a communicator session, passed with every channel call.
pub type CommitTag = i32;

/// Sentinel for a wire tag that has not been assigned on the current channel.
pub const UNSET_WIRE_TAG: WireTag = -1;

/// Wire tag of the root locator record. Channel allocators never hand it out.
pub const ROOT_WIRE_TAG: WireTag = 0;

/// First wire tag a channel allocator hands out.
pub const FIRST_WIRE_TAG: WireTag = 1;

/// Kind of primitive array carried by one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RecordKind {
    Ints = 1,
    Doubles = 2,
    Bytes = 3,
}

/// Value of a presence slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum Presence {
    Absent = 0,
    Present = 1,
}

impl From<bool> for Presence {
    fn from(present: bool) -> Self {
        if present {
            Presence::Present
        } else {
            Presence::Absent
        }
    }
}

/// What a versioned aggregate put on the wire for its topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum TopologyFlag {
    /// Membership directories follow.
    Full = 1,
    /// Membership is the one last sent on this channel; only member state follows.
    Unchanged = 2,
}
