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

//! Per-type header tables.
//!
//! Every marshallable type declares one static [`SlotSchema`]: its name and
//! the layout of its header, one [`Slot`] per field record, flag, count or
//! class tag. Instances own a [`TagSlotTable`] sized from that schema; the
//! table is the header record sent ahead of the entity's payload.
//!
//! ```
//! use tagwire_core::slot::{FieldLocator, Slot, SlotSchema, TagSlotTable};
//!
//! const SCHEMA: SlotSchema =
//!     SlotSchema::new("Sensor", &[Slot::Record, Slot::Value, Slot::Record]);
//! const READING: FieldLocator = SCHEMA.field(0, 1);
//! const HISTORY: FieldLocator = SCHEMA.field(1, 2);
//!
//! let mut table = TagSlotTable::default();
//! table.ensure(&SCHEMA).stage_len(HISTORY, 12);
//! assert_eq!(table.get(HISTORY, 0), 12);
//! assert_eq!(READING.index(), 0);
//! ```

use std::collections::HashMap;

use crate::channel::{Channel, ChannelId};
use crate::types::{ClassTag, Presence, WireTag, UNSET_WIRE_TAG};

/// Role of one header slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Holds the wire tag of a payload record. Allocated from the channel when
    /// the header is bound.
    Record,
    /// Holds a flag, a count or a class tag, staged by the entity before the
    /// header is written.
    Value,
}

/// Static description of one type's header.
#[derive(Debug)]
pub struct SlotSchema {
    name: &'static str,
    layout: &'static [Slot],
}

impl SlotSchema {
    pub const fn new(name: &'static str, layout: &'static [Slot]) -> SlotSchema {
        SlotSchema { name, layout }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn len(&self) -> usize {
        self.layout.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn layout(&self) -> &'static [Slot] {
        self.layout
    }

    /// Produces a locator into this schema. Used in `const` position, an out
    /// of range coordinate fails the build.
    pub const fn field(&self, index: usize, count: usize) -> FieldLocator {
        assert!(count > 0, "field locator must cover at least one slot");
        assert!(index + count <= self.layout.len(), "field locator outside schema");
        FieldLocator {
            schema: self.name,
            index,
            count,
        }
    }
}

impl PartialEq for SlotSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.layout == other.layout
    }
}

/// `(index, count)` coordinate into a [`TagSlotTable`] of the schema that
/// produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLocator {
    schema: &'static str,
    index: usize,
    count: usize,
}

impl FieldLocator {
    /// Name of the schema this locator addresses.
    pub const fn schema(&self) -> &'static str {
        self.schema
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn count(&self) -> usize {
        self.count
    }
}

/// Wire tags an instance holds on a channel it is not currently bound to.
#[derive(Clone, Debug)]
struct Binding {
    own: WireTag,
    records: Vec<WireTag>,
}

/// Header of one serializable instance.
///
/// Value slots are shared by every channel. Record slots and the entity's own
/// wire tag belong to one channel: the table holds the active channel's tags
/// in place and parks those of every other channel it was bound to, so
/// switching back restores them verbatim.
#[derive(Clone, Debug)]
pub struct TagSlotTable {
    schema: Option<&'static SlotSchema>,
    channel: Option<ChannelId>,
    own: WireTag,
    slots: Vec<i32>,
    parked: HashMap<ChannelId, Binding>,
}

impl Default for TagSlotTable {
    fn default() -> Self {
        TagSlotTable {
            schema: None,
            channel: None,
            own: UNSET_WIRE_TAG,
            slots: Vec::new(),
            parked: HashMap::new(),
        }
    }
}

impl TagSlotTable {
    /// Sizes the table for `schema` on first use and returns it.
    ///
    /// # Panics
    ///
    /// If the table was already sized for a different schema. A locator from
    /// one schema must never address a table of another.
    pub fn ensure(&mut self, schema: &'static SlotSchema) -> &mut Self {
        match self.schema {
            None => {
                self.schema = Some(schema);
                self.slots = schema
                    .layout
                    .iter()
                    .map(|slot| match slot {
                        Slot::Record => UNSET_WIRE_TAG,
                        Slot::Value => 0,
                    })
                    .collect();
            }
            Some(current) => assert!(
                current == schema,
                "slot table of {} reused for {}",
                current.name,
                schema.name
            ),
        }
        self
    }

    /// The schema this table was sized for.
    ///
    /// # Panics
    ///
    /// If [`TagSlotTable::ensure`] was never called.
    pub fn schema(&self) -> &'static SlotSchema {
        match self.schema {
            Some(schema) => schema,
            None => panic!("slot table used before ensure()"),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[i32] {
        &self.slots
    }

    pub fn bound_channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Whether this instance holds its own wire tag on `channel`.
    pub fn is_bound_to(&self, channel: ChannelId) -> bool {
        if self.channel == Some(channel) {
            return self.own != UNSET_WIRE_TAG;
        }
        self.parked
            .get(&channel)
            .map_or(false, |binding| binding.own != UNSET_WIRE_TAG)
    }

    #[inline]
    fn position(&self, locator: FieldLocator, offset: usize) -> usize {
        assert!(
            self.schema.map_or(false, |s| s.name == locator.schema),
            "locator of {} applied to a table of {}",
            locator.schema,
            self.schema.map_or("<unsized>", |s| s.name)
        );
        assert!(
            offset < locator.count && locator.index + locator.count <= self.slots.len(),
            "slot {}+{} outside {} of {} slots",
            locator.index,
            offset,
            self.schema.map_or("<unsized>", |s| s.name),
            self.slots.len()
        );
        locator.index + offset
    }

    /// Reads slot `offset` of the field at `locator`.
    ///
    /// # Panics
    ///
    /// On an index outside the declared schema.
    pub fn get(&self, locator: FieldLocator, offset: usize) -> i32 {
        self.slots[self.position(locator, offset)]
    }

    /// Writes slot `offset` of the field at `locator`.
    ///
    /// # Panics
    ///
    /// On an index outside the declared schema.
    pub fn set(&mut self, locator: FieldLocator, offset: usize, value: i32) {
        let position = self.position(locator, offset);
        self.slots[position] = value;
    }

    pub fn stage_flag(&mut self, locator: FieldLocator, present: bool) {
        self.set(locator, 0, Presence::from(present).into());
    }

    pub fn stage_len(&mut self, locator: FieldLocator, len: usize) {
        self.set(locator, 0, len as i32);
    }

    pub fn stage_class(&mut self, locator: FieldLocator, class_tag: ClassTag) {
        self.set(locator, 0, class_tag);
    }

    pub fn flag(&self, locator: FieldLocator) -> bool {
        self.get(locator, 0) == i32::from(Presence::Present)
    }

    /// Record wire tag of a field: the last slot of its locator.
    pub fn record(&self, locator: FieldLocator) -> WireTag {
        self.get(locator, locator.count - 1)
    }

    /// Switches the table to `channel`. The wire tags of the channel left
    /// behind are parked; those of `channel` are restored, or unset if the
    /// table was never bound there. Value slots are kept.
    pub fn rebind(&mut self, channel: ChannelId) {
        if self.channel == Some(channel) {
            return;
        }
        let layout = self.schema.map_or(&[][..], |schema| schema.layout);
        let records: Vec<WireTag> = self
            .slots
            .iter()
            .zip(layout)
            .filter(|(_, slot)| **slot == Slot::Record)
            .map(|(value, _)| *value)
            .collect();
        if let Some(previous) = self.channel.replace(channel) {
            let own = std::mem::replace(&mut self.own, UNSET_WIRE_TAG);
            self.parked.insert(previous, Binding { own, records });
        }
        let restored = self.parked.remove(&channel);
        self.own = restored.as_ref().map_or(UNSET_WIRE_TAG, |binding| binding.own);
        let mut tags = restored.into_iter().flat_map(|binding| binding.records);
        for (value, slot) in self.slots.iter_mut().zip(layout) {
            if *slot == Slot::Record {
                *value = tags.next().unwrap_or(UNSET_WIRE_TAG);
            }
        }
    }

    /// Drops every wire tag held for `channel`.
    pub fn unbind(&mut self, channel: ChannelId) {
        self.parked.remove(&channel);
        if self.channel == Some(channel) {
            self.own = UNSET_WIRE_TAG;
            let layout = self.schema.map_or(&[][..], |schema| schema.layout);
            for (value, slot) in self.slots.iter_mut().zip(layout) {
                if *slot == Slot::Record {
                    *value = UNSET_WIRE_TAG;
                }
            }
        }
    }

    /// Binds to the channel and allocates every record slot still unset.
    /// Already assigned wire tags are reused verbatim.
    pub fn bind(&mut self, channel: &mut dyn Channel) {
        self.rebind(channel.identity());
        if let Some(schema) = self.schema {
            for (value, slot) in self.slots.iter_mut().zip(schema.layout) {
                if *slot == Slot::Record && *value == UNSET_WIRE_TAG {
                    *value = channel.allocate_wire_tag();
                }
            }
        }
    }

    /// The entity's own wire tag on `channel`, assigned on first use.
    pub fn own_wire_tag(&mut self, channel: &mut dyn Channel) -> WireTag {
        self.rebind(channel.identity());
        if self.own == UNSET_WIRE_TAG {
            self.own = channel.allocate_wire_tag();
        }
        self.own
    }

    /// Takes the wire tag a parent assigned to this entity.
    pub fn adopt(&mut self, channel: ChannelId, wire_tag: WireTag) {
        self.rebind(channel);
        self.own = wire_tag;
    }

    /// Overwrites all slots with a received header.
    pub(crate) fn load(&mut self, channel: ChannelId, slots: &[i32]) {
        self.rebind(channel);
        self.slots.copy_from_slice(slots);
    }
}
