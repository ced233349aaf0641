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

//! Encode/decode session over one channel.

use crate::broker::TypeBroker;
use crate::channel::{Channel, ChannelId};
use crate::config::Config;
use crate::ensure;
use crate::error::{Diagnostics, Error, SkippedReference};
use crate::marshal::{Marshal, Polymorphic, Scalar};
use crate::slot::{FieldLocator, TagSlotTable};
use crate::types::{CommitTag, Tag, WireTag, ROOT_WIRE_TAG, UNSET_WIRE_TAG};

/// One session: one channel, one type broker, one commit tag.
///
/// Every `send_*` has a `receive_*` twin that consumes the same slots of the
/// same schema, whatever the payload. Field operations return their own
/// result; callers collect them without stopping at the first failure.
///
/// A fatal error (a schema mismatch) aborts the session: all later calls
/// return [`Error::SessionAborted`].
pub struct Communicator<'s> {
    channel: &'s mut dyn Channel,
    broker: &'s TypeBroker,
    config: &'s Config,
    commit: CommitTag,
    depth: u32,
    aborted: bool,
    diagnostics: Diagnostics,
}

impl<'s> Communicator<'s> {
    pub fn new(
        channel: &'s mut dyn Channel,
        broker: &'s TypeBroker,
        config: &'s Config,
        commit: CommitTag,
    ) -> Communicator<'s> {
        Communicator {
            channel,
            broker,
            config,
            commit,
            depth: 0,
            aborted: false,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.identity()
    }

    pub fn channel(&mut self) -> &mut dyn Channel {
        &mut *self.channel
    }

    pub fn retains_history(&self) -> bool {
        self.channel.retains_history()
    }

    pub fn commit(&self) -> CommitTag {
        self.commit
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn broker(&self) -> &TypeBroker {
        self.broker
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    #[inline]
    fn guard(&self) -> Result<(), Error> {
        if self.aborted {
            return Err(Error::session_aborted());
        }
        Ok(())
    }

    fn abort_on_fatal(&mut self, err: Error) -> Error {
        if err.is_fatal() && !self.aborted {
            tracing::warn!(target: "tagwire::session", error = %err, "aborting session");
            self.aborted = true;
        }
        err
    }

    /// Records a cross-reference dropped during decode.
    pub fn skip_reference(&mut self, kind: &'static str, tag: Tag, holder: impl Into<String>) {
        let skipped = SkippedReference {
            kind,
            tag,
            holder: holder.into(),
        };
        tracing::warn!(target: "tagwire::session", reference = %skipped, "skipping reference");
        self.diagnostics.skipped.push(skipped);
    }

    /// Binds `table` to the channel and sends it as the header record at the
    /// owner's wire tag. Flags, counts and class tags must be staged before.
    pub fn write_header(&mut self, table: &mut TagSlotTable) -> Result<(), Error> {
        self.guard()?;
        table.bind(&mut *self.channel);
        let own = table.own_wire_tag(&mut *self.channel);
        let mut record = Vec::with_capacity(table.len() + 1);
        record.push(table.len() as i32);
        record.extend_from_slice(table.slots());
        self.channel.send_ints(own, self.commit, &record)
    }

    /// Receives the header record into `table`.
    ///
    /// A header of another size is a schema mismatch and aborts the session.
    pub fn read_header(&mut self, table: &mut TagSlotTable) -> Result<(), Error> {
        self.guard()?;
        let own = table.own_wire_tag(&mut *self.channel);
        let expected = table.len();
        let mut record = vec![0i32; expected + 1];
        match self.channel.receive_ints(own, self.commit, &mut record) {
            Ok(()) => {}
            Err(Error::FrameMismatch {
                expected_tag,
                found_tag,
                found_len,
                ..
            }) if expected_tag == found_tag => {
                let err = Error::schema_mismatch(
                    table.schema().name(),
                    expected,
                    found_len.saturating_sub(1),
                );
                return Err(self.abort_on_fatal(err));
            }
            Err(err) => return Err(err),
        }
        if record[0] != expected as i32 {
            let err =
                Error::schema_mismatch(table.schema().name(), expected, record[0].max(0) as usize);
            return Err(self.abort_on_fatal(err));
        }
        table.load(self.channel.identity(), &record[1..]);
        Ok(())
    }

    fn record_tag(table: &TagSlotTable, locator: FieldLocator) -> Result<WireTag, Error> {
        let wire_tag = table.record(locator);
        if wire_tag == UNSET_WIRE_TAG {
            return Err(Error::not_allowed(format!(
                "field at slot {} of {} used before its header was bound",
                locator.index(),
                table.schema().name()
            )));
        }
        Ok(wire_tag)
    }

    pub fn send_scalar<T: Scalar>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
        value: T,
    ) -> Result<(), Error> {
        self.send_array(table, locator, std::slice::from_ref(&value))
    }

    pub fn receive_scalar<T: Scalar>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
    ) -> Result<T, Error> {
        let mut value = [T::default()];
        self.receive_array(table, locator, &mut value)?;
        Ok(value[0])
    }

    /// Fixed-shape sequence; both ends know its length from their own type.
    pub fn send_array<T: Scalar>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
        data: &[T],
    ) -> Result<(), Error> {
        self.guard()?;
        let wire_tag = Self::record_tag(table, locator)?;
        T::send(&mut *self.channel, wire_tag, self.commit, data)
    }

    pub fn receive_array<T: Scalar>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
        out: &mut [T],
    ) -> Result<(), Error> {
        self.guard()?;
        let wire_tag = Self::record_tag(table, locator)?;
        T::receive(&mut *self.channel, wire_tag, self.commit, out)
    }

    /// Variable-length sequence at a `[count, record]` locator. The count must
    /// have been staged with [`TagSlotTable::stage_len`] before the header.
    /// An empty list sends no record.
    pub fn send_list<T: Scalar>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
        data: &[T],
    ) -> Result<(), Error> {
        self.guard()?;
        let staged = table.get(locator, 0);
        ensure!(
            staged == data.len() as i32,
            Error::invalid_data(format!(
                "{} stages {} items at slot {} but sends {}",
                table.schema().name(),
                staged,
                locator.index(),
                data.len()
            ))
        );
        if data.is_empty() {
            return Ok(());
        }
        self.send_array(table, locator, data)
    }

    /// Receives a list sized from the count in the already-read header.
    pub fn receive_list<T: Scalar>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
    ) -> Result<Vec<T>, Error> {
        self.guard()?;
        let count = table.get(locator, 0);
        ensure!(
            count >= 0,
            Error::invalid_data(format!("negative list length {}", count))
        );
        let mut out = vec![T::default(); count as usize];
        if !out.is_empty() {
            self.receive_array(table, locator, &mut out)?;
        }
        Ok(out)
    }

    fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.config.max_depth() {
            let depth = self.depth;
            self.depth -= 1;
            return Err(Error::depth_exceed(format!(
                "entity nesting depth {} exceeds the configured maximum {}",
                depth,
                self.config.max_depth()
            )));
        }
        Ok(())
    }

    fn nested<M: Marshal + ?Sized>(&mut self, child: &mut M, encode: bool) -> Result<(), Error> {
        self.enter()?;
        let result = if encode {
            child.encode(self)
        } else {
            child.decode(self)
        };
        self.depth -= 1;
        result
    }

    /// Encodes an owned sub-entity at the record slot of `locator`. The child
    /// takes that wire tag as its own.
    pub fn send_entity<M: Marshal + ?Sized>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
        child: &mut M,
    ) -> Result<(), Error> {
        self.guard()?;
        let wire_tag = Self::record_tag(table, locator)?;
        child.slot_table().adopt(self.channel.identity(), wire_tag);
        self.nested(child, true)
    }

    pub fn receive_entity<M: Marshal + ?Sized>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
        child: &mut M,
    ) -> Result<(), Error> {
        self.guard()?;
        let wire_tag = Self::record_tag(table, locator)?;
        child.slot_table().adopt(self.channel.identity(), wire_tag);
        self.nested(child, false)
    }

    /// Encodes a polymorphic field at a `[class_tag, record]` locator. The
    /// class tag must have been staged with [`TagSlotTable::stage_class`].
    pub fn send_polymorphic<F: Polymorphic + ?Sized>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
        value: &mut F,
    ) -> Result<(), Error> {
        self.guard()?;
        let staged = table.get(locator, 0);
        ensure!(
            staged == value.class_tag(),
            Error::invalid_data(format!(
                "staged class tag {} but value has class tag {}",
                staged,
                value.class_tag()
            ))
        );
        self.send_entity(table, locator, value)
    }

    /// Constructs the concrete instance named by the class tag in the header
    /// through the broker, then decodes it. On any failure the instance is
    /// dropped and only the error comes back.
    pub fn receive_polymorphic<F: Polymorphic + ?Sized + 'static>(
        &mut self,
        table: &TagSlotTable,
        locator: FieldLocator,
    ) -> Result<Box<F>, Error> {
        self.guard()?;
        let class_tag = table.get(locator, 0);
        let mut value = self.broker.construct::<F>(class_tag)?;
        self.receive_entity(table, locator, &mut *value)?;
        Ok(value)
    }

    /// Encodes a collection member at its own wire tag, which the caller has
    /// already listed in a directory record.
    pub fn send_member<M: Marshal + ?Sized>(&mut self, member: &mut M) -> Result<(), Error> {
        self.guard()?;
        self.nested(member, true)
    }

    /// Decodes a collection member found at `wire_tag` in a directory record.
    pub fn receive_member<M: Marshal + ?Sized>(
        &mut self,
        member: &mut M,
        wire_tag: WireTag,
    ) -> Result<(), Error> {
        self.guard()?;
        member.slot_table().adopt(self.channel.identity(), wire_tag);
        self.nested(member, false)
    }

    /// Decodes a member in place at the wire tag it adopted from an earlier
    /// directory on this channel.
    pub fn receive_known_member<M: Marshal + ?Sized>(
        &mut self,
        member: &mut M,
    ) -> Result<(), Error> {
        self.guard()?;
        let channel = self.channel.identity();
        let table = member.slot_table();
        ensure!(
            table.is_bound_to(channel),
            Error::not_allowed(format!(
                "{} has no wire tag on channel {}",
                table.schema().name(),
                channel.get()
            ))
        );
        self.nested(member, false)
    }

    /// Constructs a member of an open family from a directory entry and
    /// decodes it.
    pub fn receive_polymorphic_member<F: Polymorphic + ?Sized + 'static>(
        &mut self,
        class_tag: i32,
        wire_tag: WireTag,
    ) -> Result<Box<F>, Error> {
        self.guard()?;
        let mut value = self.broker.construct::<F>(class_tag)?;
        self.receive_member(&mut *value, wire_tag)?;
        Ok(value)
    }

    /// Sends the root locator record, then the root entity.
    pub fn send_root<M: Marshal + ?Sized>(&mut self, root: &mut M) -> Result<(), Error> {
        self.guard()?;
        let wire_tag = root.wire_tag(&mut *self.channel);
        tracing::debug!(
            target: "tagwire::session",
            channel = self.channel.identity().get(),
            commit = self.commit,
            wire_tag,
            "send root"
        );
        self.channel.send_ints(ROOT_WIRE_TAG, self.commit, &[wire_tag])?;
        self.nested(root, true)
    }

    /// Reads the root locator record, then decodes the root entity in place.
    pub fn receive_root<M: Marshal + ?Sized>(&mut self, root: &mut M) -> Result<(), Error> {
        self.guard()?;
        let mut wire_tag = [UNSET_WIRE_TAG];
        self.channel.receive_ints(ROOT_WIRE_TAG, self.commit, &mut wire_tag)?;
        tracing::debug!(
            target: "tagwire::session",
            channel = self.channel.identity().get(),
            commit = self.commit,
            wire_tag = wire_tag[0],
            "receive root"
        );
        root.slot_table().adopt(self.channel.identity(), wire_tag[0]);
        self.nested(root, false)
    }
}
