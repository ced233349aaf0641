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

//! # Tagwire Core
//!
//! The engine of the tagwire marshalling protocol. It moves graphs of
//! tag-identified, polymorphic entities through an abstract [`Channel`], for
//! exchange between cooperating processes and for checkpoint/restore.
//!
//! ## Architecture
//!
//! - **`slot`**: per-type header tables ([`TagSlotTable`]) and their static
//!   layouts ([`SlotSchema`])
//! - **`channel`**: the transport contract plus a stream transport and an
//!   in-memory checkpoint store
//! - **`broker`**: class-tag registry for open polymorphic families
//! - **`communicator`**: one encode/decode session over one channel
//! - **`marshal`**: the contract every marshallable type implements
//! - **`sync`**: change tracking for versioned aggregates
//! - **`marshaller`**: the top-level handle owning config and broker
//! - **`buffer`**: little-endian Writer/Reader used for framing
//! - **`error`**: error values and per-field failure reports
//!
//! ## Key Concepts
//!
//! Every entity carries a header table. Record slots hold the wire tags of its
//! payload records, value slots hold flags, counts and class tags. The header
//! goes out first, so the receiver knows how to size everything that follows.
//!
//! Wire tags belong to one channel. An entity sent on a second channel gets
//! fresh wire tags there; back on the first channel it reuses the old ones.
//!
//! Field failures never stop an encode or decode. Each entity collects them in
//! an [`Accumulator`] and returns a structured [`Report`]. Only a schema
//! mismatch aborts the whole session.
//!
//! ## Usage
//!
//! Most users go through the `tagwire` crate, which adds a finite-element
//! entity model on top of this engine.
//!
//! ```rust
//! use tagwire_core::{Accumulator, Communicator, Error, FieldLocator, Marshal,
//!     Marshaller, MemoryStore, Slot, SlotSchema, TagSlotTable};
//!
//! #[derive(Default)]
//! struct Sensor {
//!     table: TagSlotTable,
//!     reading: f64,
//! }
//!
//! const SCHEMA: SlotSchema = SlotSchema::new("Sensor", &[Slot::Record]);
//! const READING: FieldLocator = SCHEMA.field(0, 1);
//!
//! impl Marshal for Sensor {
//!     fn slot_table(&mut self) -> &mut TagSlotTable {
//!         self.table.ensure(&SCHEMA)
//!     }
//!
//!     fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
//!         comm.write_header(self.slot_table())?;
//!         comm.send_scalar(&self.table, READING, self.reading)
//!     }
//!
//!     fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
//!         comm.read_header(self.slot_table())?;
//!         let mut acc = Accumulator::default();
//!         let reading = comm.receive_scalar(&self.table, READING);
//!         acc.field("reading", reading.map(|v| self.reading = v));
//!         acc.finish()
//!     }
//! }
//!
//! # fn main() -> Result<(), Error> {
//! let marshaller = Marshaller::default();
//! let mut store = MemoryStore::new();
//! let mut sensor = Sensor { reading: 2.5, ..Default::default() };
//! marshaller.send(&mut store, 1, &mut sensor)?;
//!
//! let mut restored = Sensor::default();
//! marshaller.receive(&mut store.reopen(), 1, &mut restored)?;
//! assert_eq!(restored.reading, 2.5);
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod buffer;
pub mod channel;
pub mod communicator;
pub mod config;
pub mod error;
pub mod marshal;
pub mod marshaller;
pub mod slot;
pub mod sync;
pub mod types;

pub use broker::TypeBroker;
pub use channel::{loopback, Channel, ChannelId, MemoryStore, PipeEnd, StreamChannel};
pub use communicator::Communicator;
pub use config::Config;
pub use error::{Accumulator, Diagnostics, Error, FieldFailure, Report, SkippedReference};
pub use marshal::{Marshal, Polymorphic, Scalar};
pub use marshaller::Marshaller;
pub use slot::{FieldLocator, Slot, SlotSchema, TagSlotTable};
pub use sync::VersionLedger;
pub use types::{
    ClassTag, CommitTag, CommitVersion, Presence, RecordKind, Tag, TopologyFlag, WireTag,
    ROOT_WIRE_TAG, UNSET_WIRE_TAG,
};
