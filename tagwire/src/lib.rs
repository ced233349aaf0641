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

//! # Tagwire
//!
//! Tagwire moves a graph of tag-identified finite-element entities (nodes,
//! elements, constraints, load patterns, whole model domains) through an
//! abstract channel. The same code path serves exchange of model state
//! between cooperating analysis processes and checkpoint/restore to a
//! persistent store.
//!
//! ## Key Features
//!
//! - **Header first**: every entity sends a small header of wire tags, counts
//!   and class tags before its payload, so the receiver sizes everything up
//!   front
//! - **Per-channel wire tags**: assigned once per entity and channel, reused on
//!   every later send
//! - **Unchanged topology is skipped**: a [`Domain`](model::Domain) that a
//!   channel already holds only sends a flag for its membership
//! - **Open and closed families**: elements resolve through a class-tag broker,
//!   constraints through an exhaustive `match`
//! - **Partial failure is visible**: every field is attempted and failures come
//!   back as a structured [`Report`]
//!
//! ## Exchanging a model
//!
//! ```rust
//! use tagwire::model::{register_elements, Domain, Node, Truss};
//! use tagwire::{loopback, Error, Marshaller};
//!
//! # fn main() -> Result<(), Error> {
//! let mut marshaller = Marshaller::default();
//! register_elements(&mut marshaller)?;
//!
//! let mut domain = Domain::new();
//! domain.add_node(Node::new(1, [0.0, 0.0], 2))?;
//! domain.add_node(Node::new(2, [4.0, 0.0], 2))?;
//! domain.add_element(Truss::new(1, [1, 2], 0.01, 1))?;
//!
//! let (mut tx, mut rx) = loopback();
//! marshaller.send(&mut tx, 1, &mut domain)?;
//!
//! let mut replica = Domain::new();
//! marshaller.receive(&mut rx, 1, &mut replica)?;
//! assert!(replica == domain);
//! # Ok(())
//! # }
//! ```
//!
//! ## Checkpoints
//!
//! A [`MemoryStore`] keeps every commit side by side. Versioned aggregates
//! always send full topology to such a store, so each commit restores on its
//! own:
//!
//! ```rust
//! use tagwire::model::{Domain, Node};
//! use tagwire::{Error, Marshaller, MemoryStore};
//!
//! # fn main() -> Result<(), Error> {
//! let marshaller = Marshaller::default();
//! let mut store = MemoryStore::new();
//! let mut domain = Domain::new();
//! domain.add_node(Node::new(7, [1.0, 2.0, 3.0], 3))?;
//! domain.commit(0.1);
//! marshaller.send(&mut store, 1, &mut domain)?;
//! domain.commit(0.2);
//! marshaller.send(&mut store, 2, &mut domain)?;
//!
//! let mut restored = Domain::new();
//! marshaller.receive(&mut store.reopen(), 1, &mut restored)?;
//! assert_eq!(restored.committed_time(), 0.1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom entities
//!
//! Implement [`Marshal`] by hand: declare a static [`SlotSchema`], stage
//! counts and flags, write the header, then move each field through the
//! [`Communicator`] and collect the results in an [`Accumulator`]. See the
//! `tagwire_core` crate documentation for a complete example.

pub mod model;

pub use tagwire_core::{
    ensure, loopback, Accumulator, Channel, ChannelId, ClassTag, CommitTag, CommitVersion,
    Communicator, Config, Diagnostics, Error, FieldLocator, Marshal, Marshaller, MemoryStore,
    Polymorphic, Report, Scalar, SkippedReference, Slot, SlotSchema, StreamChannel, Tag,
    TagSlotTable, TopologyFlag, TypeBroker, VersionLedger, WireTag,
};
