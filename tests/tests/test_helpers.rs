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

#![allow(dead_code)]

use std::collections::BTreeSet;

use tagwire::model::{
    register_elements, Beam2d, Domain, LoadPattern, MultiFreedom, NodalLoad, Node, Quad4,
    SingleFreedom, Truss,
};
use tagwire::{Channel, ChannelId, CommitTag, Error, Marshaller, WireTag};
use tagwire_core::types::RecordKind;
use tracing_subscriber::EnvFilter;

/// Installs a subscriber that prints through the test harness. Filter with
/// `RUST_LOG`, e.g. `RUST_LOG=tagwire=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Marshaller with every element type of the model registered.
pub fn marshaller() -> Marshaller {
    let mut marshaller = Marshaller::default();
    register_elements(&mut marshaller).unwrap();
    marshaller
}

/// Domain holding one node per tag on a line, unconnected.
pub fn nodes_on_a_line(tags: &[i32]) -> Domain {
    let mut domain = Domain::new();
    for &tag in tags {
        domain.add_node(Node::new(tag, [tag as f64, 0.0], 2)).unwrap();
    }
    domain
}

/// A portal frame with a truss brace, a plate, both constraint kinds, two
/// load patterns and an explicit active set.
pub fn portal_frame() -> Domain {
    let mut domain = Domain::new();
    let coords = [(1, 0.0, 0.0), (2, 0.0, 3.0), (3, 4.0, 3.0), (4, 4.0, 0.0), (5, 2.0, 1.5)];
    for (tag, x, y) in coords {
        domain.add_node(Node::new(tag, [x, y], 3)).unwrap();
    }
    domain.add_element(Beam2d::new(1, [1, 2], 0.02, 2.1e11, 1.6e-4)).unwrap();
    domain.add_element(Beam2d::new(2, [2, 3], 0.02, 2.1e11, 2.4e-4)).unwrap();
    domain.add_element(Beam2d::new(3, [3, 4], 0.02, 2.1e11, 1.6e-4)).unwrap();
    domain.add_element(Truss::new(4, [1, 3], 0.005, 7)).unwrap();
    domain.add_element(Quad4::new(5, [1, 4, 3, 2], 0.2, 9)).unwrap();

    for (tag, dof) in [(1, 0), (2, 1), (3, 2)] {
        domain.add_constraint(SingleFreedom::new(tag, 1, dof, 0.0)).unwrap();
    }
    domain
        .add_constraint(MultiFreedom::new(4, 2, 5, vec![0, 1], vec![0], vec![1.0, 0.0]).unwrap())
        .unwrap();

    domain.add_load_pattern(LoadPattern::new(1, 1.0)).unwrap();
    domain.add_load_pattern(LoadPattern::new(2, 0.5)).unwrap();
    domain.add_nodal_load(1, NodalLoad::new(10, 2, [5.0e3, 0.0, 0.0])).unwrap();
    domain.add_nodal_load(1, NodalLoad::new(11, 3, [0.0, -2.0e4, 0.0])).unwrap();
    domain.add_nodal_load(2, NodalLoad::new(20, 5, [0.0, -1.0e3, 0.0])).unwrap();
    domain.set_active_patterns(Some(BTreeSet::from([1, 2]))).unwrap();
    domain.commit(0.25);
    domain
}

/// One record as seen by a [`TapChannel`].
#[derive(Clone, Debug, PartialEq)]
pub struct Sent {
    pub kind: RecordKind,
    pub wire_tag: WireTag,
    pub commit: CommitTag,
    pub ints: Vec<i32>,
    pub len: usize,
}

/// Records every send, then forwards it.
pub struct TapChannel<C> {
    pub inner: C,
    pub sent: Vec<Sent>,
}

impl<C: Channel> TapChannel<C> {
    pub fn new(inner: C) -> TapChannel<C> {
        TapChannel {
            inner,
            sent: Vec::new(),
        }
    }

    pub fn take(&mut self) -> Vec<Sent> {
        std::mem::take(&mut self.sent)
    }

    fn tap(
        &mut self,
        kind: RecordKind,
        wire_tag: WireTag,
        commit: CommitTag,
        ints: &[i32],
        len: usize,
    ) {
        self.sent.push(Sent {
            kind,
            wire_tag,
            commit,
            ints: ints.to_vec(),
            len,
        });
    }
}

impl<C: Channel> Channel for TapChannel<C> {
    fn identity(&self) -> ChannelId {
        self.inner.identity()
    }

    fn allocate_wire_tag(&mut self) -> WireTag {
        self.inner.allocate_wire_tag()
    }

    fn retains_history(&self) -> bool {
        self.inner.retains_history()
    }

    fn send_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[i32],
    ) -> Result<(), Error> {
        self.tap(RecordKind::Ints, wire_tag, commit, data, data.len());
        self.inner.send_ints(wire_tag, commit, data)
    }

    fn send_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[f64],
    ) -> Result<(), Error> {
        self.tap(RecordKind::Doubles, wire_tag, commit, &[], data.len());
        self.inner.send_doubles(wire_tag, commit, data)
    }

    fn send_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[u8],
    ) -> Result<(), Error> {
        self.tap(RecordKind::Bytes, wire_tag, commit, &[], data.len());
        self.inner.send_bytes(wire_tag, commit, data)
    }

    fn receive_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [i32],
    ) -> Result<(), Error> {
        self.inner.receive_ints(wire_tag, commit, out)
    }

    fn receive_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [f64],
    ) -> Result<(), Error> {
        self.inner.receive_doubles(wire_tag, commit, out)
    }

    fn receive_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [u8],
    ) -> Result<(), Error> {
        self.inner.receive_bytes(wire_tag, commit, out)
    }
}

/// Which sends a [`FaultyChannel`] drops.
pub enum Fault {
    /// The n-th send, counting from zero.
    Nth(usize),
    /// Every int record with exactly this payload.
    Ints(Vec<i32>),
}

/// Drops selected sends and reports them as transport failures. The record
/// never reaches the inner channel.
pub struct FaultyChannel<C> {
    pub inner: C,
    fault: Fault,
    sends: usize,
    pub dropped: usize,
}

impl<C: Channel> FaultyChannel<C> {
    pub fn new(inner: C, fault: Fault) -> FaultyChannel<C> {
        FaultyChannel {
            inner,
            fault,
            sends: 0,
            dropped: 0,
        }
    }

    fn drops(&mut self, ints: Option<&[i32]>) -> Result<(), Error> {
        let index = self.sends;
        self.sends += 1;
        let hit = match &self.fault {
            Fault::Nth(n) => *n == index,
            Fault::Ints(payload) => ints == Some(payload.as_slice()),
        };
        if hit {
            self.dropped += 1;
            return Err(Error::transport(format!("send #{} dropped", index)));
        }
        Ok(())
    }
}

impl<C: Channel> Channel for FaultyChannel<C> {
    fn identity(&self) -> ChannelId {
        self.inner.identity()
    }

    fn allocate_wire_tag(&mut self) -> WireTag {
        self.inner.allocate_wire_tag()
    }

    fn retains_history(&self) -> bool {
        self.inner.retains_history()
    }

    fn send_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[i32],
    ) -> Result<(), Error> {
        self.drops(Some(data))?;
        self.inner.send_ints(wire_tag, commit, data)
    }

    fn send_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[f64],
    ) -> Result<(), Error> {
        self.drops(None)?;
        self.inner.send_doubles(wire_tag, commit, data)
    }

    fn send_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[u8],
    ) -> Result<(), Error> {
        self.drops(None)?;
        self.inner.send_bytes(wire_tag, commit, data)
    }

    fn receive_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [i32],
    ) -> Result<(), Error> {
        self.inner.receive_ints(wire_tag, commit, out)
    }

    fn receive_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [f64],
    ) -> Result<(), Error> {
        self.inner.receive_doubles(wire_tag, commit, out)
    }

    fn receive_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [u8],
    ) -> Result<(), Error> {
        self.inner.receive_bytes(wire_tag, commit, out)
    }
}
