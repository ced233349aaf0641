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

mod test_helpers;

use std::any::Any;

use tagwire::model::{Beam2d, Domain, Element, Truss};
use tagwire::{
    loopback, Accumulator, Channel, ClassTag, Communicator, Error, FieldLocator, Marshal,
    Marshaller, Polymorphic, Slot, SlotSchema, Tag, TagSlotTable,
};
use test_helpers::{init_tracing, marshaller, nodes_on_a_line};

const SPRING_SCHEMA: SlotSchema = SlotSchema::new("Spring", &[Slot::Record, Slot::Record]);
const IDS: FieldLocator = SPRING_SCHEMA.field(0, 1);
const STIFFNESS: FieldLocator = SPRING_SCHEMA.field(1, 1);

/// An element type defined outside the model crate.
#[derive(Debug, Default)]
struct Spring {
    table: TagSlotTable,
    tag: Tag,
    nodes: [Tag; 2],
    stiffness: f64,
}

impl Spring {
    const CLASS_TAG: ClassTag = 99;
}

impl Marshal for Spring {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&SPRING_SCHEMA)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.write_header(self.table.ensure(&SPRING_SCHEMA))?;
        let mut acc = Accumulator::default();
        let ids = [self.tag, self.nodes[0], self.nodes[1]];
        acc.field("ids", comm.send_array(&self.table, IDS, &ids));
        acc.field("stiffness", comm.send_scalar(&self.table, STIFFNESS, self.stiffness));
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&SPRING_SCHEMA))?;
        let mut acc = Accumulator::default();
        let mut ids = [0; 3];
        acc.field(
            "ids",
            comm.receive_array(&self.table, IDS, &mut ids).map(|()| {
                self.tag = ids[0];
                self.nodes = [ids[1], ids[2]];
            }),
        );
        if let Some(k) = acc.value("stiffness", comm.receive_scalar(&self.table, STIFFNESS)) {
            self.stiffness = k;
        }
        acc.finish()
    }
}

impl Polymorphic for Spring {
    fn class_tag(&self) -> ClassTag {
        Self::CLASS_TAG
    }
}

impl Element for Spring {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn node_tags(&self) -> &[Tag] {
        &self.nodes
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn same_as(&self, other: &dyn Element) -> bool {
        other.as_any().downcast_ref::<Self>().is_some_and(|o| {
            o.tag == self.tag && o.nodes == self.nodes && o.stiffness == self.stiffness
        })
    }
}

fn with_spring(marshaller: &mut Marshaller) {
    marshaller
        .register::<dyn Element, _>(Spring::CLASS_TAG, || {
            Box::new(Spring::default()) as Box<dyn Element>
        })
        .unwrap();
}

fn sprung_domain() -> Domain {
    let mut domain = nodes_on_a_line(&[1, 2, 3]);
    domain.add_element(Truss::new(1, [1, 2], 0.01, 1)).unwrap();
    domain
        .add_element(Spring {
            tag: 2,
            nodes: [2, 3],
            stiffness: 5.0e3,
            ..Default::default()
        })
        .unwrap();
    domain.add_element(Beam2d::new(3, [1, 3], 0.02, 2.0e11, 1.0e-4)).unwrap();
    domain
}

#[test]
fn test_downstream_element_round_trip() {
    init_tracing();
    let mut sender = marshaller();
    with_spring(&mut sender);
    let mut receiver = marshaller();
    with_spring(&mut receiver);

    let mut domain = sprung_domain();
    let (mut tx, mut rx) = loopback();
    sender.send(&mut tx, 1, &mut domain).unwrap();
    let mut replica = Domain::new();
    receiver.receive(&mut rx, 1, &mut replica).unwrap();

    assert!(replica == domain);
    let spring = replica.element(2).unwrap();
    assert_eq!(spring.class_tag(), Spring::CLASS_TAG);
    assert_eq!(spring.node_tags(), &[2, 3]);
}

#[test]
fn test_unregistered_class_tag_drops_only_that_element() {
    init_tracing();
    let mut sender = marshaller();
    with_spring(&mut sender);
    let receiver = marshaller();

    let mut domain = sprung_domain();
    let (mut tx, mut rx) = loopback();
    sender.send(&mut tx, 1, &mut domain).unwrap();
    let mut replica = Domain::new();
    let err = receiver.receive(&mut rx, 1, &mut replica).unwrap_err();

    assert!(err.is_unknown_class_tag());
    match &err {
        Error::Incomplete(report) => assert_eq!(report.paths(), vec!["element 2"]),
        other => panic!("unexpected {}", other),
    }
    assert!(replica.element(2).is_none());
    assert!(replica.element(1).is_some());
    assert!(replica.element(3).is_some());
    assert_eq!(replica.nodes().count(), 3);
}

#[test]
fn test_resync_recovers_after_an_unregistered_class_tag() {
    init_tracing();
    let mut sender = marshaller();
    with_spring(&mut sender);
    let mut domain = sprung_domain();
    let (mut tx, mut rx) = loopback();
    let mut replica = Domain::new();

    sender.send(&mut tx, 1, &mut domain).unwrap();
    let err = marshaller().receive(&mut rx, 1, &mut replica).unwrap_err();
    assert!(err.is_unknown_class_tag());

    // the receiving side learns about springs, but the sender already
    // counts the topology as delivered
    let mut receiver = marshaller();
    with_spring(&mut receiver);
    domain.commit(1.0);
    sender.send(&mut tx, 2, &mut domain).unwrap();
    let err = receiver.receive(&mut rx, 2, &mut replica).unwrap_err();
    assert!(matches!(err, Error::Incomplete(ref r) if r.paths() == ["topology"]));
    assert!(replica.element(2).is_none());

    domain.resync(tx.identity());
    assert_eq!(domain.ledger().last_sent(tx.identity()), None);
    sender.send(&mut tx, 3, &mut domain).unwrap();
    receiver.receive(&mut rx, 3, &mut replica).unwrap();
    assert!(replica == domain);
    assert_eq!(replica.element(2).unwrap().class_tag(), Spring::CLASS_TAG);
}

#[test]
fn test_class_tag_registers_once_per_family() {
    let mut marshaller = marshaller();
    let err = marshaller
        .register::<dyn Element, _>(Truss::CLASS_TAG, || {
            Box::new(Truss::default()) as Box<dyn Element>
        })
        .unwrap_err();
    assert!(matches!(err, Error::NotAllowed(_)));
    assert_eq!(marshaller.broker().class_tags::<dyn Element>(), vec![1, 2, 3]);

    with_spring(&mut marshaller);
    assert!(marshaller.broker().is_registered::<dyn Element>(Spring::CLASS_TAG));
}
