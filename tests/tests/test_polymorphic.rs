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

use tagwire::model::{Element, Quad4, Truss};
use tagwire::{
    loopback, Accumulator, ClassTag, Communicator, Error, FieldLocator, Marshal, Marshaller,
    Polymorphic, Slot, SlotSchema, TagSlotTable,
};
use test_helpers::{init_tracing, marshaller};

const BAY: SlotSchema = SlotSchema::new("Bay", &[Slot::Value, Slot::Record, Slot::Record]);
/// `[class tag, record]`, class tag 0 when the bay is empty
const MEMBER: FieldLocator = BAY.field(0, 2);
const SPAN: FieldLocator = BAY.field(2, 1);

/// Holds one element of any registered type as a field.
#[derive(Debug, Default)]
struct Bay {
    table: TagSlotTable,
    span: f64,
    member: Option<Box<dyn Element>>,
    /// Stages this class tag instead of the member's own.
    class_override: Option<ClassTag>,
}

impl Bay {
    fn with(span: f64, member: impl Element + 'static) -> Bay {
        Bay {
            span,
            member: Some(Box::new(member)),
            ..Default::default()
        }
    }
}

impl Marshal for Bay {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&BAY)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let class_tag = self
            .class_override
            .or_else(|| self.member.as_ref().map(|m| m.class_tag()))
            .unwrap_or(0);
        let table = self.table.ensure(&BAY);
        table.stage_class(MEMBER, class_tag);
        comm.write_header(table)?;

        let mut acc = Accumulator::default();
        acc.field("span", comm.send_scalar(&self.table, SPAN, self.span));
        if let Some(member) = self.member.as_mut() {
            acc.field("member", comm.send_polymorphic(&self.table, MEMBER, &mut **member));
        }
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&BAY))?;

        let mut acc = Accumulator::default();
        if let Some(span) = acc.value("span", comm.receive_scalar(&self.table, SPAN)) {
            self.span = span;
        }
        self.member = None;
        if self.table.get(MEMBER, 0) != 0 {
            let member = comm.receive_polymorphic::<dyn Element>(&self.table, MEMBER);
            self.member = acc.value("member", member);
        }
        acc.finish()
    }
}

#[test]
fn test_polymorphic_field_round_trip() {
    init_tracing();
    let marshaller = marshaller();
    let (mut tx, mut rx) = loopback();
    let mut sent = Bay::with(4.5, Quad4::new(8, [1, 2, 3, 4], 0.25, 3));
    marshaller.send(&mut tx, 1, &mut sent).unwrap();

    let mut received = Bay::default();
    marshaller.receive(&mut rx, 1, &mut received).unwrap();
    assert_eq!(received.span, 4.5);
    let member = received.member.as_deref().unwrap();
    assert_eq!(member.class_tag(), Quad4::CLASS_TAG);
    assert!(*member == **sent.member.as_ref().unwrap());

    let mut empty = Bay {
        span: 1.0,
        ..Default::default()
    };
    marshaller.send(&mut tx, 2, &mut empty).unwrap();
    marshaller.receive(&mut rx, 2, &mut received).unwrap();
    assert!(received.member.is_none());
    assert_eq!(received.span, 1.0);
}

#[test]
fn test_staged_class_tag_must_match_the_value() {
    let marshaller = marshaller();
    let (mut tx, _rx) = loopback();
    let mut bay = Bay::with(2.0, Truss::new(1, [1, 2], 0.5, 7));
    bay.class_override = Some(Quad4::CLASS_TAG);

    let err = marshaller.send(&mut tx, 1, &mut bay).unwrap_err();
    match &err {
        Error::Incomplete(report) => {
            assert_eq!(report.paths(), vec!["member"]);
            assert!(matches!(report.failures()[0].error, Error::InvalidData(_)));
        }
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn test_unregistered_field_class_leaves_no_instance() {
    init_tracing();
    let sender = marshaller();
    let receiver = Marshaller::default();
    let (mut tx, mut rx) = loopback();
    let mut bay = Bay::with(3.0, Truss::new(1, [1, 2], 0.5, 7));
    sender.send(&mut tx, 1, &mut bay).unwrap();

    let mut received = Bay::with(9.0, Truss::new(5, [5, 6], 1.0, 1));
    let err = receiver.receive(&mut rx, 1, &mut received).unwrap_err();
    assert!(err.is_unknown_class_tag());
    match &err {
        Error::Incomplete(report) => {
            assert_eq!(report.paths(), vec!["member"]);
            assert!(matches!(
                report.failures()[0].error,
                Error::UnknownClassTag {
                    class_tag: Truss::CLASS_TAG,
                    ..
                }
            ));
        }
        other => panic!("unexpected {}", other),
    }
    assert!(received.member.is_none());
    assert_eq!(received.span, 3.0);
}
