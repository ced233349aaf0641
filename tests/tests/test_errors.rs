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

use tagwire::model::Domain;
use tagwire::{
    loopback, Accumulator, Communicator, Error, FieldLocator, Marshal, Marshaller, Slot,
    SlotSchema, TagSlotTable,
};
use test_helpers::{init_tracing, marshaller, portal_frame, Fault, FaultyChannel};

const GAUGE: SlotSchema = SlotSchema::new("Gauge", &[Slot::Record; 5]);
const NAMES: [&str; 5] = ["f1", "f2", "f3", "f4", "f5"];

/// Five independent readings, each in its own record.
#[derive(Debug, Default)]
struct Gauge {
    table: TagSlotTable,
    readings: [f64; 5],
}

impl Gauge {
    fn locator(i: usize) -> FieldLocator {
        GAUGE.field(i, 1)
    }
}

impl Marshal for Gauge {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&GAUGE)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.write_header(self.table.ensure(&GAUGE))?;
        let mut acc = Accumulator::default();
        for (i, name) in NAMES.iter().enumerate() {
            acc.field(name, comm.send_scalar(&self.table, Self::locator(i), self.readings[i]));
        }
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&GAUGE))?;
        let mut acc = Accumulator::default();
        for (i, name) in NAMES.iter().enumerate() {
            if let Some(v) = acc.value(name, comm.receive_scalar(&self.table, Self::locator(i))) {
                self.readings[i] = v;
            }
        }
        acc.finish()
    }
}

const SHORT_GAUGE: SlotSchema = SlotSchema::new("Gauge", &[Slot::Record; 3]);

/// Same name, older layout.
#[derive(Debug, Default)]
struct ShortGauge {
    table: TagSlotTable,
}

impl Marshal for ShortGauge {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&SHORT_GAUGE)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.write_header(self.table.ensure(&SHORT_GAUGE))
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&SHORT_GAUGE))
    }
}

#[test]
fn test_failed_field_does_not_stop_the_others() {
    init_tracing();
    let marshaller = Marshaller::default();
    let (tx, mut rx) = loopback();
    // sends: root locator, header, f1, f2, f3
    let mut faulty = FaultyChannel::new(tx, Fault::Nth(4));
    let mut gauge = Gauge {
        readings: [1.0, 2.0, 3.0, 4.0, 5.0],
        ..Default::default()
    };

    let err = marshaller.send(&mut faulty, 1, &mut gauge).unwrap_err();
    match &err {
        Error::Incomplete(report) => {
            assert_eq!(report.len(), 1);
            assert_eq!(report.paths(), vec!["f3"]);
            assert!(matches!(report.failures()[0].error, Error::Transport(_)));
        }
        other => panic!("unexpected {}", other),
    }
    assert_eq!(faulty.dropped, 1);

    let mut received = Gauge::default();
    let err = marshaller.receive(&mut rx, 1, &mut received).unwrap_err();
    match &err {
        Error::Incomplete(report) => assert_eq!(report.paths(), vec!["f3"]),
        other => panic!("unexpected {}", other),
    }
    assert_eq!(received.readings, [1.0, 2.0, 0.0, 4.0, 5.0]);
}

#[test]
fn test_schema_mismatch_aborts_the_session() {
    init_tracing();
    let marshaller = Marshaller::default();
    let (mut tx, mut rx) = loopback();
    marshaller.send(&mut tx, 1, &mut Gauge::default()).unwrap();
    marshaller.send(&mut tx, 2, &mut Gauge::default()).unwrap();

    let mut comm = marshaller.session(&mut rx, 1);
    let err = comm.receive_root(&mut ShortGauge::default()).unwrap_err();
    match err {
        Error::SchemaMismatch {
            type_name,
            expected,
            actual,
        } => {
            assert_eq!(type_name, "Gauge");
            assert_eq!(expected, 3);
            assert_eq!(actual, 5);
        }
        other => panic!("unexpected {}", other),
    }
    assert!(comm.is_aborted());
    let err = comm.receive_root(&mut Gauge::default()).unwrap_err();
    assert!(matches!(err, Error::SessionAborted));
    assert!(err.is_fatal());
    drop(comm);

    // a new session on the same channel starts clean
    let mut gauge = Gauge::default();
    marshaller.receive(&mut rx, 2, &mut gauge).unwrap();
}

const PAIR: SlotSchema = SlotSchema::new("Pair", &[Slot::Record, Slot::Record]);

/// Two sub-entities under one header.
#[derive(Default)]
struct Pair<A, B> {
    table: TagSlotTable,
    first: A,
    second: B,
}

impl<A: Marshal, B: Marshal> Marshal for Pair<A, B> {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&PAIR)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.write_header(self.table.ensure(&PAIR))?;
        let mut acc = Accumulator::default();
        acc.field("first", comm.send_entity(&self.table, PAIR.field(0, 1), &mut self.first));
        acc.field("second", comm.send_entity(&self.table, PAIR.field(1, 1), &mut self.second));
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&PAIR))?;
        let mut acc = Accumulator::default();
        acc.field("first", comm.receive_entity(&self.table, PAIR.field(0, 1), &mut self.first));
        acc.field("second", comm.receive_entity(&self.table, PAIR.field(1, 1), &mut self.second));
        acc.finish()
    }
}

#[test]
fn test_schema_mismatch_inside_an_aggregate_is_fatal() {
    let marshaller = Marshaller::default();
    let (mut tx, mut rx) = loopback();
    let mut sent = Pair::<Gauge, Gauge>::default();
    sent.first.readings[0] = 7.5;
    marshaller.send(&mut tx, 1, &mut sent).unwrap();

    let mut received = Pair::<Gauge, ShortGauge>::default();
    let err = marshaller.receive(&mut rx, 1, &mut received).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::SchemaMismatch { .. }));
    assert_eq!(received.first.readings[0], 7.5);
}

#[test]
fn test_nesting_beyond_max_depth_fails_the_field() {
    init_tracing();
    let marshaller = marshaller().max_depth(2);
    let (mut tx, mut rx) = loopback();
    let mut domain = portal_frame();

    let err = marshaller.send(&mut tx, 1, &mut domain).unwrap_err();
    let report = match &err {
        Error::Incomplete(report) => report,
        other => panic!("unexpected {}", other),
    };
    assert_eq!(
        report.paths(),
        vec!["load pattern 1/load 10", "load pattern 1/load 11", "load pattern 2/load 20"]
    );
    assert!(report
        .failures()
        .iter()
        .all(|f| matches!(f.error, Error::DepthExceed(_))));

    // the patterns fail as members, everything else still arrives
    let mut replica = Domain::new();
    let err = marshaller.receive(&mut rx, 1, &mut replica).unwrap_err();
    assert!(err.find(|e| matches!(e, Error::DepthExceed(_))).is_some());
    assert_eq!(replica.nodes().count(), 5);
    assert_eq!(replica.elements().count(), 5);
    assert_eq!(replica.constraints().count(), 4);
    assert_eq!(replica.load_patterns().count(), 0);
}
