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

use std::collections::BTreeSet;

use proptest::prelude::*;
use proptest::sample::Index;
use tagwire::model::{Domain, LoadPattern, NodalLoad, Node, Truss};
use tagwire::{loopback, MemoryStore, Tag};
use test_helpers::marshaller;

#[derive(Clone, Debug)]
struct Model {
    nodes: Vec<(Tag, f64, f64)>,
    bars: Vec<(Index, Index, f64)>,
    loads: Vec<(Index, f64)>,
    factor: f64,
    active: bool,
    time: f64,
}

fn model() -> impl Strategy<Value = Model> {
    (
        prop::collection::btree_map(1..500i32, (-1.0e3..1.0e3f64, -1.0e3..1.0e3f64), 1..12),
        prop::collection::vec((any::<Index>(), any::<Index>(), 1.0e-4..1.0f64), 0..16),
        prop::collection::vec((any::<Index>(), -1.0e5..1.0e5f64), 0..8),
        0.0..2.0f64,
        any::<bool>(),
        0.0..100.0f64,
    )
        .prop_map(|(nodes, bars, loads, factor, active, time)| Model {
            nodes: nodes.into_iter().map(|(tag, (x, y))| (tag, x, y)).collect(),
            bars,
            loads,
            factor,
            active,
            time,
        })
}

fn build(model: &Model) -> Domain {
    let mut domain = Domain::new();
    for &(tag, x, y) in &model.nodes {
        domain.add_node(Node::new(tag, [x, y], 2)).unwrap();
    }
    for (i, (a, b, area)) in model.bars.iter().enumerate() {
        let ends = [a.get(&model.nodes).0, b.get(&model.nodes).0];
        domain.add_element(Truss::new(i as Tag + 1, ends, *area, 1)).unwrap();
    }
    domain.add_load_pattern(LoadPattern::new(1, model.factor)).unwrap();
    for (i, (node, value)) in model.loads.iter().enumerate() {
        let load = NodalLoad::new(i as Tag + 1, node.get(&model.nodes).0, [*value, 0.0]);
        domain.add_nodal_load(1, load).unwrap();
    }
    if model.active {
        domain.set_active_patterns(Some(BTreeSet::from([1]))).unwrap();
    }
    domain.commit(model.time);
    domain
}

proptest! {
    #[test]
    fn prop_domain_survives_a_stream(model in model()) {
        let marshaller = marshaller();
        let mut domain = build(&model);
        let (mut tx, mut rx) = loopback();
        marshaller.send(&mut tx, 1, &mut domain).unwrap();

        let mut replica = Domain::new();
        let diagnostics = marshaller.receive(&mut rx, 1, &mut replica).unwrap();
        prop_assert!(diagnostics.is_empty());
        prop_assert!(replica == domain);
        prop_assert_eq!(rx.pending(), 0);
        prop_assert_eq!(replica.connectivity(), domain.connectivity());
    }

    #[test]
    fn prop_state_updates_follow_unchanged_topology(model in model(), shift in -1.0..1.0f64) {
        let marshaller = marshaller();
        let mut domain = build(&model);
        let (mut tx, mut rx) = loopback();
        let mut replica = Domain::new();
        marshaller.send(&mut tx, 1, &mut domain).unwrap();
        marshaller.receive(&mut rx, 1, &mut replica).unwrap();

        for &(tag, _, _) in &model.nodes {
            domain.commit_displacement(tag, &[shift, -shift]).unwrap();
        }
        domain.commit(model.time + 1.0);
        marshaller.send(&mut tx, 2, &mut domain).unwrap();
        marshaller.receive(&mut rx, 2, &mut replica).unwrap();
        prop_assert!(replica == domain);
    }

    #[test]
    fn prop_checkpoint_restores(model in model()) {
        let marshaller = marshaller();
        let mut domain = build(&model);
        let mut store = MemoryStore::new();
        marshaller.send(&mut store, 7, &mut domain).unwrap();

        let mut restored = Domain::new();
        marshaller.receive(&mut store.reopen(), 7, &mut restored).unwrap();
        prop_assert!(restored == domain);
    }
}
