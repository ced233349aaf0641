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

use tagwire::model::{Domain, Node, Truss};
use tagwire::{Error, MemoryStore};
use test_helpers::{init_tracing, marshaller, portal_frame};

/// The portal frame one step later: node 2 moved and a brace added.
fn second_step(domain: &mut Domain) {
    domain.commit_displacement(2, &[0.01, -0.002, 0.0]).unwrap();
    domain.add_node(Node::new(6, [2.0, 4.5], 3)).unwrap();
    domain.add_element(Truss::new(6, [2, 6], 0.004, 7)).unwrap();
    domain.commit(0.5);
}

#[test]
fn test_each_commit_restores_on_its_own() {
    init_tracing();
    let marshaller = marshaller();
    let mut store = MemoryStore::new();
    let mut domain = portal_frame();

    marshaller.send(&mut store, 1, &mut domain).unwrap();
    let first = store.len();
    assert_eq!(store.records_at(1), first);
    second_step(&mut domain);
    marshaller.send(&mut store, 2, &mut domain).unwrap();
    assert!(store.records_at(2) > 0);
    assert_eq!(store.len(), store.records_at(1) + store.records_at(2));

    // newest first, then back in time on the same handle
    let mut reader = store.reopen();
    let mut restored = Domain::new();
    marshaller.receive(&mut reader, 2, &mut restored).unwrap();
    assert!(restored == domain);
    assert_eq!(restored.step(), 2);
    assert_eq!(restored.node(2).unwrap().disp(), &[0.01, -0.002, 0.0]);

    marshaller.receive(&mut reader, 1, &mut restored).unwrap();
    assert!(restored == portal_frame());
    assert!(restored.node(6).is_none());
    assert_eq!(restored.committed_time(), 0.25);
}

#[test]
fn test_store_always_gets_full_topology() {
    let marshaller = marshaller();
    let mut store = MemoryStore::new();
    let mut domain = portal_frame();
    marshaller.send(&mut store, 1, &mut domain).unwrap();
    marshaller.send(&mut store, 2, &mut domain).unwrap();
    // unchanged membership still writes every directory at every commit
    assert_eq!(store.records_at(1), store.records_at(2));

    let mut restored = Domain::new();
    marshaller.receive(&mut store.reopen(), 2, &mut restored).unwrap();
    assert!(restored == domain);
}

#[test]
fn test_missing_commit_is_a_transport_error() {
    let marshaller = marshaller();
    let mut store = MemoryStore::new();
    marshaller.send(&mut store, 1, &mut portal_frame()).unwrap();

    let mut restored = Domain::new();
    let err = marshaller.receive(&mut store.reopen(), 3, &mut restored).unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{}", err);
    assert!(!err.is_fatal());
    assert_eq!(restored.nodes().count(), 0);
}

#[test]
fn test_overwritten_commit_restores_the_latest() {
    let marshaller = marshaller();
    let mut store = MemoryStore::new();
    let mut domain = portal_frame();
    marshaller.send(&mut store, 1, &mut domain).unwrap();
    second_step(&mut domain);
    marshaller.send(&mut store, 1, &mut domain).unwrap();

    let mut restored = Domain::new();
    marshaller.receive(&mut store.reopen(), 1, &mut restored).unwrap();
    assert!(restored == domain);
}
