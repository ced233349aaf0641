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

//! The model container.
//!
//! [`Domain`] owns every entity of one analysis in maps keyed by tag and is
//! the versioned aggregate of the protocol: its membership is covered by a
//! single [`VersionLedger`] stamp. A channel that already holds the current
//! membership only receives the unchanged flag and the members' state.

use std::collections::{BTreeMap, BTreeSet};

use tagwire_core::channel::{Channel, ChannelId};
use tagwire_core::error::{Accumulator, Error};
use tagwire_core::slot::{FieldLocator, Slot, SlotSchema, TagSlotTable};
use tagwire_core::types::{ClassTag, CommitVersion, Tag, TopologyFlag};
use tagwire_core::{ensure, Communicator, Marshal, Polymorphic, VersionLedger};

use super::constraint::Constraint;
use super::element::Element;
use super::load::{LoadPattern, NodalLoad};
use super::node::Node;

const SCHEMA: SlotSchema = SlotSchema::new(
    "Domain",
    &[
        Slot::Value,
        Slot::Record,
        Slot::Record,
        Slot::Record,
        Slot::Value,
        Slot::Record,
        Slot::Value,
        Slot::Record,
        Slot::Value,
        Slot::Record,
        Slot::Value,
        Slot::Record,
        Slot::Value,
        Slot::Value,
        Slot::Record,
    ],
);
const TOPOLOGY: FieldLocator = SCHEMA.field(0, 1);
const VERSION: FieldLocator = SCHEMA.field(1, 1);
const TIME: FieldLocator = SCHEMA.field(2, 1);
const STEP: FieldLocator = SCHEMA.field(3, 1);
/// `[tag, wire tag]` pairs
const NODES: FieldLocator = SCHEMA.field(4, 2);
/// `[tag, class tag, wire tag]` triples
const ELEMENTS: FieldLocator = SCHEMA.field(6, 2);
/// `[tag, class tag, wire tag]` triples
const CONSTRAINTS: FieldLocator = SCHEMA.field(8, 2);
/// `[tag, wire tag]` pairs
const PATTERNS: FieldLocator = SCHEMA.field(10, 2);
const ACTIVE_FLAG: FieldLocator = SCHEMA.field(12, 1);
const ACTIVE: FieldLocator = SCHEMA.field(13, 2);

/// Node tag to the tags of the elements attached to it.
pub type Connectivity = BTreeMap<Tag, BTreeSet<Tag>>;

/// Who is in the domain and which nodes each member refers to.
#[derive(Debug, PartialEq)]
struct Membership {
    nodes: Vec<Tag>,
    elements: Vec<(Tag, ClassTag, Vec<Tag>)>,
    constraints: Vec<(Tag, ClassTag, Vec<Tag>)>,
    patterns: Vec<(Tag, Vec<(Tag, Tag)>)>,
    active: Option<BTreeSet<Tag>>,
}

#[derive(Default)]
struct Directories {
    nodes: Vec<i32>,
    elements: Vec<i32>,
    constraints: Vec<i32>,
    patterns: Vec<i32>,
}

#[derive(Debug, Default)]
pub struct Domain {
    table: TagSlotTable,
    ledger: VersionLedger,
    nodes: BTreeMap<Tag, Node>,
    elements: BTreeMap<Tag, Box<dyn Element>>,
    constraints: BTreeMap<Tag, Constraint>,
    patterns: BTreeMap<Tag, LoadPattern>,
    active_patterns: Option<BTreeSet<Tag>>,
    committed_time: f64,
    step: i32,
    connectivity: Option<Connectivity>,
}

impl Domain {
    pub fn new() -> Domain {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), Error> {
        if self.nodes.contains_key(&node.tag()) {
            return Err(Error::duplicate_tag("node", node.tag()));
        }
        self.nodes.insert(node.tag(), node);
        self.ledger.mark_changed();
        Ok(())
    }

    pub fn add_element<E: Element + 'static>(&mut self, element: E) -> Result<(), Error> {
        self.add_boxed_element(Box::new(element))
    }

    /// Adds an element. Every node it connects must already be present.
    pub fn add_boxed_element(&mut self, element: Box<dyn Element>) -> Result<(), Error> {
        if self.elements.contains_key(&element.tag()) {
            return Err(Error::duplicate_tag("element", element.tag()));
        }
        self.require_nodes(element.node_tags())?;
        self.elements.insert(element.tag(), element);
        self.ledger.mark_changed();
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: impl Into<Constraint>) -> Result<(), Error> {
        let constraint = constraint.into();
        if self.constraints.contains_key(&constraint.tag()) {
            return Err(Error::duplicate_tag("constraint", constraint.tag()));
        }
        self.require_nodes(&constraint.node_tags())?;
        self.constraints.insert(constraint.tag(), constraint);
        self.ledger.mark_changed();
        Ok(())
    }

    pub fn add_load_pattern(&mut self, pattern: LoadPattern) -> Result<(), Error> {
        if self.patterns.contains_key(&pattern.tag()) {
            return Err(Error::duplicate_tag("load pattern", pattern.tag()));
        }
        for load in pattern.loads() {
            self.require_nodes(&[load.node()])?;
        }
        self.patterns.insert(pattern.tag(), pattern);
        self.ledger.mark_changed();
        Ok(())
    }

    pub fn add_nodal_load(&mut self, pattern: Tag, load: NodalLoad) -> Result<(), Error> {
        self.require_nodes(&[load.node()])?;
        self.patterns
            .get_mut(&pattern)
            .ok_or_else(|| Error::missing_reference("load pattern", pattern))?
            .insert(load)?;
        self.ledger.mark_changed();
        Ok(())
    }

    fn require_nodes(&self, tags: &[Tag]) -> Result<(), Error> {
        match tags.iter().find(|tag| !self.nodes.contains_key(*tag)) {
            Some(&missing) => Err(Error::missing_reference("node", missing)),
            None => Ok(()),
        }
    }

    /// Removes a node that no element or constraint uses anymore. Nodal loads
    /// on it are dropped from their patterns.
    pub fn remove_node(&mut self, tag: Tag) -> Result<Node, Error> {
        if !self.nodes.contains_key(&tag) {
            return Err(Error::missing_reference("node", tag));
        }
        if let Some(element) = self.elements.values().find(|e| e.node_tags().contains(&tag)) {
            return Err(Error::not_allowed(format!(
                "node {} is still connected to element {}",
                tag,
                element.tag()
            )));
        }
        if let Some(constraint) = self.constraints.values().find(|c| c.node_tags().contains(&tag)) {
            return Err(Error::not_allowed(format!(
                "node {} is still held by constraint {}",
                tag,
                constraint.tag()
            )));
        }
        for pattern in self.patterns.values_mut() {
            pattern.detach_node(tag);
        }
        self.ledger.mark_changed();
        self.nodes
            .remove(&tag)
            .ok_or_else(|| Error::missing_reference("node", tag))
    }

    pub fn remove_element(&mut self, tag: Tag) -> Result<Box<dyn Element>, Error> {
        let element = self
            .elements
            .remove(&tag)
            .ok_or_else(|| Error::missing_reference("element", tag))?;
        self.ledger.mark_changed();
        Ok(element)
    }

    pub fn remove_constraint(&mut self, tag: Tag) -> Result<Constraint, Error> {
        let constraint = self
            .constraints
            .remove(&tag)
            .ok_or_else(|| Error::missing_reference("constraint", tag))?;
        self.ledger.mark_changed();
        Ok(constraint)
    }

    /// Removes a pattern and takes it out of the active set.
    pub fn remove_load_pattern(&mut self, tag: Tag) -> Result<LoadPattern, Error> {
        let pattern = self
            .patterns
            .remove(&tag)
            .ok_or_else(|| Error::missing_reference("load pattern", tag))?;
        if let Some(active) = self.active_patterns.as_mut() {
            active.remove(&tag);
        }
        self.ledger.mark_changed();
        Ok(pattern)
    }

    /// Restricts the analysis to the given patterns; `None` activates all.
    pub fn set_active_patterns(&mut self, active: Option<BTreeSet<Tag>>) -> Result<(), Error> {
        if let Some(tags) = &active {
            if let Some(&missing) = tags.iter().find(|tag| !self.patterns.contains_key(*tag)) {
                return Err(Error::missing_reference("load pattern", missing));
            }
        }
        self.active_patterns = active;
        self.ledger.mark_changed();
        Ok(())
    }

    /// Closes a step at `time`.
    pub fn commit(&mut self, time: f64) {
        self.committed_time = time;
        self.step += 1;
    }

    pub fn commit_displacement(&mut self, node: Tag, values: &[f64]) -> Result<(), Error> {
        self.nodes
            .get_mut(&node)
            .ok_or_else(|| Error::missing_reference("node", node))?
            .set_disp(values)
    }

    /// Folds pending membership changes into a new version. Cached derived
    /// structures are dropped when the version moves.
    pub fn has_changed(&mut self) -> bool {
        let moved = self.ledger.refresh();
        if moved {
            self.connectivity = None;
        }
        moved
    }

    pub fn version(&mut self) -> CommitVersion {
        self.has_changed();
        self.ledger.current()
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    /// Forgets what `channel` has sent or received of this domain. The next
    /// encode on it sends the full topology, and the next decode only
    /// accepts a full one. Use it after a failed exchange left the two ends
    /// out of step.
    pub fn resync(&mut self, channel: ChannelId) {
        tracing::debug!(target: "tagwire::domain", channel = channel.get(), "resync");
        self.ledger.forget(channel);
    }

    /// Elements attached to each node, rebuilt after membership changes.
    pub fn connectivity(&mut self) -> &Connectivity {
        self.has_changed();
        let elements = &self.elements;
        self.connectivity.get_or_insert_with(|| {
            let mut graph = Connectivity::new();
            for element in elements.values() {
                for node in element.node_tags() {
                    graph.entry(*node).or_default().insert(element.tag());
                }
            }
            graph
        })
    }

    pub fn node(&self, tag: Tag) -> Option<&Node> {
        self.nodes.get(&tag)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn element(&self, tag: Tag) -> Option<&dyn Element> {
        self.elements.get(&tag).map(|e| e.as_ref())
    }

    pub fn elements(&self) -> impl Iterator<Item = &dyn Element> {
        self.elements.values().map(|e| e.as_ref())
    }

    pub fn constraint(&self, tag: Tag) -> Option<&Constraint> {
        self.constraints.get(&tag)
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }

    pub fn load_pattern(&self, tag: Tag) -> Option<&LoadPattern> {
        self.patterns.get(&tag)
    }

    pub fn load_patterns(&self) -> impl Iterator<Item = &LoadPattern> {
        self.patterns.values()
    }

    pub fn active_patterns(&self) -> Option<&BTreeSet<Tag>> {
        self.active_patterns.as_ref()
    }

    pub fn committed_time(&self) -> f64 {
        self.committed_time
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    /// Member directories with every member's wire tag on `channel`.
    fn directories(&mut self, channel: &mut dyn Channel) -> Directories {
        let mut dirs = Directories::default();
        for (tag, node) in self.nodes.iter_mut() {
            dirs.nodes.extend([*tag, node.wire_tag(channel)]);
        }
        for (tag, element) in self.elements.iter_mut() {
            let class_tag = element.class_tag();
            dirs.elements.extend([*tag, class_tag, element.wire_tag(channel)]);
        }
        for (tag, constraint) in self.constraints.iter_mut() {
            let class_tag = constraint.class_tag();
            dirs.constraints.extend([*tag, class_tag, constraint.wire_tag(channel)]);
        }
        for (tag, pattern) in self.patterns.iter_mut() {
            dirs.patterns.extend([*tag, pattern.wire_tag(channel)]);
        }
        dirs
    }

    fn membership(&self) -> Membership {
        Membership {
            nodes: self.nodes.keys().copied().collect(),
            elements: self
                .elements
                .iter()
                .map(|(t, e)| (*t, e.class_tag(), e.node_tags().to_vec()))
                .collect(),
            constraints: self
                .constraints
                .iter()
                .map(|(t, c)| (*t, c.class_tag(), c.node_tags()))
                .collect(),
            patterns: self
                .patterns
                .iter()
                .map(|(t, p)| (*t, p.loads().map(|l| (l.tag(), l.node())).collect()))
                .collect(),
            active: self.active_patterns.clone(),
        }
    }

    fn encode_members(
        &mut self,
        comm: &mut Communicator<'_>,
        acc: &mut Accumulator,
        topology: TopologyFlag,
    ) {
        for (tag, node) in self.nodes.iter_mut() {
            acc.field(&format!("node {}", tag), comm.send_member(node));
        }
        for (tag, element) in self.elements.iter_mut() {
            acc.field(&format!("element {}", tag), comm.send_member(&mut **element));
        }
        for (tag, constraint) in self.constraints.iter_mut() {
            acc.field(&format!("constraint {}", tag), comm.send_member(constraint));
        }
        for (tag, pattern) in self.patterns.iter_mut() {
            pattern.stage_topology(topology);
            acc.field(&format!("load pattern {}", tag), comm.send_member(pattern));
        }
    }

    /// Rebuilds membership from the directories. A collection whose
    /// directory did not arrive keeps its current members. Members already
    /// held under a listed tag and class are decoded in place, so they keep
    /// their wire tags on other channels.
    ///
    /// Returns whether the membership changed.
    fn decode_topology(&mut self, comm: &mut Communicator<'_>, acc: &mut Accumulator) -> bool {
        let before = self.membership();
        let nodes = receive_directory(comm, &self.table, NODES, 2);
        let elements = receive_directory(comm, &self.table, ELEMENTS, 3);
        let constraints = receive_directory(comm, &self.table, CONSTRAINTS, 3);
        let patterns = receive_directory(comm, &self.table, PATTERNS, 2);
        let active = if self.table.flag(ACTIVE_FLAG) {
            acc.value("active_patterns", comm.receive_list::<Tag>(&self.table, ACTIVE))
                .map(Some)
        } else {
            Some(None)
        };

        if let Some(dir) = acc.value("nodes", nodes) {
            let mut nodes = BTreeMap::new();
            for entry in dir.chunks_exact(2) {
                let (tag, wire_tag) = (entry[0], entry[1]);
                let mut node = self.nodes.remove(&tag).unwrap_or_default();
                let result = comm
                    .receive_member(&mut node, wire_tag)
                    .and_then(|()| check_tag("node", tag, node.tag()));
                if acc.value(&format!("node {}", tag), result).is_some() {
                    nodes.insert(tag, node);
                }
            }
            self.nodes = nodes;
        }

        if let Some(dir) = acc.value("elements", elements) {
            let mut elements = BTreeMap::new();
            for entry in dir.chunks_exact(3) {
                let (tag, class_tag, wire_tag) = (entry[0], entry[1], entry[2]);
                let held = self.elements.remove(&tag).filter(|e| e.class_tag() == class_tag);
                let result = match held {
                    Some(mut element) => comm
                        .receive_member(&mut *element, wire_tag)
                        .map(|()| element),
                    None => comm.receive_polymorphic_member::<dyn Element>(class_tag, wire_tag),
                }
                .and_then(|e| check_tag("element", tag, e.tag()).map(|()| e));
                if let Some(element) = acc.value(&format!("element {}", tag), result) {
                    elements.insert(tag, element);
                }
            }
            self.elements = elements;
        }

        if let Some(dir) = acc.value("constraints", constraints) {
            let mut constraints = BTreeMap::new();
            for entry in dir.chunks_exact(3) {
                let (tag, class_tag, wire_tag) = (entry[0], entry[1], entry[2]);
                let held = self.constraints.remove(&tag).filter(|c| c.class_tag() == class_tag);
                let result = held.map_or_else(|| Constraint::for_class_tag(class_tag), Ok);
                let result = result.and_then(|mut c| {
                    comm.receive_member(&mut c, wire_tag)?;
                    check_tag("constraint", tag, c.tag())?;
                    Ok(c)
                });
                if let Some(constraint) = acc.value(&format!("constraint {}", tag), result) {
                    constraints.insert(tag, constraint);
                }
            }
            self.constraints = constraints;
        }

        if let Some(dir) = acc.value("load_patterns", patterns) {
            let mut patterns = BTreeMap::new();
            for entry in dir.chunks_exact(2) {
                let (tag, wire_tag) = (entry[0], entry[1]);
                let mut pattern = self.patterns.remove(&tag).unwrap_or_default();
                let result = comm
                    .receive_member(&mut pattern, wire_tag)
                    .and_then(|()| check_tag("load pattern", tag, pattern.tag()));
                if acc.value(&format!("load pattern {}", tag), result).is_some() {
                    patterns.insert(tag, pattern);
                }
            }
            self.patterns = patterns;
        }

        if let Some(active) = active {
            self.active_patterns = active.map(|tags| tags.into_iter().collect());
        }
        self.resolve_references(comm);
        let changed = self.membership() != before;
        if changed {
            self.ledger.mark_changed();
            self.connectivity = None;
        }
        changed
    }

    /// Drops references to entities this side does not hold.
    fn resolve_references(&mut self, comm: &mut Communicator<'_>) {
        let nodes = &self.nodes;
        self.elements.retain(|tag, element| {
            match element.node_tags().iter().find(|n| !nodes.contains_key(*n)) {
                Some(&missing) => {
                    comm.skip_reference("node", missing, format!("element {}", tag));
                    false
                }
                None => true,
            }
        });
        self.constraints.retain(|tag, constraint| {
            match constraint.node_tags().into_iter().find(|n| !nodes.contains_key(n)) {
                Some(missing) => {
                    comm.skip_reference("node", missing, format!("constraint {}", tag));
                    false
                }
                None => true,
            }
        });
        for (pattern_tag, pattern) in self.patterns.iter_mut() {
            let missing: BTreeSet<Tag> = pattern
                .loads()
                .map(|load| load.node())
                .filter(|node| !nodes.contains_key(node))
                .collect();
            for node in missing {
                for load in pattern.detach_node(node) {
                    let holder = format!("load pattern {}/load {}", pattern_tag, load);
                    comm.skip_reference("node", node, holder);
                }
            }
        }
        if let Some(active) = self.active_patterns.as_mut() {
            let patterns = &self.patterns;
            active.retain(|tag| {
                let known = patterns.contains_key(tag);
                if !known {
                    comm.skip_reference("load pattern", *tag, "active pattern set");
                }
                known
            });
        }
    }

    /// Updates the members this side already holds, in place.
    fn decode_members(&mut self, comm: &mut Communicator<'_>, acc: &mut Accumulator) {
        for (tag, node) in self.nodes.iter_mut() {
            acc.field(&format!("node {}", tag), comm.receive_known_member(node));
        }
        for (tag, element) in self.elements.iter_mut() {
            acc.field(&format!("element {}", tag), comm.receive_known_member(&mut **element));
        }
        for (tag, constraint) in self.constraints.iter_mut() {
            acc.field(&format!("constraint {}", tag), comm.receive_known_member(constraint));
        }
        for (tag, pattern) in self.patterns.iter_mut() {
            acc.field(&format!("load pattern {}", tag), comm.receive_known_member(pattern));
        }
    }
}

fn receive_directory(
    comm: &mut Communicator<'_>,
    table: &TagSlotTable,
    locator: FieldLocator,
    stride: usize,
) -> Result<Vec<i32>, Error> {
    let directory = comm.receive_list::<i32>(table, locator)?;
    ensure!(
        directory.len() % stride == 0,
        Error::invalid_data(format!(
            "directory of {} entries is not a multiple of {}",
            directory.len(),
            stride
        ))
    );
    Ok(directory)
}

fn check_tag(kind: &'static str, listed: Tag, decoded: Tag) -> Result<(), Error> {
    ensure!(
        listed == decoded,
        Error::invalid_data(format!(
            "directory lists {} {} but the record holds {} {}",
            kind, listed, kind, decoded
        ))
    );
    Ok(())
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|((a, x), (b, y))| a == b && **x == **y)
            && self.constraints == other.constraints
            && self.patterns == other.patterns
            && self.active_patterns == other.active_patterns
            && self.committed_time == other.committed_time
            && self.step == other.step
    }
}

impl Marshal for Domain {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&SCHEMA)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        self.has_changed();
        let channel = comm.channel_id();
        let force_full = comm.retains_history() || comm.config().is_resend_topology();
        let topology = self.ledger.plan(channel, force_full);
        let version = self.ledger.current();
        tracing::debug!(
            target: "tagwire::domain",
            channel = channel.get(),
            commit = comm.commit(),
            version,
            ?topology,
            "encode domain"
        );

        let directories = match topology {
            TopologyFlag::Full => Some(self.directories(comm.channel())),
            TopologyFlag::Unchanged => None,
        };
        let active: Vec<Tag> = match (&directories, &self.active_patterns) {
            (Some(_), Some(active)) => active.iter().copied().collect(),
            _ => Vec::new(),
        };
        let table = self.table.ensure(&SCHEMA);
        table.set(TOPOLOGY, 0, topology.into());
        let counts = directories.as_ref().map_or([0; 4], |d| {
            [d.nodes.len(), d.elements.len(), d.constraints.len(), d.patterns.len()]
        });
        table.stage_len(NODES, counts[0]);
        table.stage_len(ELEMENTS, counts[1]);
        table.stage_len(CONSTRAINTS, counts[2]);
        table.stage_len(PATTERNS, counts[3]);
        table.stage_flag(ACTIVE_FLAG, directories.is_some() && self.active_patterns.is_some());
        table.stage_len(ACTIVE, active.len());
        comm.write_header(table)?;

        let mut acc = Accumulator::default();
        acc.field("version", comm.send_scalar(&self.table, VERSION, version as i64));
        acc.field("time", comm.send_scalar(&self.table, TIME, self.committed_time));
        acc.field("step", comm.send_scalar(&self.table, STEP, self.step));
        if let Some(dirs) = &directories {
            acc.field("nodes", comm.send_list(&self.table, NODES, &dirs.nodes));
            acc.field("elements", comm.send_list(&self.table, ELEMENTS, &dirs.elements));
            acc.field(
                "constraints",
                comm.send_list(&self.table, CONSTRAINTS, &dirs.constraints),
            );
            acc.field(
                "load_patterns",
                comm.send_list(&self.table, PATTERNS, &dirs.patterns),
            );
            if self.table.flag(ACTIVE_FLAG) {
                acc.field("active_patterns", comm.send_list(&self.table, ACTIVE, &active));
            }
        }
        self.encode_members(comm, &mut acc, topology);

        let result = acc.finish();
        if topology == TopologyFlag::Full && result.is_ok() {
            self.ledger.record_sent(channel);
        }
        result
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&SCHEMA))?;
        let flag = self.table.get(TOPOLOGY, 0);
        let topology = TopologyFlag::try_from(flag)
            .map_err(|_| Error::invalid_data(format!("unknown topology flag {}", flag)))?;
        let channel = comm.channel_id();

        let mut acc = Accumulator::default();
        let version = acc.value(
            "version",
            comm.receive_scalar::<i64>(&self.table, VERSION)
                .map(|v| v as CommitVersion),
        );
        acc.field(
            "time",
            comm.receive_scalar(&self.table, TIME).map(|t| self.committed_time = t),
        );
        acc.field(
            "step",
            comm.receive_scalar(&self.table, STEP).map(|s| self.step = s),
        );
        tracing::debug!(
            target: "tagwire::domain",
            channel = channel.get(),
            commit = comm.commit(),
            version,
            ?topology,
            "decode domain"
        );

        match topology {
            TopologyFlag::Full => {
                if self.decode_topology(comm, &mut acc) {
                    self.ledger.forget_received_except(channel);
                }
                if let (Some(version), false) = (version, acc.failed()) {
                    self.ledger.record_received(channel, version);
                }
            }
            TopologyFlag::Unchanged => {
                let in_sync = version
                    .ok_or_else(|| Error::invalid_data("unchanged topology without a version"))
                    .and_then(|v| self.ledger.check_unchanged(channel, v));
                match in_sync {
                    Ok(()) => self.decode_members(comm, &mut acc),
                    Err(err) => acc.field("topology", Err(err)),
                }
            }
        }
        acc.finish()
    }
}
