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

use std::collections::BTreeMap;

use tagwire_core::error::{Accumulator, Error};
use tagwire_core::slot::{FieldLocator, Slot, SlotSchema, TagSlotTable};
use tagwire_core::types::{Tag, TopologyFlag};
use tagwire_core::{ensure, Communicator, Marshal};

const LOAD_SCHEMA: SlotSchema =
    SlotSchema::new("NodalLoad", &[Slot::Record, Slot::Value, Slot::Record]);
/// `[tag, node]`
const LOAD_IDS: FieldLocator = LOAD_SCHEMA.field(0, 1);
const LOAD_VALUES: FieldLocator = LOAD_SCHEMA.field(1, 2);

const PATTERN_SCHEMA: SlotSchema = SlotSchema::new(
    "LoadPattern",
    &[Slot::Record, Slot::Record, Slot::Value, Slot::Value, Slot::Record],
);
/// `[tag]`
const PATTERN_IDS: FieldLocator = PATTERN_SCHEMA.field(0, 1);
const PATTERN_FACTOR: FieldLocator = PATTERN_SCHEMA.field(1, 1);
const PATTERN_TOPOLOGY: FieldLocator = PATTERN_SCHEMA.field(2, 1);
/// `[load tag, wire tag]` pairs, sent with full topology only
const PATTERN_LOADS: FieldLocator = PATTERN_SCHEMA.field(3, 2);

/// A force vector applied at one node. The node is referenced by tag.
#[derive(Clone, Debug, Default)]
pub struct NodalLoad {
    table: TagSlotTable,
    tag: Tag,
    node: Tag,
    values: Vec<f64>,
}

impl NodalLoad {
    pub fn new(tag: Tag, node: Tag, values: impl Into<Vec<f64>>) -> NodalLoad {
        NodalLoad {
            table: TagSlotTable::default(),
            tag,
            node,
            values: values.into(),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn node(&self) -> Tag {
        self.node
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl PartialEq for NodalLoad {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.node == other.node && self.values == other.values
    }
}

impl Marshal for NodalLoad {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&LOAD_SCHEMA)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let table = self.table.ensure(&LOAD_SCHEMA);
        table.stage_len(LOAD_VALUES, self.values.len());
        comm.write_header(table)?;

        let mut acc = Accumulator::default();
        acc.field("ids", comm.send_array(&self.table, LOAD_IDS, &[self.tag, self.node]));
        acc.field("values", comm.send_list(&self.table, LOAD_VALUES, &self.values));
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&LOAD_SCHEMA))?;

        let mut acc = Accumulator::default();
        let mut ids = [0i32; 2];
        acc.field(
            "ids",
            comm.receive_array(&self.table, LOAD_IDS, &mut ids).map(|()| {
                self.tag = ids[0];
                self.node = ids[1];
            }),
        );
        acc.field(
            "values",
            comm.receive_list(&self.table, LOAD_VALUES).map(|v| self.values = v),
        );
        acc.finish()
    }
}

/// A scaled set of nodal loads.
///
/// The pattern has no version of its own: its membership changes are tracked
/// by the owning [`Domain`](super::Domain), which tells the pattern before
/// each encode whether the channel needs the load directory. A pattern sent
/// on its own always lists its loads.
#[derive(Clone, Debug, Default)]
pub struct LoadPattern {
    table: TagSlotTable,
    tag: Tag,
    factor: f64,
    loads: BTreeMap<Tag, NodalLoad>,
    topology: Option<TopologyFlag>,
}

impl LoadPattern {
    pub fn new(tag: Tag, factor: f64) -> LoadPattern {
        LoadPattern {
            table: TagSlotTable::default(),
            tag,
            factor,
            loads: BTreeMap::new(),
            topology: None,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
    }

    pub fn load(&self, tag: Tag) -> Option<&NodalLoad> {
        self.loads.get(&tag)
    }

    pub fn loads(&self) -> impl Iterator<Item = &NodalLoad> {
        self.loads.values()
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// Adds `load`; a load with the same tag leaves the pattern unchanged.
    pub(crate) fn insert(&mut self, load: NodalLoad) -> Result<(), Error> {
        if self.loads.contains_key(&load.tag) {
            return Err(Error::duplicate_tag("nodal load", load.tag));
        }
        self.loads.insert(load.tag, load);
        Ok(())
    }

    /// Topology decision of the owning domain for the next encode only.
    pub(crate) fn stage_topology(&mut self, topology: TopologyFlag) {
        self.topology = Some(topology);
    }

    /// Drops every load on `node` and returns their tags.
    pub(crate) fn detach_node(&mut self, node: Tag) -> Vec<Tag> {
        let dropped: Vec<Tag> = self
            .loads
            .values()
            .filter(|load| load.node == node)
            .map(|load| load.tag)
            .collect();
        for tag in &dropped {
            self.loads.remove(tag);
        }
        dropped
    }
}

impl PartialEq for LoadPattern {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.factor == other.factor && self.loads == other.loads
    }
}

impl Marshal for LoadPattern {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&PATTERN_SCHEMA)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let topology = self.topology.take().unwrap_or(TopologyFlag::Full);
        let mut directory = Vec::new();
        if topology == TopologyFlag::Full {
            directory.reserve(self.loads.len() * 2);
            for (tag, load) in self.loads.iter_mut() {
                directory.push(*tag);
                directory.push(load.wire_tag(comm.channel()));
            }
        }
        let table = self.table.ensure(&PATTERN_SCHEMA);
        table.set(PATTERN_TOPOLOGY, 0, topology.into());
        table.stage_len(PATTERN_LOADS, directory.len());
        comm.write_header(table)?;

        let mut acc = Accumulator::default();
        acc.field("ids", comm.send_array(&self.table, PATTERN_IDS, &[self.tag]));
        acc.field("factor", comm.send_scalar(&self.table, PATTERN_FACTOR, self.factor));
        if topology == TopologyFlag::Full {
            acc.field("loads", comm.send_list(&self.table, PATTERN_LOADS, &directory));
        }
        for (tag, load) in self.loads.iter_mut() {
            acc.field(&format!("load {}", tag), comm.send_member(load));
        }
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&PATTERN_SCHEMA))?;

        let mut acc = Accumulator::default();
        let mut ids = [0i32; 1];
        acc.field(
            "ids",
            comm.receive_array(&self.table, PATTERN_IDS, &mut ids).map(|()| self.tag = ids[0]),
        );
        acc.field(
            "factor",
            comm.receive_scalar(&self.table, PATTERN_FACTOR).map(|f| self.factor = f),
        );
        let flag = self.table.get(PATTERN_TOPOLOGY, 0);
        match TopologyFlag::try_from(flag) {
            Ok(TopologyFlag::Full) => self.decode_directory(comm, &mut acc),
            Ok(TopologyFlag::Unchanged) => {
                for (tag, load) in self.loads.iter_mut() {
                    acc.field(&format!("load {}", tag), comm.receive_known_member(load));
                }
            }
            Err(_) => acc.field(
                "loads",
                Err(Error::invalid_data(format!("unknown topology flag {}", flag))),
            ),
        }
        acc.finish()
    }
}

impl LoadPattern {
    /// Rebuilds the loads from the directory. Loads already held under a
    /// listed tag are decoded in place and keep their wire tags on other
    /// channels.
    fn decode_directory(&mut self, comm: &mut Communicator<'_>, acc: &mut Accumulator) {
        let tag = self.tag;
        let directory = comm
            .receive_list::<i32>(&self.table, PATTERN_LOADS)
            .and_then(|d| {
                ensure!(
                    d.len() % 2 == 0,
                    Error::invalid_data(format!(
                        "load directory of pattern {} has odd length {}",
                        tag,
                        d.len()
                    ))
                );
                Ok(d)
            });
        let Some(directory) = acc.value("loads", directory) else {
            return;
        };

        let mut loads = BTreeMap::new();
        for entry in directory.chunks_exact(2) {
            let (tag, wire_tag) = (entry[0], entry[1]);
            let mut load = self.loads.remove(&tag).unwrap_or_default();
            let result = comm.receive_member(&mut load, wire_tag).and_then(|()| {
                ensure!(
                    load.tag == tag,
                    Error::invalid_data(format!(
                        "directory lists load {} but the record holds load {}",
                        tag, load.tag
                    ))
                );
                Ok(())
            });
            if acc.value(&format!("load {}", tag), result).is_some() {
                loads.insert(tag, load);
            }
        }
        self.loads = loads;
    }
}
