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

//! The open element family.
//!
//! Elements are looked up by class tag through the
//! [`TypeBroker`](tagwire_core::TypeBroker), so downstream crates can add
//! their own. [`register_elements`] registers the ones defined here.

use std::any::Any;
use std::fmt::Debug;

use tagwire_core::error::{Accumulator, Error};
use tagwire_core::slot::{FieldLocator, Slot, SlotSchema, TagSlotTable};
use tagwire_core::types::{ClassTag, Tag};
use tagwire_core::{Communicator, Marshal, Marshaller, Polymorphic};

/// Every element header is `[ids, props]`: an int record starting with the
/// element tag and followed by its node tags, then a double record.
const PARTS: &[Slot] = &[Slot::Record, Slot::Record];

/// Schema of one element type with its two locators.
struct Parts {
    schema: &'static SlotSchema,
    ids: FieldLocator,
    props: FieldLocator,
}

impl Parts {
    const fn of(schema: &'static SlotSchema) -> Parts {
        Parts {
            schema,
            ids: schema.field(0, 1),
            props: schema.field(1, 1),
        }
    }
}

const TRUSS_SCHEMA: SlotSchema = SlotSchema::new("Truss", PARTS);
const BEAM2D_SCHEMA: SlotSchema = SlotSchema::new("Beam2d", PARTS);
const QUAD4_SCHEMA: SlotSchema = SlotSchema::new("Quad4", PARTS);

const TRUSS: Parts = Parts::of(&TRUSS_SCHEMA);
const BEAM2D: Parts = Parts::of(&BEAM2D_SCHEMA);
const QUAD4: Parts = Parts::of(&QUAD4_SCHEMA);

pub trait Element: Polymorphic + Debug {
    fn tag(&self) -> Tag;

    /// Tags of the nodes this element connects, in local order.
    fn node_tags(&self) -> &[Tag];

    fn as_any(&self) -> &dyn Any;

    /// Field-wise equality with another element of any concrete type.
    fn same_as(&self, other: &dyn Element) -> bool;
}

impl PartialEq for dyn Element {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

/// Registers every element type of this module with `marshaller`.
pub fn register_elements(marshaller: &mut Marshaller) -> Result<(), Error> {
    marshaller.register::<dyn Element, _>(Truss::CLASS_TAG, || {
        Box::new(Truss::default()) as Box<dyn Element>
    })?;
    marshaller.register::<dyn Element, _>(Beam2d::CLASS_TAG, || {
        Box::new(Beam2d::default()) as Box<dyn Element>
    })?;
    marshaller.register::<dyn Element, _>(Quad4::CLASS_TAG, || {
        Box::new(Quad4::default()) as Box<dyn Element>
    })?;
    Ok(())
}

fn encode_parts(
    parts: &Parts,
    table: &mut TagSlotTable,
    comm: &mut Communicator<'_>,
    ids: &[i32],
    props: &[f64],
) -> Result<(), Error> {
    let table = table.ensure(parts.schema);
    comm.write_header(table)?;
    let mut acc = Accumulator::default();
    acc.field("ids", comm.send_array(table, parts.ids, ids));
    acc.field("props", comm.send_array(table, parts.props, props));
    acc.finish()
}

/// Receives both parts. Each part is applied only if it arrived whole.
fn decode_parts<const I: usize, const P: usize>(
    parts: &Parts,
    table: &mut TagSlotTable,
    comm: &mut Communicator<'_>,
    apply_ids: impl FnOnce([i32; I]),
    apply_props: impl FnOnce([f64; P]),
) -> Result<(), Error> {
    let table = table.ensure(parts.schema);
    comm.read_header(table)?;
    let mut acc = Accumulator::default();
    let mut ids = [0i32; I];
    acc.field(
        "ids",
        comm.receive_array(table, parts.ids, &mut ids).map(|()| apply_ids(ids)),
    );
    let mut props = [0f64; P];
    acc.field(
        "props",
        comm.receive_array(table, parts.props, &mut props).map(|()| apply_props(props)),
    );
    acc.finish()
}

/// Two-node axial bar.
#[derive(Clone, Debug, Default)]
pub struct Truss {
    table: TagSlotTable,
    tag: Tag,
    nodes: [Tag; 2],
    area: f64,
    material: Tag,
}

impl Truss {
    pub const CLASS_TAG: ClassTag = 1;

    pub fn new(tag: Tag, nodes: [Tag; 2], area: f64, material: Tag) -> Truss {
        Truss {
            table: TagSlotTable::default(),
            tag,
            nodes,
            area,
            material,
        }
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn material(&self) -> Tag {
        self.material
    }
}

impl PartialEq for Truss {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.nodes == other.nodes
            && self.area == other.area
            && self.material == other.material
    }
}

impl Marshal for Truss {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(TRUSS.schema)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let ids = [self.tag, self.nodes[0], self.nodes[1], self.material];
        encode_parts(&TRUSS, &mut self.table, comm, &ids, &[self.area])
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        decode_parts(
            &TRUSS,
            &mut self.table,
            comm,
            |[tag, i, j, material]: [i32; 4]| {
                self.tag = tag;
                self.nodes = [i, j];
                self.material = material;
            },
            |[area]: [f64; 1]| self.area = area,
        )
    }
}

impl Polymorphic for Truss {
    fn class_tag(&self) -> ClassTag {
        Self::CLASS_TAG
    }
}

impl Element for Truss {
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
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

/// Two-node Euler-Bernoulli beam in the plane.
#[derive(Clone, Debug, Default)]
pub struct Beam2d {
    table: TagSlotTable,
    tag: Tag,
    nodes: [Tag; 2],
    area: f64,
    modulus: f64,
    inertia: f64,
}

impl Beam2d {
    pub const CLASS_TAG: ClassTag = 2;

    pub fn new(tag: Tag, nodes: [Tag; 2], area: f64, modulus: f64, inertia: f64) -> Beam2d {
        Beam2d {
            table: TagSlotTable::default(),
            tag,
            nodes,
            area,
            modulus,
            inertia,
        }
    }

    /// `(A, E, I)`
    pub fn section(&self) -> (f64, f64, f64) {
        (self.area, self.modulus, self.inertia)
    }
}

impl PartialEq for Beam2d {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.nodes == other.nodes && self.section() == other.section()
    }
}

impl Marshal for Beam2d {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(BEAM2D.schema)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let ids = [self.tag, self.nodes[0], self.nodes[1]];
        let props = [self.area, self.modulus, self.inertia];
        encode_parts(&BEAM2D, &mut self.table, comm, &ids, &props)
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        decode_parts(
            &BEAM2D,
            &mut self.table,
            comm,
            |[tag, i, j]: [i32; 3]| {
                self.tag = tag;
                self.nodes = [i, j];
            },
            |[a, e, i]: [f64; 3]| {
                self.area = a;
                self.modulus = e;
                self.inertia = i;
            },
        )
    }
}

impl Polymorphic for Beam2d {
    fn class_tag(&self) -> ClassTag {
        Self::CLASS_TAG
    }
}

impl Element for Beam2d {
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
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}

/// Four-node plane quadrilateral.
#[derive(Clone, Debug, Default)]
pub struct Quad4 {
    table: TagSlotTable,
    tag: Tag,
    nodes: [Tag; 4],
    thickness: f64,
    material: Tag,
}

impl Quad4 {
    pub const CLASS_TAG: ClassTag = 3;

    pub fn new(tag: Tag, nodes: [Tag; 4], thickness: f64, material: Tag) -> Quad4 {
        Quad4 {
            table: TagSlotTable::default(),
            tag,
            nodes,
            thickness,
            material,
        }
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }
}

impl PartialEq for Quad4 {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.nodes == other.nodes
            && self.thickness == other.thickness
            && self.material == other.material
    }
}

impl Marshal for Quad4 {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(QUAD4.schema)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let [a, b, c, d] = self.nodes;
        let ids = [self.tag, a, b, c, d, self.material];
        encode_parts(&QUAD4, &mut self.table, comm, &ids, &[self.thickness])
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        decode_parts(
            &QUAD4,
            &mut self.table,
            comm,
            |[tag, a, b, c, d, material]: [i32; 6]| {
                self.tag = tag;
                self.nodes = [a, b, c, d];
                self.material = material;
            },
            |[thickness]: [f64; 1]| self.thickness = thickness,
        )
    }
}

impl Polymorphic for Quad4 {
    fn class_tag(&self) -> ClassTag {
        Self::CLASS_TAG
    }
}

impl Element for Quad4 {
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
        other.as_any().downcast_ref::<Self>() == Some(self)
    }
}
