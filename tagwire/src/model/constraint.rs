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

use tagwire_core::error::{Accumulator, Error};
use tagwire_core::slot::{FieldLocator, Slot, SlotSchema, TagSlotTable};
use tagwire_core::types::{ClassTag, Tag};
use tagwire_core::{Communicator, Marshal, Polymorphic};

const FAMILY: &str = "Constraint";

const SP_SCHEMA: SlotSchema = SlotSchema::new("SingleFreedom", &[Slot::Record, Slot::Record]);
/// `[tag, node, dof]`
const SP_IDS: FieldLocator = SP_SCHEMA.field(0, 1);
const SP_VALUE: FieldLocator = SP_SCHEMA.field(1, 1);

const MP_SCHEMA: SlotSchema = SlotSchema::new(
    "MultiFreedom",
    &[
        Slot::Record,
        Slot::Value,
        Slot::Record,
        Slot::Value,
        Slot::Record,
        Slot::Value,
        Slot::Record,
    ],
);
/// `[tag, retained node, constrained node]`
const MP_IDS: FieldLocator = MP_SCHEMA.field(0, 1);
const MP_RETAINED: FieldLocator = MP_SCHEMA.field(1, 2);
const MP_CONSTRAINED: FieldLocator = MP_SCHEMA.field(3, 2);
const MP_MATRIX: FieldLocator = MP_SCHEMA.field(5, 2);

/// Boundary conditions. The family is closed, so decoding dispatches on the
/// class tag with a `match` instead of going through the type broker.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    SingleFreedom(SingleFreedom),
    MultiFreedom(MultiFreedom),
}

impl Constraint {
    /// Empty constraint of the variant named by `class_tag`, ready to decode.
    pub fn for_class_tag(class_tag: ClassTag) -> Result<Constraint, Error> {
        match class_tag {
            SingleFreedom::CLASS_TAG => Ok(Constraint::SingleFreedom(SingleFreedom::default())),
            MultiFreedom::CLASS_TAG => Ok(Constraint::MultiFreedom(MultiFreedom::default())),
            other => Err(Error::unknown_class_tag(FAMILY, other)),
        }
    }

    pub fn tag(&self) -> Tag {
        match self {
            Constraint::SingleFreedom(sp) => sp.tag,
            Constraint::MultiFreedom(mp) => mp.tag,
        }
    }

    /// Nodes the constraint acts on.
    pub fn node_tags(&self) -> Vec<Tag> {
        match self {
            Constraint::SingleFreedom(sp) => vec![sp.node],
            Constraint::MultiFreedom(mp) => vec![mp.retained, mp.constrained],
        }
    }
}

impl From<SingleFreedom> for Constraint {
    fn from(sp: SingleFreedom) -> Self {
        Constraint::SingleFreedom(sp)
    }
}

impl From<MultiFreedom> for Constraint {
    fn from(mp: MultiFreedom) -> Self {
        Constraint::MultiFreedom(mp)
    }
}

impl Marshal for Constraint {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        match self {
            Constraint::SingleFreedom(sp) => sp.slot_table(),
            Constraint::MultiFreedom(mp) => mp.slot_table(),
        }
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        match self {
            Constraint::SingleFreedom(sp) => sp.encode(comm),
            Constraint::MultiFreedom(mp) => mp.encode(comm),
        }
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        match self {
            Constraint::SingleFreedom(sp) => sp.decode(comm),
            Constraint::MultiFreedom(mp) => mp.decode(comm),
        }
    }
}

impl Polymorphic for Constraint {
    fn class_tag(&self) -> ClassTag {
        match self {
            Constraint::SingleFreedom(_) => SingleFreedom::CLASS_TAG,
            Constraint::MultiFreedom(_) => MultiFreedom::CLASS_TAG,
        }
    }
}

/// Prescribes one degree of freedom of one node.
#[derive(Clone, Debug, Default)]
pub struct SingleFreedom {
    table: TagSlotTable,
    tag: Tag,
    node: Tag,
    dof: i32,
    value: f64,
}

impl SingleFreedom {
    pub const CLASS_TAG: ClassTag = 11;

    pub fn new(tag: Tag, node: Tag, dof: i32, value: f64) -> SingleFreedom {
        SingleFreedom {
            table: TagSlotTable::default(),
            tag,
            node,
            dof,
            value,
        }
    }

    pub fn node(&self) -> Tag {
        self.node
    }

    pub fn dof(&self) -> i32 {
        self.dof
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl PartialEq for SingleFreedom {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.node == other.node
            && self.dof == other.dof
            && self.value == other.value
    }
}

impl Marshal for SingleFreedom {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&SP_SCHEMA)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.write_header(self.table.ensure(&SP_SCHEMA))?;
        let mut acc = Accumulator::default();
        acc.field(
            "ids",
            comm.send_array(&self.table, SP_IDS, &[self.tag, self.node, self.dof]),
        );
        acc.field("value", comm.send_scalar(&self.table, SP_VALUE, self.value));
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&SP_SCHEMA))?;
        let mut acc = Accumulator::default();
        let mut ids = [0i32; 3];
        acc.field(
            "ids",
            comm.receive_array(&self.table, SP_IDS, &mut ids).map(|()| {
                let [tag, node, dof] = ids;
                self.tag = tag;
                self.node = node;
                self.dof = dof;
            }),
        );
        acc.field(
            "value",
            comm.receive_scalar(&self.table, SP_VALUE).map(|v| self.value = v),
        );
        acc.finish()
    }
}

/// Ties the constrained node's dofs to the retained node's dofs through a
/// `constrained x retained` coefficient matrix stored row by row.
#[derive(Clone, Debug, Default)]
pub struct MultiFreedom {
    table: TagSlotTable,
    tag: Tag,
    retained: Tag,
    constrained: Tag,
    retained_dofs: Vec<i32>,
    constrained_dofs: Vec<i32>,
    matrix: Vec<f64>,
}

fn check_matrix(tag: Tag, rows: usize, cols: usize, matrix: &[f64]) -> Result<(), Error> {
    if matrix.len() != rows * cols {
        return Err(Error::invalid_data(format!(
            "multi-freedom constraint {} needs a {}x{} matrix, got {} coefficients",
            tag,
            rows,
            cols,
            matrix.len()
        )));
    }
    Ok(())
}

impl MultiFreedom {
    pub const CLASS_TAG: ClassTag = 12;

    pub fn new(
        tag: Tag,
        retained: Tag,
        constrained: Tag,
        retained_dofs: Vec<i32>,
        constrained_dofs: Vec<i32>,
        matrix: Vec<f64>,
    ) -> Result<MultiFreedom, Error> {
        check_matrix(tag, constrained_dofs.len(), retained_dofs.len(), &matrix)?;
        Ok(MultiFreedom {
            table: TagSlotTable::default(),
            tag,
            retained,
            constrained,
            retained_dofs,
            constrained_dofs,
            matrix,
        })
    }

    pub fn retained(&self) -> Tag {
        self.retained
    }

    pub fn constrained(&self) -> Tag {
        self.constrained
    }

    pub fn matrix(&self) -> &[f64] {
        &self.matrix
    }
}

impl PartialEq for MultiFreedom {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.retained == other.retained
            && self.constrained == other.constrained
            && self.retained_dofs == other.retained_dofs
            && self.constrained_dofs == other.constrained_dofs
            && self.matrix == other.matrix
    }
}

impl Marshal for MultiFreedom {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&MP_SCHEMA)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let table = self.table.ensure(&MP_SCHEMA);
        table.stage_len(MP_RETAINED, self.retained_dofs.len());
        table.stage_len(MP_CONSTRAINED, self.constrained_dofs.len());
        table.stage_len(MP_MATRIX, self.matrix.len());
        comm.write_header(table)?;

        let mut acc = Accumulator::default();
        let ids = [self.tag, self.retained, self.constrained];
        acc.field("ids", comm.send_array(&self.table, MP_IDS, &ids));
        acc.field(
            "retained_dofs",
            comm.send_list(&self.table, MP_RETAINED, &self.retained_dofs),
        );
        acc.field(
            "constrained_dofs",
            comm.send_list(&self.table, MP_CONSTRAINED, &self.constrained_dofs),
        );
        acc.field("matrix", comm.send_list(&self.table, MP_MATRIX, &self.matrix));
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&MP_SCHEMA))?;

        let mut acc = Accumulator::default();
        let mut ids = [0i32; 3];
        acc.field(
            "ids",
            comm.receive_array(&self.table, MP_IDS, &mut ids).map(|()| {
                let [tag, retained, constrained] = ids;
                self.tag = tag;
                self.retained = retained;
                self.constrained = constrained;
            }),
        );
        acc.field(
            "retained_dofs",
            comm.receive_list(&self.table, MP_RETAINED).map(|v| self.retained_dofs = v),
        );
        acc.field(
            "constrained_dofs",
            comm.receive_list(&self.table, MP_CONSTRAINED).map(|v| self.constrained_dofs = v),
        );
        let rows = self.constrained_dofs.len();
        let cols = self.retained_dofs.len();
        let matrix = comm
            .receive_list::<f64>(&self.table, MP_MATRIX)
            .and_then(|m| check_matrix(self.tag, rows, cols, &m).map(|()| m));
        acc.field("matrix", matrix.map(|m| self.matrix = m));
        acc.finish()
    }
}
