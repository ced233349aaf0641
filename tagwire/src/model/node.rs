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
use tagwire_core::types::Tag;
use tagwire_core::{Communicator, Marshal};

const SCHEMA: SlotSchema = SlotSchema::new(
    "Node",
    &[Slot::Record, Slot::Value, Slot::Record, Slot::Value, Slot::Record],
);
/// `[tag, ndf]`
const IDS: FieldLocator = SCHEMA.field(0, 1);
const COORDS: FieldLocator = SCHEMA.field(1, 2);
const DISP: FieldLocator = SCHEMA.field(3, 2);

/// A point of the mesh carrying `ndf` degrees of freedom.
#[derive(Clone, Debug, Default)]
pub struct Node {
    table: TagSlotTable,
    tag: Tag,
    ndf: i32,
    coords: Vec<f64>,
    disp: Vec<f64>,
}

impl Node {
    pub fn new(tag: Tag, coords: impl Into<Vec<f64>>, ndf: usize) -> Node {
        Node {
            table: TagSlotTable::default(),
            tag,
            ndf: ndf as i32,
            coords: coords.into(),
            disp: vec![0.0; ndf],
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn ndf(&self) -> usize {
        self.ndf.max(0) as usize
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Committed displacement, one entry per degree of freedom.
    pub fn disp(&self) -> &[f64] {
        &self.disp
    }

    pub(crate) fn set_disp(&mut self, values: &[f64]) -> Result<(), Error> {
        if values.len() != self.ndf() {
            return Err(Error::invalid_data(format!(
                "node {} has {} dofs, got {} displacement values",
                self.tag,
                self.ndf,
                values.len()
            )));
        }
        self.disp.copy_from_slice(values);
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.ndf == other.ndf
            && self.coords == other.coords
            && self.disp == other.disp
    }
}

impl Marshal for Node {
    fn slot_table(&mut self) -> &mut TagSlotTable {
        self.table.ensure(&SCHEMA)
    }

    fn encode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        let table = self.table.ensure(&SCHEMA);
        table.stage_len(COORDS, self.coords.len());
        table.stage_len(DISP, self.disp.len());
        comm.write_header(table)?;

        let mut acc = Accumulator::default();
        acc.field("ids", comm.send_array(&self.table, IDS, &[self.tag, self.ndf]));
        acc.field("coords", comm.send_list(&self.table, COORDS, &self.coords));
        acc.field("disp", comm.send_list(&self.table, DISP, &self.disp));
        acc.finish()
    }

    fn decode(&mut self, comm: &mut Communicator<'_>) -> Result<(), Error> {
        comm.read_header(self.table.ensure(&SCHEMA))?;

        let mut acc = Accumulator::default();
        let mut ids = [0i32; 2];
        acc.field(
            "ids",
            comm.receive_array(&self.table, IDS, &mut ids).map(|()| {
                self.tag = ids[0];
                self.ndf = ids[1];
            }),
        );
        acc.field(
            "coords",
            comm.receive_list(&self.table, COORDS).map(|v| self.coords = v),
        );
        acc.field(
            "disp",
            comm.receive_list(&self.table, DISP).map(|v| self.disp = v),
        );
        acc.finish()
    }
}
