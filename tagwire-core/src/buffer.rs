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

//! Little-endian byte buffers used to frame records on byte-stream channels.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;

#[derive(Default, Debug)]
pub struct Writer {
    pub(crate) bf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Writer {
        Writer {
            bf: Vec::with_capacity(capacity),
        }
    }

    pub fn reset(&mut self) {
        // keep capacity and reset len to 0
        self.bf.clear();
    }

    pub fn dump(&self) -> Vec<u8> {
        self.bf.clone()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bf
    }

    pub fn len(&self) -> usize {
        self.bf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.bf.reserve(additional);
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> usize {
        self.bf.extend_from_slice(v);
        v.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bf.push(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut b = [0u8; 4];
        LittleEndian::write_i32(&mut b, value);
        self.bf.extend_from_slice(&b);
    }

    pub fn write_f64(&mut self, value: f64) {
        let mut b = [0u8; 8];
        LittleEndian::write_f64(&mut b, value);
        self.bf.extend_from_slice(&b);
    }

    pub fn write_i32_slice(&mut self, values: &[i32]) {
        self.reserve(values.len() * 4);
        for &v in values {
            self.write_i32(v);
        }
    }

    pub fn write_f64_slice(&mut self, values: &[f64]) {
        self.reserve(values.len() * 8);
        for &v in values {
            self.write_f64(v);
        }
    }

    pub fn write_varint32(&mut self, value: i32) {
        let zigzag = ((value as i64) << 1) ^ ((value as i64) >> 31);
        self.write_varuint32(zigzag as u32)
    }

    pub fn write_varuint32(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.write_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.write_u8(value as u8);
    }
}

/// Bounds-checked cursor over a borrowed byte slice.
pub struct Reader<'a> {
    bf: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bf: &'a [u8]) -> Reader<'a> {
        Reader { bf, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bf.len() - self.cursor
    }

    #[inline]
    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.cursor + len > self.bf.len() {
            return Err(Error::buffer_out_of_bound(self.cursor, len, self.bf.len()));
        }
        let s = &self.bf[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    pub fn read_i32_into(&mut self, out: &mut [i32]) -> Result<(), Error> {
        let bytes = self.take(out.len() * 4)?;
        LittleEndian::read_i32_into(bytes, out);
        Ok(())
    }

    pub fn read_f64_into(&mut self, out: &mut [f64]) -> Result<(), Error> {
        let bytes = self.take(out.len() * 8)?;
        LittleEndian::read_f64_into(bytes, out);
        Ok(())
    }

    pub fn read_varuint32(&mut self) -> Result<u32, Error> {
        let mut result = 0u32;
        for shift in (0..35).step_by(7) {
            let b = self.read_u8()? as u32;
            result |= (b & 0x7F) << shift;
            if b < 0x80 {
                return Ok(result);
            }
        }
        Err(Error::invalid_data("varuint32 longer than 5 bytes"))
    }

    pub fn read_varint32(&mut self) -> Result<i32, Error> {
        let encoded = self.read_varuint32()?;
        Ok(((encoded >> 1) as i32) ^ -((encoded & 1) as i32))
    }
}
