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

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use super::{Channel, ChannelId, WireTagAllocator};
use crate::buffer::{Reader, Writer};
use crate::error::Error;
use crate::types::{CommitTag, RecordKind, WireTag};

/// One record as it travels on a byte stream:
/// `[kind u8][wire_tag varint][commit varint][len varuint][payload]`.
#[derive(Debug)]
struct Frame {
    kind: RecordKind,
    wire_tag: WireTag,
    commit: CommitTag,
    len: usize,
    payload: Vec<u8>,
}

const MAX_PENDING_FRAMES: usize = 1 << 16;

/// Default cap on the element count of one incoming record.
pub const DEFAULT_MAX_RECORD_LEN: usize = 1 << 24;

fn width(kind: RecordKind) -> usize {
    match kind {
        RecordKind::Ints => 4,
        RecordKind::Doubles => 8,
        RecordKind::Bytes => 1,
    }
}

fn io_error(err: io::Error) -> Error {
    Error::transport(err.to_string())
}

/// Sequential transport over any `Read + Write` stream.
///
/// Records are expected in the order they were sent. A request that finds
/// other records first keeps them in a look-ahead queue and reads on until
/// its own record shows up; when the stream runs dry first, the request fails
/// with [`Error::FrameMismatch`] and the queued records stay available to the
/// requests they belong to. A record lost on the sending side therefore fails
/// exactly the field that needed it.
///
/// On a blocking stream a lost record blocks its request until the peer
/// closes the stream.
///
/// An incoming record longer than [`StreamChannel::max_record_len`] elements
/// is rejected before its payload is allocated.
pub struct StreamChannel<S> {
    id: ChannelId,
    allocator: WireTagAllocator,
    stream: S,
    writer: Writer,
    pending: VecDeque<Frame>,
    max_record_len: usize,
}

impl<S: Read + Write> StreamChannel<S> {
    pub fn new(stream: S) -> StreamChannel<S> {
        Self::with_session(stream, ChannelId::next(), WireTagAllocator::default())
    }

    /// Endpoint sharing identity and wire tag allocation with another
    /// endpoint of the same session.
    pub fn with_session(
        stream: S,
        id: ChannelId,
        allocator: WireTagAllocator,
    ) -> StreamChannel<S> {
        StreamChannel {
            id,
            allocator,
            stream,
            writer: Writer::with_capacity(256),
            pending: VecDeque::new(),
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }

    /// Sets the longest record, in elements, this endpoint accepts.
    ///
    /// # Default
    ///
    /// [`DEFAULT_MAX_RECORD_LEN`].
    pub fn max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn send_frame(
        &mut self,
        kind: RecordKind,
        wire_tag: WireTag,
        commit: CommitTag,
        len: usize,
        fill: impl FnOnce(&mut Writer),
    ) -> Result<(), Error> {
        self.writer.reset();
        self.writer.write_u8(kind.into());
        self.writer.write_varint32(wire_tag);
        self.writer.write_varint32(commit);
        self.writer.write_varuint32(len as u32);
        fill(&mut self.writer);
        tracing::trace!(
            target: "tagwire::channel",
            channel = self.id.get(),
            wire_tag,
            commit,
            len,
            ?kind,
            "send"
        );
        self.stream.write_all(self.writer.as_slice()).map_err(io_error)?;
        self.stream.flush().map_err(io_error)
    }

    fn read_varint_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::with_capacity(5);
        loop {
            let mut b = [0u8; 1];
            self.stream.read_exact(&mut b).map_err(io_error)?;
            bytes.push(b[0]);
            if b[0] < 0x80 {
                return Ok(bytes);
            }
            if bytes.len() == 5 {
                return Err(Error::invalid_data("frame header varint longer than 5 bytes"));
            }
        }
    }

    fn read_frame(&mut self) -> Result<Frame, Error> {
        let mut kind = [0u8; 1];
        self.stream.read_exact(&mut kind).map_err(io_error)?;
        let kind = RecordKind::try_from(kind[0])
            .map_err(|_| Error::invalid_data(format!("unknown record kind {}", kind[0])))?;
        let wire_tag = Reader::new(&self.read_varint_bytes()?).read_varint32()?;
        let commit = Reader::new(&self.read_varint_bytes()?).read_varint32()?;
        let len = Reader::new(&self.read_varint_bytes()?).read_varuint32()? as usize;
        if len > self.max_record_len {
            return Err(Error::invalid_data(format!(
                "record {} at commit {} announces {} elements, more than the maximum {}",
                wire_tag, commit, len, self.max_record_len
            )));
        }
        let mut payload = vec![0u8; len * width(kind)];
        self.stream.read_exact(&mut payload).map_err(io_error)?;
        Ok(Frame {
            kind,
            wire_tag,
            commit,
            len,
            payload,
        })
    }

    /// Records held back by earlier requests.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Takes the frame for `(wire_tag, commit)` from the look-ahead queue or
    /// the stream. A frame with the right address but the wrong shape is
    /// consumed and reported.
    fn next_frame(
        &mut self,
        kind: RecordKind,
        wire_tag: WireTag,
        commit: CommitTag,
        len: usize,
    ) -> Result<Frame, Error> {
        let queued = self
            .pending
            .iter()
            .position(|f| f.wire_tag == wire_tag && f.commit == commit);
        let frame = match queued.and_then(|index| self.pending.remove(index)) {
            Some(frame) => frame,
            None => self.read_until(wire_tag, commit, len)?,
        };
        if frame.kind != kind {
            return Err(Error::transport(format!(
                "record {} at commit {} carries {:?}, expected {:?}",
                wire_tag, commit, frame.kind, kind
            )));
        }
        if frame.len != len {
            return Err(Error::frame_mismatch(wire_tag, len, frame.wire_tag, frame.len));
        }
        Ok(frame)
    }

    fn read_until(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        len: usize,
    ) -> Result<Frame, Error> {
        loop {
            let frame = match self.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    return match self.pending.iter().find(|f| f.wire_tag != wire_tag) {
                        None => Err(err),
                        Some(first) => Err(Error::frame_mismatch(
                            wire_tag,
                            len,
                            first.wire_tag,
                            first.len,
                        )),
                    };
                }
            };
            tracing::trace!(
                target: "tagwire::channel",
                channel = self.id.get(),
                wire_tag = frame.wire_tag,
                commit = frame.commit,
                len = frame.len,
                "receive"
            );
            if frame.wire_tag == wire_tag && frame.commit == commit {
                return Ok(frame);
            }
            if self.pending.len() >= MAX_PENDING_FRAMES {
                return Err(Error::transport(format!(
                    "more than {} records queued ahead of record {}",
                    MAX_PENDING_FRAMES, wire_tag
                )));
            }
            self.pending.push_back(frame);
        }
    }
}

impl<S: Read + Write> Channel for StreamChannel<S> {
    fn identity(&self) -> ChannelId {
        self.id
    }

    fn allocate_wire_tag(&mut self) -> WireTag {
        self.allocator.allocate()
    }

    fn send_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[i32],
    ) -> Result<(), Error> {
        self.send_frame(RecordKind::Ints, wire_tag, commit, data.len(), |w| {
            w.write_i32_slice(data)
        })
    }

    fn send_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[f64],
    ) -> Result<(), Error> {
        self.send_frame(RecordKind::Doubles, wire_tag, commit, data.len(), |w| {
            w.write_f64_slice(data)
        })
    }

    fn send_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[u8],
    ) -> Result<(), Error> {
        self.send_frame(RecordKind::Bytes, wire_tag, commit, data.len(), |w| {
            w.write_bytes(data);
        })
    }

    fn receive_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [i32],
    ) -> Result<(), Error> {
        let frame = self.next_frame(RecordKind::Ints, wire_tag, commit, out.len())?;
        Reader::new(&frame.payload).read_i32_into(out)
    }

    fn receive_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [f64],
    ) -> Result<(), Error> {
        let frame = self.next_frame(RecordKind::Doubles, wire_tag, commit, out.len())?;
        Reader::new(&frame.payload).read_f64_into(out)
    }

    fn receive_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [u8],
    ) -> Result<(), Error> {
        let frame = self.next_frame(RecordKind::Bytes, wire_tag, commit, out.len())?;
        out.copy_from_slice(&frame.payload);
        Ok(())
    }
}

/// One direction of an in-memory byte pipe.
#[derive(Clone, Default, Debug)]
struct Pipe {
    bytes: Arc<Mutex<VecDeque<u8>>>,
}

/// In-process stream end: reads from one pipe, writes to the other.
///
/// Reading an empty pipe reports end of stream instead of blocking, which
/// suits single-threaded loopback sessions.
#[derive(Debug)]
pub struct PipeEnd {
    rx: Pipe,
    tx: Pipe,
}

impl PipeEnd {
    /// Bytes written by the other end and not read yet.
    pub fn unread(&self) -> usize {
        self.rx.bytes.lock().map(|b| b.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> io::Error {
    io::Error::new(io::ErrorKind::Other, "pipe lock poisoned")
}

impl Read for PipeEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut bytes = self.rx.bytes.lock().map_err(poisoned)?;
        let n = buf.len().min(bytes.len());
        for (dst, src) in buf.iter_mut().zip(bytes.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for PipeEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.bytes.lock().map_err(poisoned)?.extend(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Two connected endpoints of one in-process session. What one sends, the
/// other receives. Both share identity and wire tag allocation.
pub fn loopback() -> (StreamChannel<PipeEnd>, StreamChannel<PipeEnd>) {
    let a_to_b = Pipe::default();
    let b_to_a = Pipe::default();
    let id = ChannelId::next();
    let allocator = WireTagAllocator::default();
    let a = StreamChannel::with_session(
        PipeEnd {
            rx: b_to_a.clone(),
            tx: a_to_b.clone(),
        },
        id,
        allocator.clone(),
    );
    let b = StreamChannel::with_session(PipeEnd { rx: a_to_b, tx: b_to_a }, id, allocator);
    (a, b)
}
