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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Channel, ChannelId, WireTagAllocator};
use crate::error::Error;
use crate::types::{CommitTag, RecordKind, WireTag};

#[derive(Clone, Debug)]
enum Record {
    Ints(Vec<i32>),
    Doubles(Vec<f64>),
    Bytes(Vec<u8>),
}

impl Record {
    fn len(&self) -> usize {
        match self {
            Record::Ints(v) => v.len(),
            Record::Doubles(v) => v.len(),
            Record::Bytes(v) => v.len(),
        }
    }
}

type Key = (RecordKind, WireTag, CommitTag);

#[derive(Default, Debug)]
struct Storage {
    records: HashMap<Key, Record>,
}

/// Keyed record store, the in-memory shape of a checkpoint database.
///
/// Records are addressed by `(kind, wire_tag, commit)` and kept until
/// overwritten, so several commits coexist and each can be restored on its
/// own. Cloning yields another handle to the same session; [`MemoryStore::reopen`]
/// yields a new session over the same storage, as reopening a database file
/// would.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    id: ChannelId,
    allocator: WireTagAllocator,
    storage: Arc<Mutex<Storage>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            id: ChannelId::next(),
            allocator: WireTagAllocator::default(),
            storage: Arc::default(),
        }
    }

    /// New session over the same records. Wire tags keep coming from the
    /// shared allocator so fresh records never overwrite stored ones.
    pub fn reopen(&self) -> MemoryStore {
        MemoryStore {
            id: ChannelId::next(),
            allocator: self.allocator.clone(),
            storage: self.storage.clone(),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.storage().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records stored under `commit`.
    pub fn records_at(&self, commit: CommitTag) -> usize {
        self.storage()
            .map(|s| s.records.keys().filter(|k| k.2 == commit).count())
            .unwrap_or(0)
    }

    fn storage(&self) -> Result<MutexGuard<'_, Storage>, Error> {
        self.storage
            .lock()
            .map_err(|_| Error::transport("memory store lock poisoned"))
    }

    fn put(&self, key: Key, record: Record) -> Result<(), Error> {
        tracing::trace!(
            target: "tagwire::channel",
            channel = self.id.get(),
            wire_tag = key.1,
            commit = key.2,
            len = record.len(),
            "store"
        );
        self.storage()?.records.insert(key, record);
        Ok(())
    }

    fn fetch<T>(
        &self,
        key: Key,
        out: &mut [T],
        pick: impl FnOnce(&Record) -> Option<&[T]>,
    ) -> Result<(), Error>
    where
        T: Copy,
    {
        let storage = self.storage()?;
        let record = storage.records.get(&key).ok_or_else(|| {
            Error::transport(format!(
                "no {:?} record {} at commit {}",
                key.0, key.1, key.2
            ))
        })?;
        if record.len() != out.len() {
            return Err(Error::frame_mismatch(key.1, out.len(), key.1, record.len()));
        }
        let data = pick(record)
            .ok_or_else(|| Error::transport(format!("record {} has another kind", key.1)))?;
        out.copy_from_slice(data);
        Ok(())
    }
}

impl Channel for MemoryStore {
    fn identity(&self) -> ChannelId {
        self.id
    }

    fn allocate_wire_tag(&mut self) -> WireTag {
        self.allocator.allocate()
    }

    fn retains_history(&self) -> bool {
        true
    }

    fn send_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[i32],
    ) -> Result<(), Error> {
        self.put((RecordKind::Ints, wire_tag, commit), Record::Ints(data.to_vec()))
    }

    fn send_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[f64],
    ) -> Result<(), Error> {
        self.put((RecordKind::Doubles, wire_tag, commit), Record::Doubles(data.to_vec()))
    }

    fn send_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        data: &[u8],
    ) -> Result<(), Error> {
        self.put((RecordKind::Bytes, wire_tag, commit), Record::Bytes(data.to_vec()))
    }

    fn receive_ints(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [i32],
    ) -> Result<(), Error> {
        self.fetch((RecordKind::Ints, wire_tag, commit), out, |r| match r {
            Record::Ints(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    fn receive_doubles(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [f64],
    ) -> Result<(), Error> {
        self.fetch((RecordKind::Doubles, wire_tag, commit), out, |r| match r {
            Record::Doubles(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    fn receive_bytes(
        &mut self,
        wire_tag: WireTag,
        commit: CommitTag,
        out: &mut [u8],
    ) -> Result<(), Error> {
        self.fetch((RecordKind::Bytes, wire_tag, commit), out, |r| match r {
            Record::Bytes(v) => Some(v.as_slice()),
            _ => None,
        })
    }
}
