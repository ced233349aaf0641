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

//! Change tracking for versioned aggregates.
//!
//! An aggregate owns one [`VersionLedger`]. Membership changes call
//! [`VersionLedger::mark_changed`]; the next [`VersionLedger::refresh`] turns
//! that into a new [`CommitVersion`]. Per channel the ledger remembers the
//! version last sent in full and the peer version last received in full, so
//! an unchanged topology is sent once per channel and only flagged afterwards.
//!
//! One ledger covers the whole aggregate. Sub-collections do not carry their
//! own versions.
//!
//! Channels are tracked independently: a full send to a checkpoint store in
//! between two peer exchanges leaves the peer's state untouched.

use std::collections::HashMap;

use crate::channel::ChannelId;
use crate::error::Error;
use crate::types::{CommitVersion, TopologyFlag};

#[derive(Clone, Debug, Default)]
pub struct VersionLedger {
    version: CommitVersion,
    dirty: bool,
    sent: HashMap<ChannelId, CommitVersion>,
    received: HashMap<ChannelId, CommitVersion>,
}

impl VersionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes a membership change. The version moves on the next refresh.
    pub fn mark_changed(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Version as of the last refresh.
    pub fn current(&self) -> CommitVersion {
        self.version
    }

    /// Folds pending changes into a new version. Returns whether it moved.
    pub fn refresh(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.version += 1;
        true
    }

    /// What to send on `channel` for the current version.
    ///
    /// `force_full` covers channels that keep every commit on its own and
    /// configurations that always resend.
    pub fn plan(&self, channel: ChannelId, force_full: bool) -> TopologyFlag {
        if force_full || self.sent.get(&channel) != Some(&self.version) {
            TopologyFlag::Full
        } else {
            TopologyFlag::Unchanged
        }
    }

    /// Marks the current version as fully sent on `channel`.
    pub fn record_sent(&mut self, channel: ChannelId) {
        self.sent.insert(channel, self.version);
    }

    pub fn last_sent(&self, channel: ChannelId) -> Option<CommitVersion> {
        self.sent.get(&channel).copied()
    }

    /// Marks peer version `version` as fully received on `channel`.
    pub fn record_received(&mut self, channel: ChannelId, version: CommitVersion) {
        self.received.insert(channel, version);
    }

    pub fn last_received(&self, channel: ChannelId) -> Option<CommitVersion> {
        self.received.get(&channel).copied()
    }

    /// An unchanged flag is only meaningful if this side holds the version
    /// the peer refers to.
    pub fn check_unchanged(&self, channel: ChannelId, version: CommitVersion) -> Result<(), Error> {
        match self.received.get(&channel) {
            Some(&held) if held == version => Ok(()),
            held => Err(Error::invalid_data(format!(
                "peer reports unchanged topology at version {} but this side holds {:?}",
                version, held
            ))),
        }
    }

    /// Drops everything remembered about `channel`.
    pub fn forget(&mut self, channel: ChannelId) {
        self.sent.remove(&channel);
        self.received.remove(&channel);
    }

    /// Drops the receipts of every channel but `channel`. Called when a full
    /// receive replaced the membership those receipts describe.
    pub fn forget_received_except(&mut self, channel: ChannelId) {
        self.received.retain(|c, _| *c == channel);
    }
}
