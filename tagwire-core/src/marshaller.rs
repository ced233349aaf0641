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

use crate::broker::TypeBroker;
use crate::channel::Channel;
use crate::communicator::Communicator;
use crate::config::Config;
use crate::error::{Diagnostics, Error};
use crate::marshal::Marshal;
use crate::types::{ClassTag, CommitTag};

/// Entry point for encoding and decoding entity graphs.
///
/// A `Marshaller` owns the session configuration and the [`TypeBroker`].
/// Register every polymorphic subtype at start-up, then open any number of
/// sessions with [`Marshaller::send`] and [`Marshaller::receive`]. Because
/// sessions borrow the marshaller, registration is impossible while one is
/// running.
///
/// # Examples
///
/// ```rust
/// use tagwire_core::Marshaller;
///
/// let marshaller = Marshaller::default()
///     .max_depth(8)
///     .resend_topology(false);
/// assert_eq!(marshaller.config().max_depth(), 8);
/// ```
#[derive(Default)]
pub struct Marshaller {
    config: Config,
    broker: TypeBroker,
}

impl Marshaller {
    /// Sets the maximum nesting depth of entities inside entities.
    ///
    /// # Default
    ///
    /// The default value is `16`. Exceeding it fails the offending field with
    /// [`Error::DepthExceed`].
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Makes versioned aggregates send full topology on every encode.
    ///
    /// # Default
    ///
    /// `false`: topology that a channel has already received is only flagged
    /// as unchanged.
    pub fn resend_topology(mut self, resend_topology: bool) -> Self {
        self.config.resend_topology = resend_topology;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn broker(&self) -> &TypeBroker {
        &self.broker
    }

    /// Registers the constructor for `class_tag` in the family `F`.
    ///
    /// # Examples
    ///
    /// ```rust, ignore
    /// marshaller.register::<dyn Element, _>(TRUSS, || {
    ///     Box::new(Truss::default()) as Box<dyn Element>
    /// })?;
    /// ```
    pub fn register<F, C>(&mut self, class_tag: ClassTag, factory: C) -> Result<(), Error>
    where
        F: ?Sized + 'static,
        C: Fn() -> Box<F> + Send + Sync + 'static,
    {
        self.broker.register::<F, C>(class_tag, factory)
    }

    /// Opens a session on `channel` for hand-written protocols.
    pub fn session<'s>(
        &'s self,
        channel: &'s mut dyn Channel,
        commit: CommitTag,
    ) -> Communicator<'s> {
        Communicator::new(channel, &self.broker, &self.config, commit)
    }

    /// Encodes `root` and everything it owns at `commit`.
    ///
    /// Every field is attempted even when earlier ones fail. On success the
    /// returned diagnostics list what the peer will have to skip, which is
    /// always empty on the sending side.
    pub fn send<M: Marshal + ?Sized>(
        &self,
        channel: &mut dyn Channel,
        commit: CommitTag,
        root: &mut M,
    ) -> Result<Diagnostics, Error> {
        let mut comm = self.session(channel, commit);
        let result = comm.send_root(root);
        Self::finish(comm, result, "send")
    }

    /// Decodes the graph stored at `commit` into `root`.
    ///
    /// References to entities this side does not hold are skipped and listed
    /// in the returned diagnostics. If some fields failed as well, the
    /// diagnostics travel inside the [`Error::Incomplete`] report instead.
    pub fn receive<M: Marshal + ?Sized>(
        &self,
        channel: &mut dyn Channel,
        commit: CommitTag,
        root: &mut M,
    ) -> Result<Diagnostics, Error> {
        let mut comm = self.session(channel, commit);
        let result = comm.receive_root(root);
        Self::finish(comm, result, "receive")
    }

    fn finish(
        mut comm: Communicator<'_>,
        result: Result<(), Error>,
        op: &'static str,
    ) -> Result<Diagnostics, Error> {
        match result {
            Ok(()) => {
                let diagnostics = comm.take_diagnostics();
                tracing::debug!(
                    target: "tagwire::session",
                    op,
                    commit = comm.commit(),
                    skipped = diagnostics.skipped.len(),
                    "session finished"
                );
                Ok(diagnostics)
            }
            Err(mut err) => {
                if let Error::Incomplete(report) = &mut err {
                    report.attach(comm.take_diagnostics());
                }
                tracing::warn!(
                    target: "tagwire::session",
                    op,
                    commit = comm.commit(),
                    error = %err,
                    "session finished with failures"
                );
                Err(err)
            }
        }
    }
}
