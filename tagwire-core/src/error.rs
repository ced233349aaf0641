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

//! Error values for tagwire sessions.
//!
//! Every failure the protocol can observe is an [`enum@Error`] value. Errors are
//! never raised as panics from the channel or communicator layers; the only
//! panics in this crate are programmer errors such as indexing a slot table
//! outside its declared schema.
//!
//! ## Always use the constructor functions
//!
//! Construct errors through the static functions ([`Error::schema_mismatch`],
//! [`Error::transport`], ...) rather than the enum variants. The constructors
//! accept anything convertible into `Cow<'static, str>` and honor the
//! `TAGWIRE_PANIC_ON_ERROR` debugging switch.
//!
//! ## Debug mode: TAGWIRE_PANIC_ON_ERROR
//!
//! Set `TAGWIRE_PANIC_ON_ERROR=1` at compile time to make every constructor
//! panic at the creation site, which gives a full backtrace to the field that
//! failed:
//!
//! ```bash
//! RUST_BACKTRACE=1 TAGWIRE_PANIC_ON_ERROR=1 cargo test
//! ```

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use crate::types::{ClassTag, Tag, WireTag};

/// Set `TAGWIRE_PANIC_ON_ERROR` at compile time to panic where errors are created.
pub const PANIC_ON_ERROR: bool = option_env!("TAGWIRE_PANIC_ON_ERROR").is_some();

/// Error type for encode and decode sessions.
///
/// Errors fall in two classes, see [`Error::is_fatal`]:
///
/// - fatal errors ([`Error::SchemaMismatch`], [`Error::SessionAborted`]) mean
///   the two ends disagree about the shape of the data and the session must
///   not continue;
/// - everything else is recoverable: the failing field is skipped and the
///   remaining fields of the aggregate are still attempted.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Slot table sizes disagree between sender and receiver.
    ///
    /// Do not construct this variant directly; use [`Error::schema_mismatch`] instead.
    #[error("schema mismatch for {type_name}: {expected} local slots, peer sent {actual}")]
    SchemaMismatch {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A previous fatal error aborted this session.
    ///
    /// Do not construct this variant directly; use [`Error::session_aborted`] instead.
    #[error("session aborted after a fatal error")]
    SessionAborted,

    /// An entity with this tag is already present in its container.
    ///
    /// Do not construct this variant directly; use [`Error::duplicate_tag`] instead.
    #[error("duplicate {kind} tag {tag}")]
    DuplicateTag { kind: &'static str, tag: Tag },

    /// A tag reference points to an entity that does not exist.
    ///
    /// Do not construct this variant directly; use [`Error::missing_reference`] instead.
    #[error("{kind} {tag} does not exist")]
    MissingReference { kind: &'static str, tag: Tag },

    /// The transport failed to move a record.
    ///
    /// Do not construct this variant directly; use [`Error::transport`] instead.
    #[error("transport failure: {0}")]
    Transport(Cow<'static, str>),

    /// The next record on the transport is not the one that was asked for.
    ///
    /// Do not construct this variant directly; use [`Error::frame_mismatch`] instead.
    #[error("expected record {expected_tag}/{expected_len}, found {found_tag}/{found_len}")]
    FrameMismatch {
        expected_tag: WireTag,
        expected_len: usize,
        found_tag: WireTag,
        found_len: usize,
    },

    /// The stream names a concrete subtype nobody registered.
    ///
    /// Do not construct this variant directly; use [`Error::unknown_class_tag`] instead.
    #[error("class tag {class_tag} is not registered for {family}")]
    UnknownClassTag {
        family: &'static str,
        class_tag: ClassTag,
    },

    /// Reading past the end of a buffer.
    ///
    /// Do not construct this variant directly; use [`Error::buffer_out_of_bound`] instead.
    #[error("buffer out of bound: {0} + {1} > {2}")]
    BufferOutOfBound(usize, usize, usize),

    /// Nested entities exceed the configured depth.
    ///
    /// Do not construct this variant directly; use [`Error::depth_exceed`] instead.
    #[error("{0}")]
    DepthExceed(Cow<'static, str>),

    /// Invalid or inconsistent data.
    ///
    /// Do not construct this variant directly; use [`Error::invalid_data`] instead.
    #[error("{0}")]
    InvalidData(Cow<'static, str>),

    /// Operation not allowed in the current state.
    ///
    /// Do not construct this variant directly; use [`Error::not_allowed`] instead.
    #[error("{0}")]
    NotAllowed(Cow<'static, str>),

    /// One or more fields of an entity failed; every field was still attempted.
    ///
    /// Do not construct this variant directly; use [`Error::incomplete`] instead.
    #[error("{0}")]
    Incomplete(Report),

    /// Generic error.
    ///
    /// Do not construct this variant directly; use [`Error::unknown`] instead.
    #[error("{0}")]
    Unknown(Cow<'static, str>),
}

macro_rules! checked {
    ($err:expr) => {{
        let err = $err;
        if PANIC_ON_ERROR {
            panic!("TAGWIRE_PANIC_ON_ERROR: {}", err);
        }
        err
    }};
}

impl Error {
    /// Creates a new [`Error::SchemaMismatch`].
    ///
    /// ```
    /// use tagwire_core::error::Error;
    ///
    /// let err = Error::schema_mismatch("Node", 6, 7);
    /// assert!(err.is_fatal());
    /// ```
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn schema_mismatch(type_name: &'static str, expected: usize, actual: usize) -> Self {
        checked!(Error::SchemaMismatch {
            type_name,
            expected,
            actual,
        })
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn session_aborted() -> Self {
        checked!(Error::SessionAborted)
    }

    /// Creates a new [`Error::DuplicateTag`].
    ///
    /// ```
    /// use tagwire_core::error::Error;
    ///
    /// let err = Error::duplicate_tag("node", 3);
    /// assert_eq!(err.to_string(), "duplicate node tag 3");
    /// ```
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn duplicate_tag(kind: &'static str, tag: Tag) -> Self {
        checked!(Error::DuplicateTag { kind, tag })
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn missing_reference(kind: &'static str, tag: Tag) -> Self {
        checked!(Error::MissingReference { kind, tag })
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn transport<S: Into<Cow<'static, str>>>(s: S) -> Self {
        checked!(Error::Transport(s.into()))
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn frame_mismatch(
        expected_tag: WireTag,
        expected_len: usize,
        found_tag: WireTag,
        found_len: usize,
    ) -> Self {
        checked!(Error::FrameMismatch {
            expected_tag,
            expected_len,
            found_tag,
            found_len,
        })
    }

    /// Creates a new [`Error::UnknownClassTag`].
    ///
    /// ```
    /// use tagwire_core::error::Error;
    ///
    /// let err = Error::unknown_class_tag("dyn Element", 42);
    /// assert!(err.is_unknown_class_tag());
    /// ```
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn unknown_class_tag(family: &'static str, class_tag: ClassTag) -> Self {
        checked!(Error::UnknownClassTag { family, class_tag })
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn buffer_out_of_bound(offset: usize, length: usize, capacity: usize) -> Self {
        checked!(Error::BufferOutOfBound(offset, length, capacity))
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn depth_exceed<S: Into<Cow<'static, str>>>(s: S) -> Self {
        checked!(Error::DepthExceed(s.into()))
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn invalid_data<S: Into<Cow<'static, str>>>(s: S) -> Self {
        checked!(Error::InvalidData(s.into()))
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn not_allowed<S: Into<Cow<'static, str>>>(s: S) -> Self {
        checked!(Error::NotAllowed(s.into()))
    }

    /// Wraps accumulated field failures. Not subject to `TAGWIRE_PANIC_ON_ERROR`,
    /// the individual failures already were.
    #[inline(always)]
    #[cold]
    pub fn incomplete(report: Report) -> Self {
        Error::Incomplete(report)
    }

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn unknown<S: Into<Cow<'static, str>>>(s: S) -> Self {
        checked!(Error::Unknown(s.into()))
    }

    /// Whether the session has to stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::SchemaMismatch { .. } | Error::SessionAborted)
    }

    /// Whether this error, or any failure nested inside it, is an unknown class tag.
    pub fn is_unknown_class_tag(&self) -> bool {
        self.find(|e| matches!(e, Error::UnknownClassTag { .. }))
            .is_some()
    }

    /// Depth-first search through nested [`Error::Incomplete`] reports.
    pub fn find(&self, pred: impl Fn(&Error) -> bool + Copy) -> Option<&Error> {
        match self {
            Error::Incomplete(report) => report
                .failures()
                .iter()
                .find_map(|failure| failure.error.find(pred)),
            other if pred(other) => Some(other),
            _ => None,
        }
    }
}

/// One failed field, addressed by its path from the entity that reported it.
#[derive(Debug)]
pub struct FieldFailure {
    pub path: String,
    pub error: Error,
}

/// A cross-reference that could not be resolved on the receiving side and
/// was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedReference {
    /// Kind of the missing entity, e.g. `"node"`.
    pub kind: &'static str,
    pub tag: Tag,
    /// The entity holding the reference, e.g. `"load pattern 2/load 5"`.
    pub holder: String,
}

impl fmt::Display for SkippedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} refers to missing {} {}", self.holder, self.kind, self.tag)
    }
}

/// Recoverable findings of a session that did not fail it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub skipped: Vec<SkippedReference>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Structured result of an encode or decode that attempted every field.
///
/// Replaces the summed integer return code: the number of failures is
/// [`Report::len`], and each entry names the field that failed. A report
/// returned from a whole session also carries that session's
/// [`Diagnostics`].
#[derive(Debug, Default)]
pub struct Report {
    failures: Vec<FieldFailure>,
    diagnostics: Diagnostics,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[FieldFailure] {
        &self.failures
    }

    /// References skipped by the session alongside the failed fields.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn attach(&mut self, diagnostics: Diagnostics) {
        self.diagnostics.skipped.extend(diagnostics.skipped);
    }

    /// Paths of all failed fields, in the order they were attempted.
    pub fn paths(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.path.as_str()).collect()
    }

    /// Records a failure under `field`. Nested reports are flattened with a
    /// `field/` prefix so callers see leaf paths.
    pub fn push(&mut self, field: &str, error: Error) {
        match error {
            Error::Incomplete(nested) => {
                self.attach(nested.diagnostics);
                for failure in nested.failures {
                    self.failures.push(FieldFailure {
                        path: format!("{}/{}", field, failure.path),
                        error: failure.error,
                    });
                }
            }
            error => self.failures.push(FieldFailure {
                path: field.to_string(),
                error,
            }),
        }
    }

    fn take_fatal(&mut self) -> Option<Error> {
        let index = self.failures.iter().position(|f| f.error.is_fatal())?;
        Some(self.failures.swap_remove(index).error)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.path, failure.error)?;
        }
        if !self.diagnostics.is_empty() {
            write!(f, "; {} reference(s) skipped", self.diagnostics.skipped.len())?;
        }
        Ok(())
    }
}

/// Collects per-field results of one entity without short-circuiting.
///
/// ```
/// use tagwire_core::error::{Accumulator, Error};
///
/// let mut acc = Accumulator::default();
/// acc.field("mass", Ok(()));
/// acc.field("coords", Err(Error::transport("socket closed")));
/// acc.field("disp", Ok(()));
/// let err = acc.finish().unwrap_err();
/// assert!(matches!(err, Error::Incomplete(ref r) if r.paths() == ["coords"]));
/// ```
#[derive(Debug, Default)]
pub struct Accumulator {
    report: Report,
}

impl Accumulator {
    pub fn field(&mut self, name: &str, result: Result<(), Error>) {
        if let Err(error) = result {
            tracing::warn!(target: "tagwire::field", field = name, error = %error, "field failed");
            self.report.push(name, error);
        }
    }

    /// Like [`Accumulator::field`], handing the value back on success.
    pub fn value<T>(&mut self, name: &str, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.field(name, Err(error));
                None
            }
        }
    }

    pub fn failed(&self) -> bool {
        !self.report.is_empty()
    }

    /// `Ok` when every field succeeded. A fatal failure wins over the
    /// aggregate so callers can tell a broken session from a partial one.
    pub fn finish(mut self) -> Result<(), Error> {
        if self.report.is_empty() {
            return Ok(());
        }
        if let Some(fatal) = self.report.take_fatal() {
            return Err(fatal);
        }
        Err(Error::incomplete(self.report))
    }
}

/// Ensures a condition is true; otherwise returns an [`enum@Error`].
///
/// ```
/// use tagwire_core::ensure;
/// use tagwire_core::error::Error;
///
/// fn check_len(n: usize) -> Result<(), Error> {
///     ensure!(n > 0, "length must be positive");
///     ensure!(n < 10, "length {} too large", n);
///     Ok(())
/// }
/// assert!(check_len(3).is_ok());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:literal) => {
        if !$cond {
            return Err($crate::error::Error::unknown($msg));
        }
    };
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::unknown(format!($fmt, $($arg)*)));
        }
    };
}
