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

//! Class-tag registry for open polymorphic families.
//!
//! A family is named by its trait object type, e.g. `dyn Element`. Each
//! concrete subtype registers a factory under a stable [`ClassTag`]; decoding a
//! polymorphic field asks the broker for a default instance of the tag found
//! on the wire, then lets that instance decode itself.
//!
//! Families whose subtypes are all known when the crate is built should be
//! plain enums matched exhaustively instead; the broker is for families that
//! downstream code extends.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::error::Error;
use crate::types::ClassTag;

type Factory<F> = Box<dyn Fn() -> Box<F> + Send + Sync>;

struct Entry {
    subtype: &'static str,
    factory: Box<dyn Any + Send + Sync>,
}

/// Registry mapping `(family, class tag)` to a constructor.
///
/// Populated at start-up. Sessions borrow the broker immutably, so the
/// registry cannot change while any session is open.
///
/// ```
/// use tagwire_core::TypeBroker;
///
/// trait Shape {
///     fn corners(&self) -> usize;
/// }
/// #[derive(Default)]
/// struct Square;
/// impl Shape for Square {
///     fn corners(&self) -> usize {
///         4
///     }
/// }
///
/// let mut broker = TypeBroker::default();
/// broker
///     .register::<dyn Shape, _>(7, || Box::new(Square) as Box<dyn Shape>)
///     .unwrap();
/// assert_eq!(broker.construct::<dyn Shape>(7).unwrap().corners(), 4);
/// assert!(matches!(broker.construct::<dyn Shape>(8), Err(e) if e.is_unknown_class_tag()));
/// ```
#[derive(Default)]
pub struct TypeBroker {
    entries: HashMap<(TypeId, ClassTag), Entry>,
}

impl TypeBroker {
    pub fn new() -> TypeBroker {
        Self::default()
    }

    /// Registers `factory` for `class_tag` in family `F`.
    ///
    /// A class tag can be registered once per family.
    pub fn register<F, C>(&mut self, class_tag: ClassTag, factory: C) -> Result<(), Error>
    where
        F: ?Sized + 'static,
        C: Fn() -> Box<F> + Send + Sync + 'static,
    {
        let key = (TypeId::of::<F>(), class_tag);
        if let Some(existing) = self.entries.get(&key) {
            return Err(Error::not_allowed(format!(
                "class tag {} of {} is already registered to {}",
                class_tag,
                type_name::<F>(),
                existing.subtype
            )));
        }
        let factory: Factory<F> = Box::new(factory);
        tracing::debug!(
            target: "tagwire::broker",
            family = type_name::<F>(),
            class_tag,
            "register"
        );
        self.entries.insert(
            key,
            Entry {
                subtype: type_name::<C>(),
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    pub fn is_registered<F: ?Sized + 'static>(&self, class_tag: ClassTag) -> bool {
        self.entries.contains_key(&(TypeId::of::<F>(), class_tag))
    }

    /// Registered class tags of family `F`, sorted.
    pub fn class_tags<F: ?Sized + 'static>(&self) -> Vec<ClassTag> {
        let family = TypeId::of::<F>();
        let mut tags: Vec<ClassTag> = self
            .entries
            .keys()
            .filter(|(f, _)| *f == family)
            .map(|(_, tag)| *tag)
            .collect();
        tags.sort_unstable();
        tags
    }

    /// New default instance of the subtype registered as `class_tag`.
    ///
    /// An unregistered tag is [`Error::UnknownClassTag`]; nothing is
    /// substituted for it.
    pub fn construct<F: ?Sized + 'static>(&self, class_tag: ClassTag) -> Result<Box<F>, Error> {
        let entry = self
            .entries
            .get(&(TypeId::of::<F>(), class_tag))
            .ok_or_else(|| Error::unknown_class_tag(type_name::<F>(), class_tag))?;
        let factory = entry.factory.downcast_ref::<Factory<F>>().ok_or_else(|| {
            Error::unknown(format!(
                "factory for class tag {} has the wrong family",
                class_tag
            ))
        })?;
        Ok(factory())
    }
}
