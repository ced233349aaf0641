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

//! Finite-element entities that travel through tagwire.
//!
//! | type | role |
//! |------|------|
//! | [`Node`] | mesh point with coordinates and committed displacement |
//! | [`Element`] | open family resolved through the type broker: [`Truss`], [`Beam2d`], [`Quad4`] |
//! | [`Constraint`] | closed family: [`SingleFreedom`], [`MultiFreedom`] |
//! | [`LoadPattern`] | scaled set of [`NodalLoad`]s |
//! | [`Domain`] | the versioned container owning all of the above |

mod constraint;
mod domain;
mod element;
mod load;
mod node;

pub use constraint::{Constraint, MultiFreedom, SingleFreedom};
pub use domain::{Connectivity, Domain};
pub use element::{register_elements, Beam2d, Element, Quad4, Truss};
pub use load::{LoadPattern, NodalLoad};
pub use node::Node;
