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

/// Configuration for tagwire sessions.
///
/// Held by the [`Marshaller`](crate::Marshaller) and lent to every
/// [`Communicator`](crate::Communicator) it opens, so both ends of a session
/// behave consistently.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum nesting depth of entities inside entities.
    pub max_depth: u32,
    /// When set, versioned aggregates send full topology on every encode
    /// instead of the unchanged flag.
    pub resend_topology: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: 16,
            resend_topology: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[inline(always)]
    pub fn is_resend_topology(&self) -> bool {
        self.resend_topology
    }
}
