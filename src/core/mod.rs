// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Control resolution engine
//!
//! Bottom-up:
//!
//! - [`regs`]: register bus trait, static register lists, in-memory bus
//! - [`expr`]: expression evaluator
//! - [`program`]: per-control register programs
//! - [`controls`]: control descriptors, ids and the live control bank
//! - [`dependency`]: inter-control rules and their adjacency list
//! - [`pipeline`]: live stage geometry
//! - [`description`]: static sensor description tables
//! - [`select`]: PLL and mode selectors
//! - [`sensor`]: the sensor object tying everything together

pub mod controls;
pub mod dependency;
pub mod description;
pub mod error;
pub mod expr;
pub mod pipeline;
pub mod platform;
pub mod program;
pub mod regs;
pub mod select;
pub mod sensor;
