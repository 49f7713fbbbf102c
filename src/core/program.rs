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

//! Register program runner
//!
//! A [`RegisterProgram`] is the list of registers a control writes. Each
//! entry evaluates its own expression from the same seed, so entries never
//! see each other's results:
//!
//! ```text
//! seed = 0x0465
//!   0x0340 [right_shift 8] -> 0x04
//!   0x0341 [and 0xFF]      -> 0x65
//! ```

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::expr::{Expression, OperandSource};
use super::regs::{full_mask, RegWidth, WriteFlags};

/// One register written by a control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicWrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u16>,
    pub address: u16,
    pub width: RegWidth,
    #[serde(default)]
    pub flags: WriteFlags,
    #[serde(default = "full_mask")]
    pub mask: u32,
    #[serde(default)]
    pub expression: Expression,
}

impl DynamicWrite {
    pub fn new(address: u16, width: RegWidth, expression: Expression) -> Self {
        Self {
            device: None,
            address,
            width,
            flags: WriteFlags::empty(),
            mask: full_mask(),
            expression,
        }
    }
}

/// Ordered register writes of one control
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisterProgram(pub Vec<DynamicWrite>);

impl RegisterProgram {
    pub fn new(writes: Vec<DynamicWrite>) -> Self {
        Self(writes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&DynamicWrite> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DynamicWrite> {
        self.0.iter()
    }
}

/// Destination of a program's register writes
pub trait ProgramTarget: OperandSource {
    /// Write the evaluated value of `entry`
    fn write(&mut self, entry: &DynamicWrite, value: u32) -> Result<()>;
}

/// Evaluate and write every entry of `program` from `seed`
///
/// The first evaluation or bus failure aborts the remaining entries. Entries
/// already written stay written.
pub fn run<T: ProgramTarget + ?Sized>(program: &RegisterProgram, seed: u32, target: &mut T) -> Result<()> {
    for entry in program.iter() {
        let value = entry.expression.evaluate(seed, target)?;
        target.write(entry, value)?;
    }
    Ok(())
}
