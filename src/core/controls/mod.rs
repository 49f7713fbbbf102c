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

//! Control descriptors and the per-sensor control bank
//!
//! A [`ControlDescriptor`] is the static, shareable definition of a control.
//! At registration every descriptor is copied into a [`ControlInstance`] held
//! by the sensor's [`ControlBank`], which adds the live value, the enabled
//! flag and the resolved bounds.
//!
//! # Contexts
//!
//! Every control carries a [`Context`] tag. The sensor's power state decides
//! which tags are writable:
//!
//! ```text
//! Idle       writable while powered and not streaming
//! Streaming  writable only while streaming
//! PoweredOn  writable whenever the sensor is powered
//! ```

mod bank;
pub mod ids;

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::dependency::DependencyProvision;
use super::program::RegisterProgram;

pub use bank::{ControlBank, ControlInstance};

/// Numeric control identifier
///
/// Deserializes from either a number or a well-known name such as
/// `"exposure"` (see [`ids`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawControlId", into = "u32")]
pub struct ControlId(pub u32);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match ids::name_of(*self) {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl From<ControlId> for u32 {
    fn from(id: ControlId) -> u32 {
        id.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawControlId {
    Number(u32),
    Name(String),
}

impl TryFrom<RawControlId> for ControlId {
    type Error = String;

    fn try_from(raw: RawControlId) -> Result<Self, Self::Error> {
        match raw {
            RawControlId::Number(n) => Ok(ControlId(n)),
            RawControlId::Name(name) => {
                ids::from_name(&name).ok_or_else(|| format!("unknown control name '{}'", name))
            }
        }
    }
}

/// Pipeline stage owning a control or a set of rectangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PixelArray,
    Binner,
    Scaler,
}

/// Whether a control is written by the user or derived by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Set,
    Get,
}

/// Power context a control belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    Idle,
    Streaming,
    #[default]
    PoweredOn,
}

impl Context {
    pub const ALL: [Context; 3] = [Context::Idle, Context::Streaming, Context::PoweredOn];
}

bitflags! {
    /// Access flags of a control
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ControlFlags: u8 {
        const READ_ONLY = 1 << 0;
        const WRITE_ONLY = 1 << 1;
        /// Reads evaluate the register program instead of returning the
        /// stored value
        const VOLATILE = 1 << 2;
    }
}

bitflags! {
    /// Selectors a control change must re-run
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Impact: u8 {
        const PLL_SELECTION = 1 << 0;
        const MODE_SELECTION = 1 << 1;
    }
}

/// Value type and bounds of a control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlKind {
    Integer {
        min: i64,
        max: i64,
        #[serde(default = "default_step")]
        step: i64,
        #[serde(default)]
        default: i64,
    },
    Integer64 {
        min: i64,
        max: i64,
        #[serde(default = "default_step")]
        step: i64,
        #[serde(default)]
        default: i64,
    },
    /// Index into a table of integers (e.g. link frequencies in Hz)
    IntegerMenu {
        menu: Vec<i64>,
        #[serde(default)]
        default: i64,
    },
    StringMenu {
        items: Vec<String>,
        #[serde(default)]
        default: i64,
    },
    /// Sensor-specific integer control
    Custom {
        min: i64,
        max: i64,
        #[serde(default = "default_step")]
        step: i64,
        #[serde(default)]
        default: i64,
    },
}

fn default_step() -> i64 {
    1
}

impl ControlKind {
    /// `(min, max, step, default)` as declared
    pub fn bounds(&self) -> (i64, i64, i64, i64) {
        match self {
            ControlKind::Integer {
                min,
                max,
                step,
                default,
            }
            | ControlKind::Integer64 {
                min,
                max,
                step,
                default,
            }
            | ControlKind::Custom {
                min,
                max,
                step,
                default,
            } => (*min, *max, *step, *default),
            ControlKind::IntegerMenu { menu, default } => (0, menu.len() as i64 - 1, 1, *default),
            ControlKind::StringMenu { items, default } => {
                (0, items.len() as i64 - 1, 1, *default)
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ControlKind::Integer { .. } => "integer",
            ControlKind::Integer64 { .. } => "64-bit integer",
            ControlKind::IntegerMenu { .. } => "integer menu",
            ControlKind::StringMenu { .. } => "string menu",
            ControlKind::Custom { .. } => "custom",
        }
    }

    /// Whether a value of this shape may be stored in a control of this kind
    pub fn accepts(&self, value: ControlValue) -> bool {
        matches!(
            (self, value),
            (ControlKind::Integer64 { .. }, ControlValue::Int64(_))
                | (
                    ControlKind::Integer { .. }
                        | ControlKind::IntegerMenu { .. }
                        | ControlKind::StringMenu { .. }
                        | ControlKind::Custom { .. },
                    ControlValue::Int(_)
                )
        )
    }

    pub fn is_menu(&self) -> bool {
        matches!(
            self,
            ControlKind::IntegerMenu { .. } | ControlKind::StringMenu { .. }
        )
    }
}

/// Value handed to a control set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlValue {
    Int(i32),
    Int64(i64),
}

impl ControlValue {
    pub fn as_i64(self) -> i64 {
        match self {
            ControlValue::Int(v) => i64::from(v),
            ControlValue::Int64(v) => v,
        }
    }
}

impl From<i32> for ControlValue {
    fn from(value: i32) -> Self {
        ControlValue::Int(value)
    }
}

impl From<i64> for ControlValue {
    fn from(value: i64) -> Self {
        ControlValue::Int64(value)
    }
}

/// A menu entry returned by [`ControlBank::menu_item`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Integer(i64),
    Name(String),
}

/// Static definition of one control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub id: ControlId,
    pub name: String,
    pub stage: Stage,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub context: Context,
    pub kind: ControlKind,
    #[serde(default)]
    pub flags: ControlFlags,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default)]
    pub program: RegisterProgram,
    #[serde(default)]
    pub dependencies: Vec<DependencyProvision>,
}

impl ControlDescriptor {
    /// Integer control with a register program and nothing else
    pub fn integer(id: ControlId, name: &str, min: i64, max: i64, program: RegisterProgram) -> Self {
        Self {
            id,
            name: name.to_string(),
            stage: Stage::PixelArray,
            direction: Direction::Set,
            context: Context::PoweredOn,
            kind: ControlKind::Integer {
                min,
                max,
                step: 1,
                default: min,
            },
            flags: ControlFlags::empty(),
            impact: Impact::empty(),
            program,
            dependencies: Vec::new(),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(ControlFlags::READ_ONLY)
    }

    pub fn is_write_only(&self) -> bool {
        self.flags.contains(ControlFlags::WRITE_ONLY)
    }

    /// Whether reads go to the hardware
    pub fn is_volatile(&self) -> bool {
        self.flags
            .intersects(ControlFlags::READ_ONLY | ControlFlags::VOLATILE)
    }
}
