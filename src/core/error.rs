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

//! Error types for the sensor control engine
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias for
//! `std::result::Result<T, SensorError>`. Failures coming from the register
//! bus are carried verbatim inside [`SensorError::Io`].

use thiserror::Error;

use super::controls::{ControlId, Stage};
use super::description::PixelOrder;
use super::regs::BusError;

/// Sensor control engine error
#[derive(Debug, Error)]
pub enum SensorError {
    /// No control with this id exists in the bank
    #[error("control {id} not found")]
    NotFound { id: ControlId },

    /// Control exists but has no backing value
    #[error("control {id} has no backing value")]
    NotReady { id: ControlId },

    /// Control is not enabled in the current power context
    #[error("control {id} is disabled in the current context")]
    Disabled { id: ControlId },

    #[error("control {id} is read-only")]
    NotWritable { id: ControlId },

    #[error("control {id} is write-only")]
    NotReadable { id: ControlId },

    #[error("control {id} expects a {expected} value")]
    TypeMismatch {
        id: ControlId,
        expected: &'static str,
    },

    #[error("value {value} for control {id} outside [{min}, {max}]")]
    OutOfRange {
        id: ControlId,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Value is in range but not `min + n * step`
    #[error("value {value} for control {id} is not a multiple of {step} from {min}")]
    OffStep {
        id: ControlId,
        value: i64,
        min: i64,
        step: i64,
    },

    /// No PLL row matches the requested link frequency, clock, lanes and depth
    #[error("no PLL configuration for link frequency {link_freq} Hz")]
    NoPllConfiguration { link_freq: u64 },

    #[error("division by zero in expression")]
    DivideByZero,

    /// Read-only control has nothing to compute its value from
    #[error("control {id} has no register program")]
    EmptyProgram { id: ControlId },

    #[error("dependency {dependency} of control {control} is unavailable")]
    DependencyLookupFailed {
        control: ControlId,
        dependency: ControlId,
    },

    #[error("no flip table entry for flip bits 0x{flip:02X}")]
    UnsupportedFlip { flip: u8 },

    #[error("no data format with pixel order {order:?} at {bits_per_pixel} bpp")]
    NoDataFormat {
        order: PixelOrder,
        bits_per_pixel: u8,
    },

    #[error("unknown media bus code 0x{code:04X}")]
    UnknownFormatCode { code: u32 },

    #[error("{stage:?} stage not present or not configurable")]
    StageNotPresent { stage: Stage },

    #[error("invalid sensor description: {0}")]
    InvalidDescription(String),

    #[error("sensor is not powered on")]
    NotPowered,

    /// Register bus failure
    #[error("register bus error: {0}")]
    Io(#[from] BusError),

    #[error("failed to read sensor description: {0}")]
    DescriptionIo(#[from] std::io::Error),

    #[error("failed to parse TOML sensor description: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize sensor description: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("failed to parse JSON sensor description: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for sensor operations
pub type Result<T> = std::result::Result<T, SensorError>;
