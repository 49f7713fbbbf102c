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

//! crlsensor: a table-driven camera sensor control engine
//!
//! A sensor is described entirely by data: its controls and the register
//! programs they run, the dependencies between controls, the PLL and mode
//! tables, formats and power sequences. This crate turns control requests
//! into register writes against that description.
//!
//! # Architecture
//!
//! - [`core`]: description tables, expression evaluator, selectors and the
//!   sensor object
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use crlsensor::core::controls::ids;
//! use crlsensor::core::description::SensorDescription;
//! use crlsensor::core::platform::PlatformConfig;
//! use crlsensor::core::regs::MemoryBus;
//! use crlsensor::Sensor;
//!
//! let description = Arc::new(SensorDescription::load("sensors/imx274.toml")?);
//! let platform = PlatformConfig::load("platform.toml")?;
//! let mut sensor = Sensor::new(description, platform, MemoryBus::new())?;
//!
//! sensor.power_on()?;
//! sensor.set_source_size(1932, 1087);
//! sensor.set_control(ids::EXPOSURE, 1000)?;
//! sensor.stream_on()?;
//! # Ok::<(), crlsensor::SensorError>(())
//! ```
//!
//! # Getting Started
//!
//! 1. Load a [`core::description::SensorDescription`] (TOML or JSON)
//! 2. Implement [`core::regs::RegisterIo`] for the bus the sensor sits on
//! 3. Create a [`Sensor`], power it on and set controls
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, SensorError>`.

pub mod core;

// Re-export commonly used types
pub use core::error::{Result, SensorError};
pub use core::sensor::{PowerState, Sensor};
