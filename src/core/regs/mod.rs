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

//! Register bus abstraction
//!
//! The engine never talks to a physical bus directly. Every register read and
//! write goes through the [`RegisterIo`] trait, which the embedding driver
//! implements on top of its I2C (or other) transport.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Sensor                        │
//! │  power-up / stream lists   control programs  │
//! └───────────┬──────────────────────┬───────────┘
//!             │ write_list           │ write_register
//!             ▼                      ▼
//! ┌──────────────────────────────────────────────┐
//! │  write_register()                            │
//! │    Delay      -> bus.delay(value)            │
//! │    RMW flag   -> bus.read(), merge, write    │
//! │    otherwise  -> bus.write()                 │
//! └───────────────────────┬──────────────────────┘
//!                         ▼
//!               ┌───────────────────┐
//!               │  dyn RegisterIo   │  I2C, MemoryBus, ...
//!               └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use crlsensor::core::regs::{write_register, MemoryBus, RegWidth, WriteFlags};
//!
//! let mut bus = MemoryBus::new();
//! bus.preset(0x0101, 0xF0);
//!
//! // Only the low nibble is replaced
//! write_register(&mut bus, None, 0x0101, RegWidth::Bits8, WriteFlags::READ_MODIFY_WRITE, 0x0F, 0x03)
//!     .unwrap();
//! assert_eq!(bus.value(0x0101), Some(0xF3));
//! ```

mod memory;

use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{BusOp, MemoryBus};

/// Access width of a register write
///
/// `Delay` is not an access at all: the entry's value is a wait in
/// milliseconds and the bus is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegWidth {
    #[serde(rename = "8bit")]
    Bits8,
    #[serde(rename = "16bit")]
    Bits16,
    #[serde(rename = "24bit")]
    Bits24,
    #[serde(rename = "32bit")]
    Bits32,
    #[serde(rename = "delay")]
    Delay,
}

impl RegWidth {
    /// Number of bytes transferred on the bus
    pub fn bytes(self) -> usize {
        match self {
            RegWidth::Bits8 => 1,
            RegWidth::Bits16 => 2,
            RegWidth::Bits24 => 3,
            RegWidth::Bits32 => 4,
            RegWidth::Delay => 0,
        }
    }

    /// Mask of the bits a register of this width can hold
    pub fn value_mask(self) -> u32 {
        match self {
            RegWidth::Bits8 => 0xFF,
            RegWidth::Bits16 => 0xFFFF,
            RegWidth::Bits24 => 0x00FF_FFFF,
            RegWidth::Bits32 | RegWidth::Delay => u32::MAX,
        }
    }
}

bitflags! {
    /// Modifiers applied to a single register write
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct WriteFlags: u8 {
        /// Merge `value & mask` into the current register contents
        const READ_MODIFY_WRITE = 1 << 0;
    }
}

/// Errors reported by a register bus implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("no acknowledge at register 0x{address:04X}")]
    Nack { address: u16 },

    #[error("{width:?} access not supported at register 0x{address:04X}")]
    UnsupportedWidth { address: u16, width: RegWidth },

    #[error("bus transfer failed: {0}")]
    Transfer(String),
}

/// Synchronous register access to one sensor
///
/// `device` overrides the bus address of the sensor for a single access;
/// `None` targets the sensor's own address.
///
/// # Thread Safety
///
/// Implementations need not be `Sync`. A sensor owns its bus exclusively and
/// all calls happen under the caller's lock.
pub trait RegisterIo {
    /// Read a register
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] if the transfer fails.
    fn read(&mut self, device: Option<u16>, address: u16, width: RegWidth) -> Result<u32, BusError>;

    /// Write a register
    ///
    /// `mask` is informational: read-modify-write merging has already been
    /// applied by [`write_register`] when the flag was set.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] if the transfer fails.
    fn write(
        &mut self,
        device: Option<u16>,
        address: u16,
        width: RegWidth,
        mask: u32,
        value: u32,
    ) -> Result<(), BusError>;

    /// Wait `ms` milliseconds between two writes
    fn delay(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }

    /// Bus name for logging
    fn name(&self) -> &str {
        "register bus"
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for Box<T> {
    fn read(&mut self, device: Option<u16>, address: u16, width: RegWidth) -> Result<u32, BusError> {
        (**self).read(device, address, width)
    }

    fn write(
        &mut self,
        device: Option<u16>,
        address: u16,
        width: RegWidth,
        mask: u32,
        value: u32,
    ) -> Result<(), BusError> {
        (**self).write(device, address, width, mask, value)
    }

    fn delay(&mut self, ms: u32) {
        (**self).delay(ms)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One entry of a static register list (power-up, stream-on, mode, PLL, format)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValue {
    pub address: u16,
    pub width: RegWidth,
    pub value: u32,
    #[serde(default = "full_mask")]
    pub mask: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u16>,
    #[serde(default)]
    pub flags: WriteFlags,
}

impl RegisterValue {
    /// Plain write of `value` to `address`
    pub fn new(address: u16, width: RegWidth, value: u32) -> Self {
        Self {
            address,
            width,
            value,
            mask: full_mask(),
            device: None,
            flags: WriteFlags::empty(),
        }
    }

    /// Wait entry of `ms` milliseconds
    pub fn delay(ms: u32) -> Self {
        Self::new(0, RegWidth::Delay, ms)
    }
}

pub(crate) fn full_mask() -> u32 {
    u32::MAX
}

/// Issue one register write, honouring delays and read-modify-write
///
/// # Arguments
///
/// * `bus` - Register bus
/// * `device` - Device address override
/// * `address` - Register address
/// * `width` - Access width, or [`RegWidth::Delay`]
/// * `flags` - Write modifiers
/// * `mask` - Bits of `value` to merge when read-modify-write is requested
/// * `value` - Value to write (milliseconds for a delay)
///
/// # Errors
///
/// Propagates the bus error of the read or the write.
pub fn write_register<B: RegisterIo + ?Sized>(
    bus: &mut B,
    device: Option<u16>,
    address: u16,
    width: RegWidth,
    flags: WriteFlags,
    mask: u32,
    value: u32,
) -> Result<(), BusError> {
    if width == RegWidth::Delay {
        log::trace!("{}: delay {} ms", bus.name(), value);
        bus.delay(value);
        return Ok(());
    }

    let value = if flags.contains(WriteFlags::READ_MODIFY_WRITE) {
        let current = bus.read(device, address, width)?;
        (value & mask) | (current & !mask)
    } else {
        value
    };

    log::trace!(
        "{}: write 0x{:04X} = 0x{:08X} ({:?})",
        bus.name(),
        address,
        value,
        width
    );
    bus.write(device, address, width, mask, value)
}

/// Write a static register list in order, stopping at the first failure
pub fn write_list<B: RegisterIo + ?Sized>(bus: &mut B, list: &[RegisterValue]) -> Result<(), BusError> {
    for reg in list {
        write_register(
            bus,
            reg.device,
            reg.address,
            reg.width,
            reg.flags,
            reg.mask,
            reg.value,
        )?;
    }
    Ok(())
}
