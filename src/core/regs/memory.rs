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

//! In-memory register bus
//!
//! Keeps one value per `(device, address)` pair and records every access so
//! that callers can check exactly which registers a control touched.

use std::collections::{HashMap, HashSet};

use super::{BusError, RegWidth, RegisterIo};

/// A single recorded bus access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Read {
        device: Option<u16>,
        address: u16,
        width: RegWidth,
        value: u32,
    },
    Write {
        device: Option<u16>,
        address: u16,
        width: RegWidth,
        value: u32,
    },
    Delay {
        ms: u32,
    },
}

/// Register file backed by a hash map
///
/// Unwritten registers read as zero. Delays are recorded, not slept.
#[derive(Debug, Default)]
pub struct MemoryBus {
    registers: HashMap<(Option<u16>, u16), u32>,
    ops: Vec<BusOp>,
    faults: HashSet<u16>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register on the sensor's own address without logging an access
    pub fn preset(&mut self, address: u16, value: u32) {
        self.registers.insert((None, address), value);
    }

    /// Make every access to `address` fail with [`BusError::Nack`]
    pub fn inject_fault(&mut self, address: u16) {
        self.faults.insert(address);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Current contents of a register on the sensor's own address
    pub fn value(&self, address: u16) -> Option<u32> {
        self.value_at(None, address)
    }

    pub fn value_at(&self, device: Option<u16>, address: u16) -> Option<u32> {
        self.registers.get(&(device, address)).copied()
    }

    /// Every access since creation or the last [`MemoryBus::clear_log`]
    pub fn ops(&self) -> &[BusOp] {
        &self.ops
    }

    /// Values written to `address`, oldest first
    pub fn writes_to(&self, address: u16) -> Vec<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Write {
                    address: a, value, ..
                } if *a == address => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Addresses written, in order
    pub fn written_addresses(&self) -> Vec<u16> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Write { address, .. } => Some(*address),
                _ => None,
            })
            .collect()
    }

    pub fn total_delay_ms(&self) -> u32 {
        self.ops
            .iter()
            .map(|op| match op {
                BusOp::Delay { ms } => *ms,
                _ => 0,
            })
            .sum()
    }

    pub fn clear_log(&mut self) {
        self.ops.clear();
    }

    fn check_fault(&self, address: u16) -> Result<(), BusError> {
        if self.faults.contains(&address) {
            return Err(BusError::Nack { address });
        }
        Ok(())
    }
}

impl RegisterIo for MemoryBus {
    fn read(&mut self, device: Option<u16>, address: u16, width: RegWidth) -> Result<u32, BusError> {
        if width == RegWidth::Delay {
            return Err(BusError::UnsupportedWidth { address, width });
        }
        self.check_fault(address)?;

        let value = self.value_at(device, address).unwrap_or(0) & width.value_mask();
        self.ops.push(BusOp::Read {
            device,
            address,
            width,
            value,
        });
        Ok(value)
    }

    fn write(
        &mut self,
        device: Option<u16>,
        address: u16,
        width: RegWidth,
        _mask: u32,
        value: u32,
    ) -> Result<(), BusError> {
        if width == RegWidth::Delay {
            return Err(BusError::UnsupportedWidth { address, width });
        }
        self.check_fault(address)?;

        let value = value & width.value_mask();
        self.registers.insert((device, address), value);
        self.ops.push(BusOp::Write {
            device,
            address,
            width,
            value,
        });
        Ok(())
    }

    fn delay(&mut self, ms: u32) {
        self.ops.push(BusOp::Delay { ms });
    }

    fn name(&self) -> &str {
        "MemoryBus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_register_reads_zero() {
        let mut bus = MemoryBus::new();
        assert_eq!(bus.read(None, 0x3000, RegWidth::Bits8).unwrap(), 0);
    }

    #[test]
    fn test_write_truncates_to_width() {
        let mut bus = MemoryBus::new();
        bus.write(None, 0x3000, RegWidth::Bits8, u32::MAX, 0x1234).unwrap();
        assert_eq!(bus.value(0x3000), Some(0x34));
    }

    #[test]
    fn test_device_override_is_separate_register_space() {
        let mut bus = MemoryBus::new();
        bus.write(Some(0x36), 0x0010, RegWidth::Bits16, u32::MAX, 0xBEEF).unwrap();

        assert_eq!(bus.value(0x0010), None);
        assert_eq!(bus.value_at(Some(0x36), 0x0010), Some(0xBEEF));
    }

    #[test]
    fn test_fault_injection() {
        let mut bus = MemoryBus::new();
        bus.inject_fault(0x0100);

        assert_eq!(
            bus.write(None, 0x0100, RegWidth::Bits8, 0xFF, 1),
            Err(BusError::Nack { address: 0x0100 })
        );
        assert!(bus.ops().is_empty());

        bus.clear_faults();
        assert!(bus.write(None, 0x0100, RegWidth::Bits8, 0xFF, 1).is_ok());
    }

    #[test]
    fn test_writes_to_keeps_history() {
        let mut bus = MemoryBus::new();
        bus.write(None, 0x0202, RegWidth::Bits8, 0xFF, 1).unwrap();
        bus.write(None, 0x0203, RegWidth::Bits8, 0xFF, 2).unwrap();
        bus.write(None, 0x0202, RegWidth::Bits8, 0xFF, 3).unwrap();

        assert_eq!(bus.writes_to(0x0202), vec![1, 3]);
        assert_eq!(bus.written_addresses(), vec![0x0202, 0x0203, 0x0202]);

        bus.clear_log();
        assert!(bus.ops().is_empty());
        assert_eq!(bus.value(0x0202), Some(3));
    }
}
