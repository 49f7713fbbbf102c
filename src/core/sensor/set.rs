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

//! Control set path
//!
//! ```text
//! checks ─▶ store ─▶ link freq? ─▶ PLL selector ─▶ done
//!                        │
//!                        ▼
//!                   self pass ─▶ dispatch ─▶ dependent pass ─▶ impacted selectors
//! ```
//!
//! A failure anywhere after the value is stored puts the previous value back.

use super::{LiveContext, Sensor};
use crate::core::controls::{ids, ControlId, ControlKind, ControlValue, Impact, Stage};
use crate::core::dependency::{self, Phase};
use crate::core::description::FlipInfo;
use crate::core::error::{Result, SensorError};
use crate::core::regs::RegisterIo;

impl<B: RegisterIo> Sensor<B> {
    /// Set a control and apply it to the hardware
    ///
    /// # Errors
    ///
    /// - [`SensorError::NotFound`] for an unknown id
    /// - [`SensorError::Disabled`] outside the control's power context
    /// - [`SensorError::NotWritable`] for read-only controls
    /// - [`SensorError::TypeMismatch`] for a 32/64-bit mismatch
    /// - [`SensorError::OutOfRange`] outside the control's current bounds
    /// - [`SensorError::OffStep`] between two steps of a stepped control
    /// - [`SensorError::UnsupportedFlip`] for a flip missing from the flip
    ///   table
    /// - any evaluation or bus error of the control's register program
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use crlsensor::core::controls::ids;
    /// # fn demo(sensor: &mut crlsensor::core::sensor::Sensor<crlsensor::core::regs::MemoryBus>) -> crlsensor::Result<()> {
    /// sensor.set_control(ids::EXPOSURE, 1000)?;
    /// sensor.set_control(ids::DIGITAL_GAIN, 0x0180i64)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_control(&mut self, id: ControlId, value: impl Into<ControlValue>) -> Result<()> {
        let index = self.bank.position(id).ok_or(SensorError::NotFound { id })?;
        self.set_at(index, value.into())
    }

    /// Set the control with this id owned by `stage`
    pub fn set_control_on(
        &mut self,
        stage: Stage,
        id: ControlId,
        value: impl Into<ControlValue>,
    ) -> Result<()> {
        let index = self
            .bank
            .position_on(stage, id)
            .ok_or(SensorError::NotFound { id })?;
        self.set_at(index, value.into())
    }

    fn set_at(&mut self, index: usize, value: ControlValue) -> Result<()> {
        let instance = self.instance(index)?;
        let id = instance.id();
        let descriptor = instance.descriptor();

        if !instance.is_ready() {
            return Err(SensorError::NotReady { id });
        }
        if !instance.is_enabled() {
            return Err(SensorError::Disabled { id });
        }
        if descriptor.is_read_only() {
            return Err(SensorError::NotWritable { id });
        }
        if !descriptor.kind.accepts(value) {
            return Err(SensorError::TypeMismatch {
                id,
                expected: descriptor.kind.type_name(),
            });
        }
        let raw = value.as_i64();
        if raw < instance.min() || raw > instance.max() {
            return Err(SensorError::OutOfRange {
                id,
                value: raw,
                min: instance.min(),
                max: instance.max(),
            });
        }
        let step = instance.step();
        if step > 1 && (raw - instance.min()) % step != 0 {
            return Err(SensorError::OffStep {
                id,
                value: raw,
                min: instance.min(),
                step,
            });
        }

        let previous = instance.value();
        log::debug!("Set {} = {}", descriptor.name, raw);
        self.store(index, raw);

        if let Err(e) = self.apply(index, raw) {
            log::debug!("Set {} failed, restoring {}: {}", id, previous, e);
            self.store(index, previous);
            return Err(e);
        }
        Ok(())
    }

    fn store(&mut self, index: usize, value: i64) {
        if let Some(instance) = self.bank.get_mut(index) {
            instance.set_value(value);
        }
    }

    pub(super) fn apply(&mut self, index: usize, raw: i64) -> Result<()> {
        let (id, impact, wide) = {
            let instance = self.instance(index)?;
            let descriptor = instance.descriptor();
            (
                instance.id(),
                descriptor.impact,
                matches!(descriptor.kind, ControlKind::Integer64 { .. }),
            )
        };

        if id == ids::LINK_FREQ {
            self.select_pll()?;
            return Ok(());
        }

        self.impacts |= impact;

        let requested = register_value(id, raw)?;
        let mut proposed = requested;
        {
            let mut ctx =
                LiveContext::new(&self.bank, &self.pipeline, &self.description, &mut self.bus);
            dependency::apply(&self.bank, index, &mut proposed, Phase::SelfControl, &mut ctx);
        }
        if proposed != requested {
            // 32-bit controls hold the register word reinterpreted as signed
            let adjusted = if wide {
                i64::from(proposed)
            } else {
                i64::from(proposed as i32)
            };
            self.store(index, adjusted);
        }

        match id {
            ids::HFLIP | ids::VFLIP => self.apply_flip(index, id, proposed)?,
            ids::HBLANK | ids::VBLANK if self.blanking_superseded => {
                log::info!("{} is superseded by frame size controls, disabling", id);
                if let Some(instance) = self.bank.get_mut(index) {
                    instance.set_enabled(false);
                }
            }
            ids::HBLANK | ids::VBLANK => {
                let pa = self.pipeline.pixel_array.source_crop;
                let base = if id == ids::HBLANK { pa.width } else { pa.height };
                self.run_program(index, base.wrapping_add(proposed))?;
            }
            ids::LINE_LENGTH_PIXELS | ids::FRAME_LENGTH_LINES => {
                let mode = self.current_mode_descriptor();
                let min = if id == ids::LINE_LENGTH_PIXELS {
                    mode.min_llp
                } else {
                    mode.min_fll
                };
                self.run_program(index, proposed.max(min))?;
            }
            ids::SENSOR_MODE => self.update_current_mode(),
            _ => self.run_program(index, proposed)?,
        }

        {
            let mut ctx =
                LiveContext::new(&self.bank, &self.pipeline, &self.description, &mut self.bus);
            dependency::apply(&self.bank, index, &mut proposed, Phase::DependentControl, &mut ctx);
        }

        if impact.contains(Impact::MODE_SELECTION) && id != ids::SENSOR_MODE {
            self.update_current_mode();
        }
        if impact.contains(Impact::PLL_SELECTION) && self.bank.position(ids::LINK_FREQ).is_some() {
            self.select_pll()?;
        }
        Ok(())
    }

    /// Mirror the readout and switch to the format with the new pixel order
    fn apply_flip(&mut self, index: usize, id: ControlId, value: u32) -> Result<()> {
        let bit = if id == ids::HFLIP {
            FlipInfo::HFLIP
        } else {
            FlipInfo::VFLIP
        };
        let mut flip = self.pipeline.flip;
        flip.set(bit, value != 0);

        let order = self
            .description
            .flips
            .iter()
            .find(|f| f.flip == flip)
            .map(|f| f.pixel_order)
            .ok_or(SensorError::UnsupportedFlip { flip: flip.bits() })?;
        let bits_per_pixel = self.current_format()?.bits_per_pixel;
        let format_index = self
            .description
            .formats
            .iter()
            .position(|f| f.pixel_order == order && f.bits_per_pixel == bits_per_pixel)
            .ok_or(SensorError::NoDataFormat {
                order,
                bits_per_pixel,
            })?;

        self.run_program(index, value)?;
        self.pipeline.format_index = format_index;
        self.pipeline.flip = flip;
        log::debug!("Flip {:?}: format {} ({:?})", flip, format_index, order);
        Ok(())
    }
}

/// Register word for a control value
///
/// Negative 32-bit values keep their two's complement bits. 64-bit values
/// must fit in 32 bits.
fn register_value(id: ControlId, raw: i64) -> Result<u32> {
    u32::try_from(raw)
        .or_else(|_| i32::try_from(raw).map(|v| v as u32))
        .map_err(|_| SensorError::OutOfRange {
            id,
            value: raw,
            min: i64::from(i32::MIN),
            max: i64::from(u32::MAX),
        })
}
