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

//! Sensor object
//!
//! [`Sensor`] ties a shared [`SensorDescription`] to one physical device: it
//! owns the control bank, the live pipeline geometry, the register bus and
//! the current mode and PLL selection.
//!
//! # Architecture
//!
//! ```text
//!   set_control(id, value)
//!          │
//!          ▼
//!   ┌──────────────┐  link_freq   ┌──────────────┐
//!   │ orchestrator │ ───────────▶ │ PLL selector │
//!   └──────┬───────┘              └──────────────┘
//!          │ self pass
//!          ▼
//!   ┌──────────────┐  flip / blanking / frame size / mode select
//!   │   dispatch   │ ───────────────────────────────────────────┐
//!   └──────┬───────┘                                            │
//!          │ register program                                   ▼
//!          ▼                                            ┌──────────────┐
//!   ┌──────────────┐  dependent pass                    │ mode selector│
//!   │ RegisterIo   │ ◀─────────────────                 └──────────────┘
//!   └──────────────┘
//! ```
//!
//! The sensor does no locking of its own. Callers serialize access to one
//! sensor; distinct sensors are independent.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use crlsensor::core::controls::ids;
//! use crlsensor::core::description::SensorDescription;
//! use crlsensor::core::platform::PlatformConfig;
//! use crlsensor::core::regs::MemoryBus;
//! use crlsensor::core::sensor::Sensor;
//!
//! let description = Arc::new(SensorDescription::load("sensors/imx274.toml")?);
//! let mut sensor = Sensor::new(description, PlatformConfig::default(), MemoryBus::new())?;
//!
//! sensor.power_on()?;
//! sensor.set_control(ids::EXPOSURE, 1000)?;
//! sensor.stream_on()?;
//! # Ok::<(), crlsensor::SensorError>(())
//! ```

mod frame;
mod power;
mod set;
#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use frame::{Csi2Route, FrameDescEntry, FrameDescSize, MAX_FRAME_DESC_ENTRIES};
pub use power::PowerState;

use super::controls::{
    ids, ControlBank, ControlId, ControlInstance, ControlKind, Direction, Impact, MenuItem, Stage,
};
use super::description::{DataFormat, ModeDescriptor, SensorDescription};
use super::error::{Result, SensorError};
use super::expr::{OperandSource, VariableRef};
use super::pipeline::{PipelineState, Rect};
use super::platform::PlatformConfig;
use super::program::{self, DynamicWrite, ProgramTarget};
use super::regs::{self, RegWidth, RegisterIo};
use super::select::{self, ModeStrategy, PllRequest};

/// Live state seen by expressions and written by register programs
pub(crate) struct LiveContext<'a, B: RegisterIo + ?Sized> {
    bank: &'a ControlBank,
    pipeline: &'a PipelineState,
    formats: &'a [DataFormat],
    bus: &'a mut B,
}

impl<'a, B: RegisterIo + ?Sized> LiveContext<'a, B> {
    pub(crate) fn new(
        bank: &'a ControlBank,
        pipeline: &'a PipelineState,
        description: &'a SensorDescription,
        bus: &'a mut B,
    ) -> Self {
        Self {
            bank,
            pipeline,
            formats: &description.formats,
            bus,
        }
    }
}

impl<B: RegisterIo + ?Sized> OperandSource for LiveContext<'_, B> {
    fn control_value(&self, id: ControlId) -> Result<u32> {
        self.bank.get_value(id)
    }

    fn variable(&self, var: VariableRef) -> Result<u32> {
        let (width, height) = self.pipeline.output_size();
        Ok(match var {
            VariableRef::OutputWidth => width,
            VariableRef::OutputHeight => height,
            VariableRef::BitsPerPixel => self
                .formats
                .get(self.pipeline.format_index)
                .map_or(0, |f| u32::from(f.bits_per_pixel)),
        })
    }

    fn read_register(&mut self, address: u16) -> Result<u32> {
        Ok(self.bus.read(None, address, RegWidth::Bits8)? & 0xFF)
    }
}

impl<B: RegisterIo + ?Sized> ProgramTarget for LiveContext<'_, B> {
    fn write(&mut self, entry: &DynamicWrite, value: u32) -> Result<()> {
        regs::write_register(
            &mut *self.bus,
            entry.device,
            entry.address,
            entry.width,
            entry.flags,
            entry.mask,
            value,
        )?;
        Ok(())
    }
}

/// One camera sensor driven from a static description
pub struct Sensor<B: RegisterIo> {
    description: Arc<SensorDescription>,
    platform: PlatformConfig,
    bank: ControlBank,
    pipeline: PipelineState,
    bus: B,
    state: PowerState,
    mode_strategy: ModeStrategy,
    current_mode: usize,
    pll_index: Option<usize>,
    /// Selectors armed by controls flagged as impacting them
    impacts: Impact,
    /// Frame and line length controls exist, blanking controls are unused
    blanking_superseded: bool,
}

impl<B: RegisterIo> Sensor<B> {
    /// Register a sensor
    ///
    /// Validates the description, copies its controls into a fresh bank and
    /// selects an initial mode. The sensor starts powered off with every
    /// control disabled.
    ///
    /// # Errors
    ///
    /// [`SensorError::InvalidDescription`] if the description is inconsistent.
    pub fn new(description: Arc<SensorDescription>, platform: PlatformConfig, bus: B) -> Result<Self> {
        description.validate()?;

        let stages = description.stages();
        let bank = ControlBank::new(&description.controls, &stages);

        let mode_strategy = if bank.position(ids::SENSOR_MODE).is_some() {
            ModeStrategy::ByIndex
        } else {
            ModeStrategy::ByGeometry
        };
        let blanking_superseded = bank.position(ids::FRAME_LENGTH_LINES).is_some()
            || bank.position(ids::LINE_LENGTH_PIXELS).is_some();
        let pipeline = PipelineState::new(&stages, &description.limits, description.default_format);

        log::info!(
            "Registered sensor '{}': {} controls, {} modes, {} PLLs, {:?}",
            description.name,
            bank.len(),
            description.modes.len(),
            description.plls.len(),
            mode_strategy
        );

        let mut sensor = Self {
            current_mode: description.fail_safe_mode,
            description,
            platform,
            bank,
            pipeline,
            bus,
            state: PowerState::Off,
            mode_strategy,
            pll_index: None,
            impacts: Impact::empty(),
            blanking_superseded,
        };
        sensor.update_current_mode();
        Ok(sensor)
    }

    pub fn description(&self) -> &SensorDescription {
        &self.description
    }

    pub fn platform(&self) -> &PlatformConfig {
        &self.platform
    }

    pub fn bank(&self) -> &ControlBank {
        &self.bank
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    /// Direct access for format negotiation
    ///
    /// Call [`Sensor::update_current_mode`] after changing geometry.
    pub fn pipeline_mut(&mut self) -> &mut PipelineState {
        &mut self.pipeline
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn mode_strategy(&self) -> ModeStrategy {
        self.mode_strategy
    }

    pub fn current_mode(&self) -> usize {
        self.current_mode
    }

    pub fn current_mode_descriptor(&self) -> &ModeDescriptor {
        &self.description.modes[self.current_mode]
    }

    pub fn pll_index(&self) -> Option<usize> {
        self.pll_index
    }

    pub fn current_format(&self) -> Result<&DataFormat> {
        self.description
            .formats
            .get(self.pipeline.format_index)
            .ok_or_else(|| {
                SensorError::InvalidDescription(format!(
                    "format index {} out of range",
                    self.pipeline.format_index
                ))
            })
    }

    pub fn menu_item(&self, id: ControlId, index: usize) -> Result<MenuItem> {
        self.bank.menu_item(id, index)
    }

    fn instance(&self, index: usize) -> Result<&ControlInstance> {
        self.bank.get(index).ok_or_else(|| {
            SensorError::InvalidDescription(format!("control index {} out of range", index))
        })
    }

    /// Run the register program of the control at `index` from `seed`
    fn run_program(&mut self, index: usize, seed: u32) -> Result<()> {
        let instance = self.bank.get(index).ok_or_else(|| {
            SensorError::InvalidDescription(format!("control index {} out of range", index))
        })?;
        let mut ctx = LiveContext::new(&self.bank, &self.pipeline, &self.description, &mut self.bus);
        program::run(&instance.descriptor().program, seed, &mut ctx)
    }

    /// Read a control
    ///
    /// Writable controls return their stored value. Read-only and volatile
    /// controls are computed by the expression of their first register
    /// program entry, seeded with the stored value.
    ///
    /// # Errors
    ///
    /// - [`SensorError::NotFound`] for an unknown id
    /// - [`SensorError::NotReadable`] for write-only controls
    /// - [`SensorError::EmptyProgram`] for read-only or volatile controls
    ///   with no program
    pub fn get_control(&mut self, id: ControlId) -> Result<i64> {
        let index = self.bank.position(id).ok_or(SensorError::NotFound { id })?;
        self.get_at(index)
    }

    /// Read the control with this id owned by `stage`
    pub fn get_control_on(&mut self, stage: Stage, id: ControlId) -> Result<i64> {
        let index = self
            .bank
            .position_on(stage, id)
            .ok_or(SensorError::NotFound { id })?;
        self.get_at(index)
    }

    fn get_at(&mut self, index: usize) -> Result<i64> {
        let instance = self.bank.get(index).ok_or_else(|| {
            SensorError::InvalidDescription(format!("control index {} out of range", index))
        })?;
        let id = instance.id();
        let descriptor = instance.descriptor();

        if !instance.is_ready() {
            return Err(SensorError::NotReady { id });
        }
        if descriptor.is_write_only() {
            return Err(SensorError::NotReadable { id });
        }
        if !descriptor.is_volatile() {
            return Ok(instance.value());
        }

        let entry = descriptor
            .program
            .first()
            .ok_or(SensorError::EmptyProgram { id })?;
        if descriptor.program.len() > 1 {
            log::warn!(
                "{}: {} register entries, reading from the first",
                descriptor.name,
                descriptor.program.len()
            );
        }

        let seed = instance.value() as u32;
        let mut ctx = LiveContext::new(&self.bank, &self.pipeline, &self.description, &mut self.bus);
        let value = entry.expression.evaluate(seed, &mut ctx)?;
        Ok(i64::from(value))
    }

    /// Re-run mode selection and refresh mode-dependent controls
    ///
    /// Falls back to the fail-safe mode when nothing matches; never fails.
    pub fn update_current_mode(&mut self) {
        let description = Arc::clone(&self.description);
        let modes = &description.modes;
        let fail_safe = description.fail_safe_mode;

        let index = match self.mode_strategy {
            ModeStrategy::ByIndex => {
                let requested = self.bank.find(ids::SENSOR_MODE).map_or(0, |c| c.value());
                select::select_by_index(modes, requested).unwrap_or_else(|| {
                    log::warn!(
                        "Sensor mode {} not in table, using fail-safe mode {}",
                        requested,
                        fail_safe
                    );
                    fail_safe
                })
            }
            ModeStrategy::ByGeometry => {
                let bank = &self.bank;
                select::select_by_geometry(
                    modes,
                    &self.pipeline,
                    self.impacts.contains(Impact::MODE_SELECTION),
                    |id| bank.get_value(id),
                )
                .unwrap_or_else(|| {
                    log::info!("No matching mode, using fail-safe mode {}", fail_safe);
                    fail_safe
                })
            }
        };

        self.current_mode = index;
        let mode = &modes[index];
        log::debug!("Mode {} selected: {}x{}", index, mode.width, mode.height);

        if self.mode_strategy == ModeStrategy::ByIndex {
            self.pipeline.apply_mode(mode);
        }

        // Mode-derived read-back controls; user-owned ones are left alone
        for m in &mode.matches {
            let Some(ci) = self.bank.position(m.control) else {
                continue;
            };
            if let Some(instance) = self.bank.get_mut(ci) {
                if instance.descriptor().direction == Direction::Get {
                    instance.set_value(i64::from(m.value));
                }
            }
        }

        if self.blanking_superseded {
            self.update_frame_size_bounds(mode);
        } else {
            self.update_blanking_bounds(mode);
        }
    }

    fn update_blanking_bounds(&mut self, mode: &ModeDescriptor) {
        let pa = self.pipeline.pixel_array.source_crop;
        let (hblank, vblank) =
            select::frame_blanking_bounds(mode, &self.description.limits, pa.width, pa.height);

        for (id, bounds) in [(ids::HBLANK, hblank), (ids::VBLANK, vblank)] {
            let Some(ci) = self.bank.position(id) else {
                continue;
            };
            if let Some(instance) = self.bank.get_mut(ci) {
                instance.set_bounds(bounds.min, bounds.max, bounds.min);
                log::debug!("{}: [{}, {}]", id, bounds.min, bounds.max);
            }
        }
    }

    fn update_frame_size_bounds(&mut self, mode: &ModeDescriptor) {
        for (id, min) in [
            (ids::LINE_LENGTH_PIXELS, mode.min_llp),
            (ids::FRAME_LENGTH_LINES, mode.min_fll),
        ] {
            let Some(ci) = self.bank.position(id) else {
                continue;
            };
            if let Some(instance) = self.bank.get_mut(ci) {
                let min = i64::from(min);
                let max = instance.max();
                instance.set_bounds(min, max, min);
            }
        }
    }

    /// Select the PLL row for the current link frequency and format
    ///
    /// Publishes the row's pixel rates into the pixel rate controls.
    ///
    /// # Errors
    ///
    /// - [`SensorError::NotFound`] without a link frequency control
    /// - [`SensorError::TypeMismatch`] if that control is not an integer menu
    /// - [`SensorError::NoPllConfiguration`] if no row matches
    pub fn select_pll(&mut self) -> Result<usize> {
        let link = self.bank.find(ids::LINK_FREQ).ok_or(SensorError::NotFound {
            id: ids::LINK_FREQ,
        })?;
        if !matches!(link.descriptor().kind, ControlKind::IntegerMenu { .. }) {
            return Err(SensorError::TypeMismatch {
                id: ids::LINK_FREQ,
                expected: "integer menu",
            });
        }
        let link_freq = u64::from(link.resolved_value());

        let request = PllRequest {
            link_freq,
            ext_clk: self.platform.ext_clk,
            lanes: self.platform.lanes,
            bits_per_pixel: self.current_format()?.bits_per_pixel,
            check_controls: self.impacts.contains(Impact::PLL_SELECTION),
        };

        let bank = &self.bank;
        let index = select::select_pll(&self.description.plls, &request, |id| bank.get_value(id))
            .ok_or(SensorError::NoPllConfiguration { link_freq })?;
        self.pll_index = Some(index);

        let description = Arc::clone(&self.description);
        let pll = &description.plls[index];
        let csi_stage = self.pipeline.source_stage();
        if let Some(ci) = self.bank.position_on(Stage::PixelArray, ids::PIXEL_RATE) {
            if let Some(instance) = self.bank.get_mut(ci) {
                instance.set_value(pll.pixel_rate_pa as i64);
            }
        }
        if csi_stage != Stage::PixelArray {
            if let Some(ci) = self.bank.position_on(csi_stage, ids::PIXEL_RATE) {
                if let Some(instance) = self.bank.get_mut(ci) {
                    instance.set_value(pll.pixel_rate_csi as i64);
                }
            }
        }

        log::debug!(
            "PLL {}: pixel rate {} / {}",
            index,
            pll.pixel_rate_pa,
            pll.pixel_rate_csi
        );
        Ok(index)
    }

    /// Index of the format with media bus code `code`
    pub fn data_format_index(&self, code: u32) -> Option<usize> {
        self.description.format_index(code)
    }

    /// Media bus code of format `index`, for enumeration
    pub fn format_code(&self, index: usize) -> Option<u32> {
        self.description.formats.get(index).map(|f| f.code)
    }

    /// Output size of mode `index`, for enumeration
    pub fn frame_size(&self, index: usize) -> Option<(u32, u32)> {
        self.description.modes.get(index).map(|m| (m.width, m.height))
    }

    /// Switch to the format with media bus code `code`
    pub fn set_format(&mut self, code: u32) -> Result<()> {
        let index = self
            .data_format_index(code)
            .ok_or(SensorError::UnknownFormatCode { code })?;
        self.pipeline.format_index = index;
        log::debug!("Format {} (0x{:04X})", index, code);
        self.update_current_mode();
        Ok(())
    }

    /// Request an output size on the source stage
    ///
    /// The size is clamped to the sensor's address limits.
    ///
    /// # Returns
    ///
    /// The size actually applied
    pub fn set_source_size(&mut self, width: u32, height: u32) -> (u32, u32) {
        let limits = self.description.limits;
        let width = width.clamp(limits.x_addr_min, limits.x_addr_max.max(limits.x_addr_min));
        let height = height.clamp(limits.y_addr_min, limits.y_addr_max.max(limits.y_addr_min));

        let stage = self.pipeline.source_mut();
        stage.source_crop = Rect::new(stage.source_crop.left, stage.source_crop.top, width, height);
        self.update_current_mode();
        (width, height)
    }

    /// Set the compose rectangle of the binner or scaler
    ///
    /// The binner derives its binning factors from sink size over compose
    /// size, the scaler its scale factor from
    /// `sink_width * scaler_m_min / width`.
    ///
    /// # Errors
    ///
    /// [`SensorError::StageNotPresent`] for the pixel array or an absent stage.
    pub fn set_compose(&mut self, stage: Stage, width: u32, height: u32) -> Result<()> {
        let width = width.max(1);
        let height = height.max(1);
        let limits = self.description.limits;

        match stage {
            Stage::PixelArray => return Err(SensorError::StageNotPresent { stage }),
            Stage::Binner => {
                let binner = self
                    .pipeline
                    .binner
                    .as_mut()
                    .ok_or(SensorError::StageNotPresent { stage })?;
                let sink = binner.sink_crop;
                binner.compose = Rect::sized(width, height);
                self.pipeline.binning_horizontal = (sink.width / width).clamp(1, 255) as u8;
                self.pipeline.binning_vertical = (sink.height / height).clamp(1, 255) as u8;
            }
            Stage::Scaler => {
                let scaler = self
                    .pipeline
                    .scaler
                    .as_mut()
                    .ok_or(SensorError::StageNotPresent { stage })?;
                let sink = scaler.sink_crop;
                scaler.compose = Rect::sized(width, height);
                let mut scale = u64::from(sink.width) * u64::from(limits.scaler_m_min) / u64::from(width);
                if limits.scaler_m_max != 0 {
                    scale = scale.clamp(u64::from(limits.scaler_m_min), u64::from(limits.scaler_m_max));
                }
                self.pipeline.scale_m = scale.clamp(1, 255) as u8;
            }
        }

        self.update_current_mode();
        Ok(())
    }
}
