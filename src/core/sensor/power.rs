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

//! Power and streaming sequences
//!
//! Each power state enables a fixed set of control contexts:
//!
//! ```text
//! state       idle   powered_on   streaming
//! Off          -         -            -
//! PoweredOn    x         x            -
//! Streaming    -         x            x
//! ```
//!
//! Stream-on writes, in order: the format list, the PLL list, the mode
//! list, then the stream-on list.

use std::sync::Arc;

use super::Sensor;
use crate::core::controls::{ids, Context};
use crate::core::error::{Result, SensorError};
use crate::core::regs::{self, RegWidth, RegisterIo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Off,
    PoweredOn,
    Streaming,
}

impl PowerState {
    /// Whether controls of `context` may be set in this state
    pub fn enables(self, context: Context) -> bool {
        matches!(
            (self, context),
            (PowerState::PoweredOn, Context::Idle | Context::PoweredOn)
                | (PowerState::Streaming, Context::Streaming | Context::PoweredOn)
        )
    }
}

impl<B: RegisterIo> Sensor<B> {
    fn enter(&mut self, state: PowerState) {
        for context in Context::ALL {
            self.bank.set_enabled_by_context(context, state.enables(context));
        }
        log::debug!("{}: {:?} -> {:?}", self.description.name, self.state, state);
        self.state = state;
    }

    /// Write the power-up list and enable idle and powered-on controls
    ///
    /// The stored value of every enabled, writable control is then applied
    /// again, so settings made before a power cycle reach the hardware.
    ///
    /// # Errors
    ///
    /// - the first failing power-up write
    /// - the first control that cannot be applied; the sensor stays powered
    pub fn power_on(&mut self) -> Result<()> {
        if self.state != PowerState::Off {
            return Ok(());
        }

        regs::write_list(&mut self.bus, &self.description.powerup_regs)?;
        self.enter(PowerState::PoweredOn);
        self.update_current_mode();

        if self.bank.position(ids::LINK_FREQ).is_some() {
            if let Err(e) = self.select_pll() {
                log::warn!("No PLL at power on: {}", e);
            }
        }

        self.restore_controls()?;

        log::info!("{} powered on", self.description.name);
        Ok(())
    }

    /// Run every enabled, writable control with its stored value
    ///
    /// Link frequency is covered by PLL selection and superseded blanking
    /// controls are left alone.
    fn restore_controls(&mut self) -> Result<()> {
        let mut restored = 0;
        for index in 0..self.bank.len() {
            let Some(instance) = self.bank.get(index) else {
                continue;
            };
            let id = instance.id();
            if !instance.is_ready()
                || !instance.is_enabled()
                || instance.descriptor().is_read_only()
                || id == ids::LINK_FREQ
                || (self.blanking_superseded && matches!(id, ids::HBLANK | ids::VBLANK))
            {
                continue;
            }
            let value = instance.value();
            if let Err(e) = self.apply(index, value) {
                log::error!("Restoring {} = {} failed: {}", id, value, e);
                return Err(e);
            }
            restored += 1;
        }
        log::debug!("{}: {} controls restored", self.description.name, restored);
        Ok(())
    }

    /// Stop streaming if needed and disable every control
    pub fn power_off(&mut self) -> Result<()> {
        let stopped = if self.state == PowerState::Streaming {
            self.stream_off()
        } else {
            Ok(())
        };
        self.enter(PowerState::Off);
        log::info!("{} powered off", self.description.name);
        stopped
    }

    /// Program the selected format, PLL and mode and start streaming
    ///
    /// # Errors
    ///
    /// - [`SensorError::NotPowered`] while powered off
    /// - [`SensorError::NoPllConfiguration`] if no PLL row fits
    /// - the first failing bus write
    pub fn stream_on(&mut self) -> Result<()> {
        match self.state {
            PowerState::Off => return Err(SensorError::NotPowered),
            PowerState::Streaming => return Ok(()),
            PowerState::PoweredOn => {}
        }

        self.update_current_mode();
        let pll = if self.bank.position(ids::LINK_FREQ).is_some() {
            self.select_pll()?
        } else {
            self.pll_index.unwrap_or(0)
        };
        self.pll_index = Some(pll);

        let description = Arc::clone(&self.description);
        let format = description
            .formats
            .get(self.pipeline.format_index)
            .ok_or_else(|| {
                SensorError::InvalidDescription(format!(
                    "format index {} out of range",
                    self.pipeline.format_index
                ))
            })?;
        regs::write_list(&mut self.bus, &format.regs)?;
        regs::write_list(&mut self.bus, &description.plls[pll].regs)?;
        regs::write_list(&mut self.bus, &description.modes[self.current_mode].regs)?;
        regs::write_list(&mut self.bus, &description.streamon_regs)?;

        self.enter(PowerState::Streaming);
        log::info!(
            "{} streaming: mode {}, PLL {}",
            self.description.name,
            self.current_mode,
            pll
        );
        Ok(())
    }

    /// Write the stream-off list and return to the powered-on state
    ///
    /// The state changes even when the write fails.
    pub fn stream_off(&mut self) -> Result<()> {
        if self.state != PowerState::Streaming {
            return Ok(());
        }
        let written = regs::write_list(&mut self.bus, &self.description.streamoff_regs);
        self.enter(PowerState::PoweredOn);
        written.map_err(SensorError::from)
    }

    /// Read the identification registers
    ///
    /// # Returns
    ///
    /// The values as hex, separated by spaces
    pub fn identify(&mut self) -> Result<String> {
        let mut values = Vec::with_capacity(self.description.id_regs.len());
        for reg in &self.description.id_regs {
            if reg.width == RegWidth::Delay {
                continue;
            }
            let value = self.bus.read(None, reg.address, reg.width)?;
            values.push(format!("0x{:0width$X}", value, width = reg.width.bytes() * 2));
        }
        let id = values.join(" ");
        log::info!("{} id: {}", self.description.name, id);
        Ok(id)
    }
}
