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

//! Static sensor description
//!
//! Everything that differs between two sensors lives in a
//! [`SensorDescription`]: the stages, address limits, PLL and mode tables,
//! data formats, flip table, controls and the register lists written at
//! power-up and stream start/stop. One description is shared (behind an
//! `Arc`) by every sensor object of that variant.
//!
//! Descriptions are normally written in TOML:
//!
//! ```toml
//! name = "example"
//! subdevs = [{ stage = "pixel_array", name = "example pixel array" }]
//!
//! [limits]
//! x_addr_max = 1920
//! y_addr_max = 1080
//!
//! [[plls]]
//! input_clk = 24000000
//! op_sys_clk = 400000000
//! bits_per_pixel = 10
//! pixel_rate_pa = 80000000
//! pixel_rate_csi = 80000000
//!
//! [[modes]]
//! width = 1920
//! height = 1080
//! rects = [{ stage = "pixel_array", input = { width = 1920, height = 1080 }, output = { width = 1920, height = 1080 } }]
//!
//! [[formats]]
//! code = 0x300F
//! pixel_order = "rggb"
//! bits_per_pixel = 10
//! ```

use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::controls::{ControlDescriptor, ControlId, Stage};
use super::error::{Result, SensorError};
use super::expr::{Expression, Operand};
use super::pipeline::Rect;
use super::regs::{RegWidth, RegisterValue};

/// Colour filter layout of the first two pixels of the first two lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelOrder {
    Grbg,
    Rggb,
    Bggr,
    Gbrg,
}

bitflags! {
    /// Readout mirroring
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FlipInfo: u8 {
        const HFLIP = 1 << 0;
        const VFLIP = 1 << 1;
    }
}

/// Pixel format the sensor can output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFormat {
    /// Media bus code
    pub code: u32,
    pub pixel_order: PixelOrder,
    pub bits_per_pixel: u8,
    #[serde(default)]
    pub regs: Vec<RegisterValue>,
}

/// Pixel order produced by a flip combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipEntry {
    pub flip: FlipInfo,
    pub pixel_order: PixelOrder,
}

/// Sensor-wide geometry and timing limits (0 = not configured)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorLimits {
    pub x_addr_min: u32,
    pub y_addr_min: u32,
    pub x_addr_max: u32,
    pub y_addr_max: u32,
    pub min_frame_length_lines: u32,
    pub max_frame_length_lines: u32,
    pub min_line_length_pixels: u32,
    pub max_line_length_pixels: u32,
    pub scaler_m_min: u32,
    pub scaler_m_max: u32,
}

/// Required control value for a mode or PLL row to be eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMatch {
    pub control: ControlId,
    pub value: u32,
}

/// Input and output rectangle of one stage in a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRects {
    pub stage: Stage,
    pub input: Rect,
    pub output: Rect,
}

/// One row of the mode table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDescriptor {
    pub width: u32,
    pub height: u32,
    pub rects: Vec<StageRects>,
    #[serde(default = "one")]
    pub binning_horizontal: u8,
    #[serde(default = "one")]
    pub binning_vertical: u8,
    #[serde(default = "one")]
    pub scale_m: u8,
    #[serde(default)]
    pub min_llp: u32,
    #[serde(default)]
    pub max_llp: u32,
    #[serde(default)]
    pub min_fll: u32,
    #[serde(default)]
    pub max_fll: u32,
    #[serde(default)]
    pub matches: Vec<ControlMatch>,
    #[serde(default)]
    pub regs: Vec<RegisterValue>,
}

impl Default for ModeDescriptor {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            rects: Vec::new(),
            binning_horizontal: 1,
            binning_vertical: 1,
            scale_m: 1,
            min_llp: 0,
            max_llp: 0,
            min_fll: 0,
            max_fll: 0,
            matches: Vec::new(),
            regs: Vec::new(),
        }
    }
}

impl ModeDescriptor {
    pub fn rects_for(&self, stage: Stage) -> Option<&StageRects> {
        self.rects.iter().find(|r| r.stage == stage)
    }
}

fn one() -> u8 {
    1
}

/// One row of the PLL table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PllDescriptor {
    /// External clock in Hz
    pub input_clk: u64,
    /// Link frequency in Hz
    pub op_sys_clk: u64,
    pub bits_per_pixel: u8,
    /// 0 matches any lane count
    #[serde(default)]
    pub csi_lanes: u8,
    pub pixel_rate_pa: u64,
    pub pixel_rate_csi: u64,
    #[serde(default)]
    pub matches: Vec<ControlMatch>,
    #[serde(default)]
    pub regs: Vec<RegisterValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdevConfig {
    pub stage: Stage,
    pub name: String,
}

/// Register read back by sensor identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRegister {
    pub address: u16,
    pub width: RegWidth,
}

bitflags! {
    /// Frame descriptor entry flags, as seen by the receiver
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FrameDescFlags: u16 {
        /// `length` is an upper bound, not the exact size
        const LENGTH_MAX = 1 << 0;
        /// Unstructured data sized by `length` instead of lines and pixels
        const BLOB = 1 << 1;
    }
}

/// Bus the frame descriptor describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDescType {
    Parallel,
    #[default]
    Csi2,
}

fn zero() -> Operand {
    Operand::Constant(0)
}

/// One stream in the frame sent to the receiver
///
/// Scalar fields are single operands; width and height are full
/// expressions evaluated from 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    #[serde(default)]
    pub flags: FrameDescFlags,
    pub bits_per_pixel: Operand,
    pub pixel_code: Operand,
    /// Size in bytes of a blob entry
    #[serde(default = "zero")]
    pub length: Operand,
    #[serde(default = "zero")]
    pub start_line: Operand,
    #[serde(default = "zero")]
    pub start_pixel: Operand,
    #[serde(default)]
    pub width: Expression,
    #[serde(default)]
    pub height: Expression,
    #[serde(default = "zero")]
    pub csi2_channel: Operand,
    #[serde(default = "zero")]
    pub csi2_data_type: Operand,
}

/// Complete static description of a sensor variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDescription {
    pub name: String,
    pub subdevs: Vec<SubdevConfig>,
    #[serde(default)]
    pub limits: SensorLimits,
    pub plls: Vec<PllDescriptor>,
    pub modes: Vec<ModeDescriptor>,
    /// Mode used when nothing in the table matches
    #[serde(default)]
    pub fail_safe_mode: usize,
    pub formats: Vec<DataFormat>,
    #[serde(default)]
    pub default_format: usize,
    #[serde(default)]
    pub flips: Vec<FlipEntry>,
    #[serde(default)]
    pub controls: Vec<ControlDescriptor>,
    #[serde(default)]
    pub powerup_regs: Vec<RegisterValue>,
    #[serde(default)]
    pub streamon_regs: Vec<RegisterValue>,
    #[serde(default)]
    pub streamoff_regs: Vec<RegisterValue>,
    #[serde(default)]
    pub id_regs: Vec<IdRegister>,
    #[serde(default)]
    pub frame_desc_type: FrameDescType,
    #[serde(default)]
    pub frame_desc: Vec<FrameDescriptor>,
}

impl SensorDescription {
    /// Parse and validate a TOML description
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let description: Self = toml::from_str(text)?;
        description.validate()?;
        Ok(description)
    }

    /// Parse and validate a JSON description
    pub fn from_json_str(text: &str) -> Result<Self> {
        let description: Self = serde_json::from_str(text)?;
        description.validate()?;
        Ok(description)
    }

    /// Load a description file
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as TOML.
    ///
    /// # Errors
    ///
    /// I/O, parse or validation errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let description = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            _ => Self::from_toml_str(&contents)?,
        };
        log::info!(
            "Loaded sensor description '{}' from {}",
            description.name,
            path.display()
        );
        Ok(description)
    }

    /// Save as TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check cross-table references
    ///
    /// # Errors
    ///
    /// [`SensorError::InvalidDescription`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SensorError::InvalidDescription(msg));

        if self.subdevs.is_empty() {
            return invalid(format!("{}: no subdevices", self.name));
        }
        if !self.has_stage(Stage::PixelArray) {
            return invalid(format!("{}: no pixel array subdevice", self.name));
        }
        for (i, subdev) in self.subdevs.iter().enumerate() {
            if self.subdevs[..i].iter().any(|s| s.stage == subdev.stage) {
                return invalid(format!("{}: duplicate {:?} subdevice", self.name, subdev.stage));
            }
        }
        if self.plls.is_empty() {
            return invalid(format!("{}: no PLL configurations", self.name));
        }
        if self.fail_safe_mode >= self.modes.len() {
            return invalid(format!(
                "{}: fail-safe mode {} outside mode table of {}",
                self.name,
                self.fail_safe_mode,
                self.modes.len()
            ));
        }
        if self.default_format >= self.formats.len() {
            return invalid(format!(
                "{}: default format {} outside format table of {}",
                self.name,
                self.default_format,
                self.formats.len()
            ));
        }
        Ok(())
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.subdevs.iter().any(|s| s.stage == stage)
    }

    /// Present stages in pipeline order
    pub fn stages(&self) -> Vec<Stage> {
        [Stage::PixelArray, Stage::Binner, Stage::Scaler]
            .into_iter()
            .filter(|&s| self.has_stage(s))
            .collect()
    }

    /// Index of the format with media bus code `code`
    pub fn format_index(&self, code: u32) -> Option<usize> {
        self.formats.iter().position(|f| f.code == code)
    }
}
