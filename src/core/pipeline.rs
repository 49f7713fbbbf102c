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

//! Live pipeline geometry
//!
//! A sensor is modelled as up to three stages. The pixel array is always
//! present; binner and scaler are optional. The last present stage is the
//! source stage whose output is what the sensor emits.
//!
//! ```text
//! ┌─────────────┐  source_crop  ┌─────────┐ source_crop ┌─────────┐
//! │ pixel array │ ────────────▶ │ binner  │ ──────────▶ │ scaler  │ ──▶ out
//! └─────────────┘               └─────────┘             └─────────┘
//!                    sink_crop ─┘  compose   sink_crop ─┘  compose
//! ```

use serde::{Deserialize, Serialize};

use super::controls::Stage;
use super::description::{FlipInfo, ModeDescriptor, SensorLimits};

/// Rectangle in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    #[serde(default)]
    pub left: i32,
    #[serde(default)]
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Rectangles of one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageState {
    pub sink_format: Rect,
    pub sink_crop: Rect,
    pub source_crop: Rect,
    pub compose: Rect,
}

impl StageState {
    fn full(width: u32, height: u32) -> Self {
        let r = Rect::sized(width, height);
        Self {
            sink_format: r,
            sink_crop: r,
            source_crop: r,
            compose: r,
        }
    }
}

/// Geometry and format state consumed by the mode and PLL selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    pub pixel_array: StageState,
    pub binner: Option<StageState>,
    pub scaler: Option<StageState>,
    pub binning_horizontal: u8,
    pub binning_vertical: u8,
    pub scale_m: u8,
    /// Index into the description's format table
    pub format_index: usize,
    pub flip: FlipInfo,
}

impl PipelineState {
    /// Every present stage covers the full pixel array
    pub fn new(stages: &[Stage], limits: &SensorLimits, format_index: usize) -> Self {
        let full = StageState::full(limits.x_addr_max, limits.y_addr_max);
        Self {
            pixel_array: full,
            binner: stages.contains(&Stage::Binner).then_some(full),
            scaler: stages.contains(&Stage::Scaler).then_some(full),
            binning_horizontal: 1,
            binning_vertical: 1,
            scale_m: 1,
            format_index,
            flip: FlipInfo::empty(),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageState> {
        match stage {
            Stage::PixelArray => Some(&self.pixel_array),
            Stage::Binner => self.binner.as_ref(),
            Stage::Scaler => self.scaler.as_ref(),
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> Option<&mut StageState> {
        match stage {
            Stage::PixelArray => Some(&mut self.pixel_array),
            Stage::Binner => self.binner.as_mut(),
            Stage::Scaler => self.scaler.as_mut(),
        }
    }

    /// Last present stage
    pub fn source_stage(&self) -> Stage {
        if self.scaler.is_some() {
            Stage::Scaler
        } else if self.binner.is_some() {
            Stage::Binner
        } else {
            Stage::PixelArray
        }
    }

    pub fn source(&self) -> &StageState {
        self.scaler
            .as_ref()
            .or(self.binner.as_ref())
            .unwrap_or(&self.pixel_array)
    }

    pub fn source_mut(&mut self) -> &mut StageState {
        match (&mut self.scaler, &mut self.binner) {
            (Some(scaler), _) => scaler,
            (None, Some(binner)) => binner,
            (None, None) => &mut self.pixel_array,
        }
    }

    /// Size of the image leaving the sensor
    pub fn output_size(&self) -> (u32, u32) {
        let crop = self.source().source_crop;
        (crop.width, crop.height)
    }

    /// Whether the live geometry equals `mode` on every present stage
    ///
    /// Control match lists are not considered here.
    pub fn matches_mode(&self, mode: &ModeDescriptor) -> bool {
        if self.output_size() != (mode.width, mode.height) {
            return false;
        }

        let Some(pa) = mode.rects_for(Stage::PixelArray) else {
            return false;
        };
        if self.pixel_array.source_crop != pa.output {
            return false;
        }

        if let Some(binner) = &self.binner {
            if self.binning_horizontal != mode.binning_horizontal
                || self.binning_vertical != mode.binning_vertical
            {
                return false;
            }
            match mode.rects_for(Stage::Binner) {
                Some(r) if binner.sink_crop == r.input && binner.source_crop == r.output => {}
                _ => return false,
            }
        }

        if let Some(scaler) = &self.scaler {
            if self.scale_m != mode.scale_m {
                return false;
            }
            match mode.rects_for(Stage::Scaler) {
                Some(r) if scaler.sink_crop == r.input && scaler.source_crop == r.output => {}
                _ => return false,
            }
        }

        true
    }

    /// Write the rectangles and factors of `mode` into the live state
    pub fn apply_mode(&mut self, mode: &ModeDescriptor) {
        if let Some(pa) = mode.rects_for(Stage::PixelArray) {
            self.pixel_array.source_crop = pa.output;
        }

        if let (Some(binner), Some(r)) = (self.binner.as_mut(), mode.rects_for(Stage::Binner)) {
            binner.sink_format = r.input;
            binner.sink_crop = r.input;
            binner.source_crop = r.output;
            self.binning_horizontal = mode.binning_horizontal;
            self.binning_vertical = mode.binning_vertical;
            if mode.binning_vertical > 1 {
                binner.compose = r.output;
            }
        }

        if let (Some(scaler), Some(r)) = (self.scaler.as_mut(), mode.rects_for(Stage::Scaler)) {
            scaler.sink_format = r.input;
            scaler.sink_crop = r.input;
            scaler.source_crop = r.output;
            self.scale_m = mode.scale_m;
            if mode.scale_m != 1 {
                scaler.compose = r.output;
            }
        }

        let src = self.source_mut();
        src.source_crop.width = mode.width;
        src.source_crop.height = mode.height;
    }
}
