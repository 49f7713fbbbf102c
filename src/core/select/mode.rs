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

//! Mode selection
//!
//! Sensors without a mode-select control pick their mode from the live
//! geometry ([`ModeStrategy::ByGeometry`]). Sensors with one take the mode
//! the user asked for and push its geometry into the pipeline
//! ([`ModeStrategy::ByIndex`]).
//!
//! Once a mode is chosen the blanking bounds follow from its line and frame
//! length limits:
//!
//! ```text
//! min_llp = mode.min_llp || limits.min_line_length_pixels || width
//! max_llp = mode.max_llp || limits.max_line_length_pixels || 0xFFFF
//! hblank  = [min_llp - width, max_llp - width], default min
//! ```
//!
//! and likewise for vertical blanking with frame lengths and height.

use super::controls_match;
use crate::core::controls::ControlId;
use crate::core::description::{ModeDescriptor, SensorLimits};
use crate::core::error::Result;
use crate::core::pipeline::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStrategy {
    ByGeometry,
    ByIndex,
}

/// First mode matching the live geometry
///
/// `None` means the caller falls back to the fail-safe mode.
pub fn select_by_geometry<F>(
    modes: &[ModeDescriptor],
    pipeline: &PipelineState,
    check_controls: bool,
    value_of: F,
) -> Option<usize>
where
    F: Fn(ControlId) -> Result<u32>,
{
    modes.iter().position(|mode| {
        pipeline.matches_mode(mode)
            && (!check_controls || mode.matches.is_empty() || controls_match(&mode.matches, &value_of))
    })
}

/// Mode chosen by a mode-select control value, if it names a table row
pub fn select_by_index(modes: &[ModeDescriptor], value: i64) -> Option<usize> {
    usize::try_from(value).ok().filter(|&i| i < modes.len())
}

/// Bounds for a blanking control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankingBounds {
    pub min: i64,
    pub max: i64,
}

fn first_nonzero(values: &[u32], fallback: u32) -> u32 {
    values.iter().copied().find(|&v| v != 0).unwrap_or(fallback)
}

/// Horizontal and vertical blanking bounds for `mode` at the given size
///
/// `width` and `height` are the pixel array output.
pub fn frame_blanking_bounds(
    mode: &ModeDescriptor,
    limits: &SensorLimits,
    width: u32,
    height: u32,
) -> (BlankingBounds, BlankingBounds) {
    let min_llp = first_nonzero(&[mode.min_llp, limits.min_line_length_pixels], width);
    let max_llp = first_nonzero(
        &[mode.max_llp, limits.max_line_length_pixels],
        u32::from(u16::MAX),
    );
    let min_fll = first_nonzero(&[mode.min_fll, limits.min_frame_length_lines], height);
    let max_fll = first_nonzero(
        &[mode.max_fll, limits.max_frame_length_lines],
        u32::from(u16::MAX),
    );

    let w = i64::from(width);
    let h = i64::from(height);
    (
        BlankingBounds {
            min: i64::from(min_llp) - w,
            max: i64::from(max_llp) - w,
        },
        BlankingBounds {
            min: i64::from(min_fll) - h,
            max: i64::from(max_fll) - h,
        },
    )
}
