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

//! Well-known control ids
//!
//! Standard ids use the V4L2 numbering so descriptions can be shared with
//! existing sensor tables. Sensor-private ids live in their own class.
//!
//! ## Id Classes
//!
//! ```text
//! 0x0098_09xx  user class          exposure, gain, flips
//! 0x009E_09xx  image source class  blanking, analogue gain
//! 0x009F_09xx  image proc class    link frequency, pixel rate
//! 0x0098_19xx  sensor-private      frame/line length, mode select
//! ```

use super::ControlId;

const USER_BASE: u32 = 0x0098_0900;
const IMAGE_SOURCE_BASE: u32 = 0x009E_0900;
const IMAGE_PROC_BASE: u32 = 0x009F_0900;
const PRIVATE_BASE: u32 = 0x0098_1900;

pub const EXPOSURE: ControlId = ControlId(USER_BASE + 17);
pub const GAIN: ControlId = ControlId(USER_BASE + 19);
pub const HFLIP: ControlId = ControlId(USER_BASE + 20);
pub const VFLIP: ControlId = ControlId(USER_BASE + 21);

pub const VBLANK: ControlId = ControlId(IMAGE_SOURCE_BASE + 1);
pub const HBLANK: ControlId = ControlId(IMAGE_SOURCE_BASE + 2);
pub const ANALOGUE_GAIN: ControlId = ControlId(IMAGE_SOURCE_BASE + 3);

pub const LINK_FREQ: ControlId = ControlId(IMAGE_PROC_BASE + 1);
pub const PIXEL_RATE: ControlId = ControlId(IMAGE_PROC_BASE + 2);
pub const TEST_PATTERN: ControlId = ControlId(IMAGE_PROC_BASE + 3);

pub const FRAME_LENGTH_LINES: ControlId = ControlId(PRIVATE_BASE + 1);
pub const LINE_LENGTH_PIXELS: ControlId = ControlId(PRIVATE_BASE + 2);
pub const SENSOR_MODE: ControlId = ControlId(PRIVATE_BASE + 3);
pub const DIGITAL_GAIN: ControlId = ControlId(PRIVATE_BASE + 4);

const NAMES: &[(&str, ControlId)] = &[
    ("exposure", EXPOSURE),
    ("gain", GAIN),
    ("hflip", HFLIP),
    ("vflip", VFLIP),
    ("vblank", VBLANK),
    ("hblank", HBLANK),
    ("analogue_gain", ANALOGUE_GAIN),
    ("link_freq", LINK_FREQ),
    ("pixel_rate", PIXEL_RATE),
    ("test_pattern", TEST_PATTERN),
    ("frame_length_lines", FRAME_LENGTH_LINES),
    ("line_length_pixels", LINE_LENGTH_PIXELS),
    ("sensor_mode", SENSOR_MODE),
    ("digital_gain", DIGITAL_GAIN),
];

/// Look up a well-known id by its short name
pub fn from_name(name: &str) -> Option<ControlId> {
    NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, id)| id)
}

/// Short name of a well-known id
pub fn name_of(id: ControlId) -> Option<&'static str> {
    NAMES.iter().find(|&&(_, i)| i == id).map(|&(n, _)| n)
}
