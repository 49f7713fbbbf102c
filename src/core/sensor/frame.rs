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

//! Frame descriptors
//!
//! The receiver learns how the frame is laid out on the bus from a list of
//! entries, each evaluated from the description against the live pipeline.

use std::sync::Arc;

use super::{LiveContext, Sensor};
use crate::core::description::{FrameDescFlags, FrameDescType, FrameDescriptor};
use crate::core::error::Result;
use crate::core::expr::OperandSource;
use crate::core::regs::RegisterIo;

/// Entries a receiver accepts at most
pub const MAX_FRAME_DESC_ENTRIES: usize = 4;

/// Size of one frame descriptor entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDescSize {
    /// Blob length in bytes
    Length(u32),
    TwoDim {
        start_line: u32,
        start_pixel: u32,
        width: u32,
        height: u32,
    },
}

/// Virtual channel and data type of a CSI-2 entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csi2Route {
    pub channel: u32,
    pub data_type: u32,
}

/// Evaluated frame descriptor entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescEntry {
    pub flags: FrameDescFlags,
    pub bits_per_pixel: u32,
    pub pixel_code: u32,
    pub size: FrameDescSize,
    /// Only for CSI-2 descriptors
    pub csi2: Option<Csi2Route>,
}

fn evaluate_entry<S: OperandSource + ?Sized>(
    fd: &FrameDescriptor,
    kind: FrameDescType,
    source: &mut S,
) -> Result<FrameDescEntry> {
    let size = if fd.flags.contains(FrameDescFlags::BLOB) {
        FrameDescSize::Length(fd.length.resolve(source)?)
    } else {
        FrameDescSize::TwoDim {
            start_line: fd.start_line.resolve(source)?,
            start_pixel: fd.start_pixel.resolve(source)?,
            width: fd.width.evaluate(0, source)?,
            height: fd.height.evaluate(0, source)?,
        }
    };
    let csi2 = match kind {
        FrameDescType::Csi2 => Some(Csi2Route {
            channel: fd.csi2_channel.resolve(source)?,
            data_type: fd.csi2_data_type.resolve(source)?,
        }),
        FrameDescType::Parallel => None,
    };

    Ok(FrameDescEntry {
        flags: fd.flags,
        bits_per_pixel: fd.bits_per_pixel.resolve(source)?,
        pixel_code: fd.pixel_code.resolve(source)?,
        size,
        csi2,
    })
}

impl<B: RegisterIo> Sensor<B> {
    /// Evaluate the frame descriptor for the current configuration
    ///
    /// Entries past [`MAX_FRAME_DESC_ENTRIES`] are dropped.
    ///
    /// # Errors
    ///
    /// The first failing operand or expression.
    pub fn frame_descriptors(&mut self) -> Result<Vec<FrameDescEntry>> {
        let description = Arc::clone(&self.description);
        let table = &description.frame_desc;
        if table.len() > MAX_FRAME_DESC_ENTRIES {
            log::warn!(
                "{}: {} frame descriptor entries, keeping {}",
                description.name,
                table.len(),
                MAX_FRAME_DESC_ENTRIES
            );
        }

        let mut ctx = LiveContext::new(&self.bank, &self.pipeline, &description, &mut self.bus);
        table
            .iter()
            .take(MAX_FRAME_DESC_ENTRIES)
            .map(|fd| evaluate_entry(fd, description.frame_desc_type, &mut ctx))
            .collect()
    }
}
