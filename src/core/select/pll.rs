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

//! PLL selection
//!
//! A row is eligible when:
//!
//! ```text
//! op_sys_clk     == requested link frequency
//! input_clk      == platform external clock
//! csi_lanes      == platform lanes, or csi_lanes == 0
//! bits_per_pixel == current format depth
//! matches        hold (only once a PLL-impacting control was set)
//! ```

use super::controls_match;
use crate::core::controls::ControlId;
use crate::core::description::PllDescriptor;
use crate::core::error::Result;

/// Live inputs to PLL selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllRequest {
    /// Link frequency in Hz, already resolved from the menu
    pub link_freq: u64,
    pub ext_clk: u64,
    pub lanes: u8,
    pub bits_per_pixel: u8,
    /// Whether row match lists are checked
    pub check_controls: bool,
}

/// Index of the first eligible PLL row
pub fn select_pll<F>(plls: &[PllDescriptor], request: &PllRequest, value_of: F) -> Option<usize>
where
    F: Fn(ControlId) -> Result<u32>,
{
    let index = plls.iter().position(|pll| {
        pll.op_sys_clk == request.link_freq
            && pll.input_clk == request.ext_clk
            && (pll.csi_lanes == 0 || pll.csi_lanes == request.lanes)
            && pll.bits_per_pixel == request.bits_per_pixel
            && (!request.check_controls
                || pll.matches.is_empty()
                || controls_match(&pll.matches, &value_of))
    });

    match index {
        Some(i) => log::debug!("PLL {} selected for {} Hz", i, request.link_freq),
        None => log::debug!("No PLL for {} Hz", request.link_freq),
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controls::ids;
    use crate::core::description::ControlMatch;
    use crate::core::error::SensorError;

    fn pll(op_sys_clk: u64, lanes: u8, bpp: u8) -> PllDescriptor {
        PllDescriptor {
            input_clk: 24_000_000,
            op_sys_clk,
            bits_per_pixel: bpp,
            csi_lanes: lanes,
            pixel_rate_pa: 72_000_000,
            pixel_rate_csi: 72_000_000,
            matches: Vec::new(),
            regs: Vec::new(),
        }
    }

    fn request(lanes: u8) -> PllRequest {
        PllRequest {
            link_freq: 720_000_000,
            ext_clk: 24_000_000,
            lanes,
            bits_per_pixel: 10,
            check_controls: false,
        }
    }

    fn no_controls(id: ControlId) -> Result<u32> {
        Err(SensorError::NotFound { id })
    }

    #[test]
    fn test_exact_lane_row_first_wins() {
        let plls = [pll(720_000_000, 4, 10), pll(720_000_000, 0, 10)];
        assert_eq!(select_pll(&plls, &request(4), no_controls), Some(0));
    }

    #[test]
    fn test_table_order_is_the_only_tie_break() {
        let plls = [pll(720_000_000, 0, 10), pll(720_000_000, 4, 10)];
        assert_eq!(select_pll(&plls, &request(4), no_controls), Some(0));
    }

    #[test]
    fn test_lane_mismatch_falls_to_wildcard() {
        let plls = [pll(720_000_000, 4, 10), pll(720_000_000, 0, 10)];
        assert_eq!(select_pll(&plls, &request(2), no_controls), Some(1));
    }

    #[test]
    fn test_depth_clock_and_frequency_must_match() {
        let plls = [pll(720_000_000, 0, 12), pll(360_000_000, 0, 10)];
        assert_eq!(select_pll(&plls, &request(4), no_controls), None);

        let mut other_clock = pll(720_000_000, 0, 10);
        other_clock.input_clk = 19_200_000;
        assert_eq!(select_pll(&[other_clock], &request(4), no_controls), None);
    }

    #[test]
    fn test_match_list_only_checked_when_armed() {
        let mut gated = pll(720_000_000, 0, 10);
        gated.matches = vec![ControlMatch {
            control: ids::TEST_PATTERN,
            value: 1,
        }];
        let plls = [gated, pll(720_000_000, 0, 10)];
        let pattern_off = |id: ControlId| {
            if id == ids::TEST_PATTERN {
                Ok(0)
            } else {
                Err(SensorError::NotFound { id })
            }
        };

        assert_eq!(select_pll(&plls, &request(4), pattern_off), Some(0));

        let armed = PllRequest {
            check_controls: true,
            ..request(4)
        };
        assert_eq!(select_pll(&plls, &armed, pattern_off), Some(1));
    }
}
