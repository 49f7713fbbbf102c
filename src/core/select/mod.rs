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

//! Table selectors
//!
//! Both selectors walk their table in order and take the first row whose
//! predicates all hold; table order is the only tie-break. They are pure:
//! the sensor feeds them live state and applies the result.

mod mode;
mod pll;

pub use mode::{
    frame_blanking_bounds, select_by_geometry, select_by_index, BlankingBounds, ModeStrategy,
};
pub use pll::{select_pll, PllRequest};

use super::controls::ControlId;
use super::description::ControlMatch;
use super::error::Result;

/// Whether every `(control, value)` pair holds
///
/// A control that cannot be read makes the row ineligible.
pub fn controls_match<F>(matches: &[ControlMatch], value_of: F) -> bool
where
    F: Fn(ControlId) -> Result<u32>,
{
    matches.iter().all(|m| match value_of(m.control) {
        Ok(value) if value == m.value => true,
        Ok(value) => {
            log::debug!("{}: {} != {}", m.control, value, m.value);
            false
        }
        Err(e) => {
            log::debug!("{}: {}", m.control, e);
            false
        }
    })
}
