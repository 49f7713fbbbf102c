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

//! Board-level parameters of one sensor instance

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::Result;

/// External clock and CSI-2 lane count wired to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// External clock in Hz
    pub ext_clk: u64,
    pub lanes: u8,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            ext_clk: 24_000_000,
            lanes: 4,
        }
    }
}

impl PlatformConfig {
    /// Load from a TOML file, falling back to defaults when it is missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "Platform config {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: PlatformConfig = toml::from_str("lanes = 2").unwrap();
        assert_eq!(cfg.lanes, 2);
        assert_eq!(cfg.ext_clk, 24_000_000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PlatformConfig::load(dir.path().join("platform.toml")).unwrap();
        assert_eq!(cfg, PlatformConfig::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("platform.toml");
        std::fs::write(&path, "ext_clk = 19200000\nlanes = 2\n").unwrap();

        let cfg = PlatformConfig::load(&path).unwrap();
        assert_eq!(
            cfg,
            PlatformConfig {
                ext_clk: 19_200_000,
                lanes: 2
            }
        );
    }
}
