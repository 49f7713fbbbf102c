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

//! Sensor test fixtures
//!
//! The fixture sensor is a pixel-array-only device with two modes
//! (3840x2160 fail-safe, 1280x720), three PLL rows and four 10-bit Bayer
//! formats plus one 12-bit one.

mod set_control;

use std::sync::Arc;

use super::Sensor;
use crate::core::controls::{
    ids, Context, ControlDescriptor, ControlFlags, ControlId, ControlKind, Direction, Impact, Stage,
};
use crate::core::dependency::{Action, ActionRule, Condition, DependencyProvision, Phase};
use crate::core::description::{
    ControlMatch, DataFormat, FlipEntry, FlipInfo, FrameDescType, IdRegister, ModeDescriptor,
    PixelOrder, PllDescriptor, SensorDescription, SensorLimits, StageRects, SubdevConfig,
};
use crate::core::expr::{ArithOp, Expression, Operand, Operation};
use crate::core::pipeline::Rect;
use crate::core::platform::PlatformConfig;
use crate::core::program::{DynamicWrite, RegisterProgram};
use crate::core::regs::{MemoryBus, RegWidth, RegisterValue, WriteFlags};

pub(super) const TEMPERATURE: ControlId = ControlId(0x0098_1910);

pub(super) const SGRBG10: u32 = 0x300A;
pub(super) const SRGGB10: u32 = 0x300F;
pub(super) const SBGGR10: u32 = 0x3007;
pub(super) const SGBRG10: u32 = 0x300E;
pub(super) const SGRBG12: u32 = 0x3011;

pub(super) fn write(address: u16, width: RegWidth, ops: Vec<Operation>) -> DynamicWrite {
    DynamicWrite::new(address, width, Expression::new(ops))
}

fn rmw(address: u16, mask: u32, ops: Vec<Operation>) -> DynamicWrite {
    DynamicWrite {
        flags: WriteFlags::READ_MODIFY_WRITE,
        mask,
        ..write(address, RegWidth::Bits8, ops)
    }
}

pub(super) fn control(id: ControlId, name: &str, min: i64, max: i64, writes: Vec<DynamicWrite>) -> ControlDescriptor {
    ControlDescriptor::integer(id, name, min, max, RegisterProgram::new(writes))
}

fn controls() -> Vec<ControlDescriptor> {
    let mut exposure = control(
        ids::EXPOSURE,
        "Exposure",
        1,
        65535,
        vec![
            write(0x0202, RegWidth::Bits8, vec![Operation::constant(ArithOp::RightShift, 8)]),
            write(0x0203, RegWidth::Bits8, vec![Operation::constant(ArithOp::And, 0xFF)]),
        ],
    );
    exposure.dependencies = vec![DependencyProvision {
        control: ids::VBLANK,
        phase: Phase::DependentControl,
        rules: vec![ActionRule {
            when: Condition::Greater,
            action: Action::Subtract,
            value: 0,
        }],
    }];

    let mut analogue_gain = control(
        ids::ANALOGUE_GAIN,
        "Analogue Gain",
        0,
        255,
        vec![write(0x0205, RegWidth::Bits8, vec![])],
    );
    analogue_gain.dependencies = vec![DependencyProvision {
        control: ids::EXPOSURE,
        phase: Phase::SelfControl,
        rules: vec![ActionRule {
            when: Condition::Greater,
            action: Action::Add,
            value: 0,
        }],
    }];

    let mut digital_gain = control(
        ids::DIGITAL_GAIN,
        "Digital Gain",
        0,
        0xFFFF,
        vec![write(0x020E, RegWidth::Bits16, vec![])],
    );
    digital_gain.kind = ControlKind::Integer64 {
        min: 0,
        max: 0xFFFF,
        step: 1,
        default: 0x100,
    };

    let link_freq = ControlDescriptor {
        context: Context::Idle,
        kind: ControlKind::IntegerMenu {
            menu: vec![720_000_000, 360_000_000, 180_000_000],
            default: 0,
        },
        ..control(ids::LINK_FREQ, "Link Frequency", 0, 0, vec![])
    };

    let pixel_rate = ControlDescriptor {
        direction: Direction::Get,
        flags: ControlFlags::READ_ONLY,
        ..control(ids::PIXEL_RATE, "Pixel Rate", 0, i64::from(i32::MAX), vec![])
    };

    let test_pattern = ControlDescriptor {
        context: Context::Streaming,
        kind: ControlKind::StringMenu {
            items: vec!["off".to_string(), "solid".to_string(), "bars".to_string()],
            default: 0,
        },
        flags: ControlFlags::WRITE_ONLY,
        impact: Impact::PLL_SELECTION,
        ..control(
            ids::TEST_PATTERN,
            "Test Pattern",
            0,
            2,
            vec![write(0x0601, RegWidth::Bits8, vec![])],
        )
    };

    let temperature = ControlDescriptor {
        direction: Direction::Get,
        flags: ControlFlags::READ_ONLY,
        kind: ControlKind::Custom {
            min: 0,
            max: 255,
            step: 1,
            default: 0,
        },
        ..control(
            TEMPERATURE,
            "Temperature",
            0,
            255,
            vec![
                write(
                    0x013A,
                    RegWidth::Bits8,
                    vec![Operation::new(ArithOp::Assign, Operand::Register(0x013A))],
                ),
                write(
                    0x013B,
                    RegWidth::Bits8,
                    vec![Operation::new(ArithOp::Assign, Operand::Register(0x013B))],
                ),
            ],
        )
    };

    vec![
        exposure,
        analogue_gain,
        digital_gain,
        control(ids::HBLANK, "Horizontal Blanking", 0, 65535, vec![write(0x0342, RegWidth::Bits16, vec![])]),
        control(ids::VBLANK, "Vertical Blanking", 0, 65535, vec![write(0x0340, RegWidth::Bits16, vec![])]),
        control(ids::HFLIP, "Horizontal Flip", 0, 1, vec![rmw(0x0101, 0x01, vec![])]),
        control(
            ids::VFLIP,
            "Vertical Flip",
            0,
            1,
            vec![rmw(0x0101, 0x02, vec![Operation::constant(ArithOp::LeftShift, 1)])],
        ),
        link_freq,
        pixel_rate,
        test_pattern,
        temperature,
    ]
}

fn mode(width: u32, height: u32, min_fll: u32, tag: u32) -> ModeDescriptor {
    ModeDescriptor {
        width,
        height,
        rects: vec![StageRects {
            stage: Stage::PixelArray,
            input: Rect::sized(3840, 2160),
            output: Rect::sized(width, height),
        }],
        min_fll,
        regs: vec![RegisterValue::new(0x0220, RegWidth::Bits8, tag)],
        ..Default::default()
    }
}

fn pll(op_sys_clk: u64, lanes: u8, pixel_rate: u64, tag: u32) -> PllDescriptor {
    PllDescriptor {
        input_clk: 24_000_000,
        op_sys_clk,
        bits_per_pixel: 10,
        csi_lanes: lanes,
        pixel_rate_pa: pixel_rate,
        pixel_rate_csi: pixel_rate,
        matches: Vec::new(),
        regs: vec![RegisterValue::new(0x0301, RegWidth::Bits8, tag)],
    }
}

fn format(code: u32, pixel_order: PixelOrder, bits_per_pixel: u8) -> DataFormat {
    DataFormat {
        code,
        pixel_order,
        bits_per_pixel,
        regs: vec![RegisterValue::new(
            0x0112,
            RegWidth::Bits16,
            (u32::from(bits_per_pixel) << 8) | u32::from(bits_per_pixel),
        )],
    }
}

/// The fixture sensor
pub(super) fn description() -> SensorDescription {
    let mut gated = pll(720_000_000, 4, 288_000_000, 5);
    gated.matches = vec![ControlMatch {
        control: ids::TEST_PATTERN,
        value: 0,
    }];

    SensorDescription {
        name: "fixture".to_string(),
        subdevs: vec![SubdevConfig {
            stage: Stage::PixelArray,
            name: "fixture pixel array".to_string(),
        }],
        limits: SensorLimits {
            x_addr_max: 3840,
            y_addr_max: 2160,
            min_line_length_pixels: 6224,
            max_line_length_pixels: 32752,
            max_frame_length_lines: 65535,
            ..Default::default()
        },
        plls: vec![
            gated,
            pll(720_000_000, 0, 200_000_000, 6),
            pll(360_000_000, 0, 144_000_000, 7),
        ],
        modes: vec![mode(3840, 2160, 2250, 0x10), mode(1280, 720, 800, 0x11)],
        fail_safe_mode: 0,
        formats: vec![
            format(SGRBG10, PixelOrder::Grbg, 10),
            format(SRGGB10, PixelOrder::Rggb, 10),
            format(SBGGR10, PixelOrder::Bggr, 10),
            format(SGBRG10, PixelOrder::Gbrg, 10),
            format(SGRBG12, PixelOrder::Grbg, 12),
        ],
        default_format: 0,
        flips: vec![
            FlipEntry {
                flip: FlipInfo::empty(),
                pixel_order: PixelOrder::Grbg,
            },
            FlipEntry {
                flip: FlipInfo::HFLIP,
                pixel_order: PixelOrder::Rggb,
            },
            FlipEntry {
                flip: FlipInfo::VFLIP,
                pixel_order: PixelOrder::Bggr,
            },
            FlipEntry {
                flip: FlipInfo::HFLIP | FlipInfo::VFLIP,
                pixel_order: PixelOrder::Gbrg,
            },
        ],
        controls: controls(),
        powerup_regs: vec![
            RegisterValue::new(0x0103, RegWidth::Bits8, 1),
            RegisterValue::delay(5),
        ],
        streamon_regs: vec![RegisterValue::new(0x0100, RegWidth::Bits8, 1)],
        streamoff_regs: vec![RegisterValue::new(0x0100, RegWidth::Bits8, 0)],
        id_regs: vec![
            IdRegister {
                address: 0x0016,
                width: RegWidth::Bits16,
            },
            IdRegister {
                address: 0x0018,
                width: RegWidth::Bits8,
            },
        ],
        frame_desc_type: FrameDescType::Csi2,
        frame_desc: Vec::new(),
    }
}

/// Fixture with frame and line length controls replacing blanking
pub(super) fn frame_size_description() -> SensorDescription {
    let mut d = description();
    d.modes[0].min_llp = 4400;
    d.controls.push(control(
        ids::LINE_LENGTH_PIXELS,
        "Line Length Pixels",
        0,
        65535,
        vec![write(0x0342, RegWidth::Bits16, vec![])],
    ));
    d.controls.push(control(
        ids::FRAME_LENGTH_LINES,
        "Frame Length Lines",
        0,
        65535,
        vec![write(0x0340, RegWidth::Bits16, vec![])],
    ));
    d
}

/// Fixture whose mode is picked by a mode-select control
pub(super) fn mode_select_description() -> SensorDescription {
    let mut d = description();
    d.modes[1].matches = vec![ControlMatch {
        control: ids::PIXEL_RATE,
        value: 144_000_000,
    }];
    d.controls.push(control(ids::SENSOR_MODE, "Sensor Mode", 0, 3, vec![]));
    d
}

pub(super) fn sensor(description: SensorDescription) -> Sensor<MemoryBus> {
    let _ = env_logger::builder().is_test(true).try_init();
    Sensor::new(Arc::new(description), PlatformConfig::default(), MemoryBus::new()).unwrap()
}

/// Powered-on sensor with an empty bus log
pub(super) fn powered(description: SensorDescription) -> Sensor<MemoryBus> {
    let mut s = sensor(description);
    s.power_on().unwrap();
    s.bus_mut().clear_log();
    s
}
