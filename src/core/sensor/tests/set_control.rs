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

//! Unit tests for control set and get

use super::{control, description, frame_size_description, powered, sensor, write, TEMPERATURE};
use crate::core::controls::{ids, ControlDescriptor, ControlFlags, ControlId, ControlKind, Stage};
use crate::core::dependency::{Action, ActionRule, Condition, DependencyProvision, Phase};
use crate::core::error::SensorError;
use crate::core::expr::{ArithOp, Operand, Operation};
use crate::core::regs::{BusError, RegWidth};

#[test]
fn test_set_writes_register_program() {
    let mut s = powered(description());

    s.set_control(ids::EXPOSURE, 0x0465).unwrap();

    assert_eq!(s.bus().value(0x0202), Some(0x04));
    assert_eq!(s.bus().value(0x0203), Some(0x65));
    assert_eq!(s.get_control(ids::EXPOSURE).unwrap(), 0x0465);
}

#[test]
fn test_dependent_control_runs_after_primary() {
    let mut s = powered(description());

    // VBlank is 0, so exposure is Greater and VBlank gets exposure - 0
    s.set_control(ids::EXPOSURE, 3000).unwrap();

    assert_eq!(s.bus().written_addresses(), vec![0x0202, 0x0203, 0x0340]);
    assert_eq!(s.bus().writes_to(0x0340), vec![3000]);
    // Only the program ran; the stored VBlank value is untouched
    assert_eq!(s.get_control(ids::VBLANK).unwrap(), 0);
}

#[test]
fn test_dependent_rule_not_matching_writes_nothing() {
    let mut s = powered(description());
    s.set_control(ids::VBLANK, 500).unwrap();
    s.bus_mut().clear_log();

    s.set_control(ids::EXPOSURE, 10).unwrap();

    assert_eq!(s.bus().written_addresses(), vec![0x0202, 0x0203]);
}

#[test]
fn test_dependent_pass_skipped_when_primary_fails() {
    let mut s = powered(description());
    s.bus_mut().inject_fault(0x0202);

    let result = s.set_control(ids::EXPOSURE, 3000);

    assert!(matches!(
        result,
        Err(SensorError::Io(BusError::Nack { address: 0x0202 }))
    ));
    assert!(s.bus().writes_to(0x0340).is_empty());
    // Previous value restored
    assert_eq!(s.get_control(ids::EXPOSURE).unwrap(), 1);
}

#[test]
fn test_failing_dependent_program_is_skipped() {
    let mut s = powered(description());
    s.bus_mut().inject_fault(0x0340);

    s.set_control(ids::EXPOSURE, 3000).unwrap();

    assert_eq!(s.bus().written_addresses(), vec![0x0202, 0x0203]);
    assert_eq!(s.get_control(ids::EXPOSURE).unwrap(), 3000);
}

#[test]
fn test_self_dependency_adjusts_stored_value() {
    let mut s = powered(description());
    s.set_control(ids::EXPOSURE, 100).unwrap();

    // Gain above exposure is replaced by exposure + 0
    s.set_control(ids::ANALOGUE_GAIN, 200).unwrap();
    assert_eq!(s.get_control(ids::ANALOGUE_GAIN).unwrap(), 100);
    assert_eq!(s.bus().value(0x0205), Some(100));

    s.set_control(ids::ANALOGUE_GAIN, 50).unwrap();
    assert_eq!(s.get_control(ids::ANALOGUE_GAIN).unwrap(), 50);
    assert_eq!(s.bus().value(0x0205), Some(50));
}

#[test]
fn test_disabled_before_power_on() {
    let mut s = sensor(description());

    assert!(matches!(
        s.set_control(ids::EXPOSURE, 100),
        Err(SensorError::Disabled { id }) if id == ids::EXPOSURE
    ));
    assert!(s.bus().ops().is_empty());
}

#[test]
fn test_streaming_context_control_needs_streaming() {
    let mut s = powered(description());

    assert!(matches!(
        s.set_control(ids::TEST_PATTERN, 1),
        Err(SensorError::Disabled { .. })
    ));

    s.stream_on().unwrap();
    s.set_control(ids::TEST_PATTERN, 1).unwrap();
    assert_eq!(s.bus().value(0x0601), Some(1));
}

#[test]
fn test_rejections() {
    let mut s = powered(description());

    assert!(matches!(
        s.set_control(ids::PIXEL_RATE, 1),
        Err(SensorError::NotWritable { .. })
    ));
    assert!(matches!(
        s.set_control(ControlId(0x1234), 1),
        Err(SensorError::NotFound { .. })
    ));
    assert!(matches!(
        s.set_control(ids::EXPOSURE, 5i64),
        Err(SensorError::TypeMismatch { expected: "integer", .. })
    ));
    assert!(matches!(
        s.set_control(ids::DIGITAL_GAIN, 5),
        Err(SensorError::TypeMismatch { expected: "64-bit integer", .. })
    ));
    assert!(matches!(
        s.set_control(ids::EXPOSURE, 0),
        Err(SensorError::OutOfRange { value: 0, min: 1, max: 65535, .. })
    ));
    assert!(s.bus().ops().is_empty());
}

#[test]
fn test_integer64_control() {
    let mut s = powered(description());

    s.set_control(ids::DIGITAL_GAIN, 0x0180i64).unwrap();

    assert_eq!(s.bus().writes_to(0x020E), vec![0x0180]);
    assert_eq!(s.get_control(ids::DIGITAL_GAIN).unwrap(), 0x0180);
}

#[test]
fn test_blanking_is_offset_by_active_size() {
    let mut s = powered(description());
    assert_eq!(s.set_source_size(1920, 1080), (1920, 1080));

    s.set_control(ids::HBLANK, 5000).unwrap();
    s.set_control(ids::VBLANK, 1200).unwrap();

    assert_eq!(s.bus().writes_to(0x0342), vec![1920 + 5000]);
    assert_eq!(s.bus().writes_to(0x0340), vec![1080 + 1200]);
}

#[test]
fn test_blanking_bounds_reject_short_lines() {
    let mut s = powered(description());
    let hblank = s.bank().find(ids::HBLANK).unwrap();
    assert_eq!((hblank.min(), hblank.max()), (6224 - 3840, 32752 - 3840));

    assert!(matches!(
        s.set_control(ids::HBLANK, 100),
        Err(SensorError::OutOfRange { .. })
    ));
}

#[test]
fn test_blanking_superseded_by_frame_size_controls() {
    let mut s = powered(frame_size_description());

    s.set_control(ids::HBLANK, 100).unwrap();
    assert!(s.bus().ops().is_empty());
    assert!(!s.bank().find(ids::HBLANK).unwrap().is_enabled());
    assert!(matches!(
        s.set_control(ids::HBLANK, 100),
        Err(SensorError::Disabled { .. })
    ));
}

#[test]
fn test_superseded_blanking_still_runs_dependent_pass() {
    let mut d = frame_size_description();
    if let Some(hblank) = d.controls.iter_mut().find(|c| c.id == ids::HBLANK) {
        hblank.dependencies = vec![DependencyProvision {
            control: ids::FRAME_LENGTH_LINES,
            phase: Phase::DependentControl,
            rules: vec![ActionRule {
                when: Condition::Greater,
                action: Action::Subtract,
                value: 0,
            }],
        }];
    }
    let mut s = powered(d);

    s.set_control(ids::HBLANK, 3000).unwrap();

    assert!(!s.bank().find(ids::HBLANK).unwrap().is_enabled());
    // Blanking's own register is not written, frame length gets the push
    assert!(s.bus().writes_to(0x0342).is_empty());
    assert_eq!(s.bus().writes_to(0x0340), vec![3000]);
}

#[test]
fn test_frame_size_controls_follow_mode_minimum() {
    let mut s = powered(frame_size_description());
    let llp = s.bank().find(ids::LINE_LENGTH_PIXELS).unwrap();
    assert_eq!((llp.min(), llp.default_value()), (4400, 4400));
    let fll = s.bank().find(ids::FRAME_LENGTH_LINES).unwrap();
    assert_eq!(fll.min(), 2250);

    s.set_control(ids::LINE_LENGTH_PIXELS, 5000).unwrap();
    assert_eq!(s.bus().writes_to(0x0342), vec![5000]);

    assert!(matches!(
        s.set_control(ids::LINE_LENGTH_PIXELS, 4000),
        Err(SensorError::OutOfRange { min: 4400, .. })
    ));
}

#[test]
fn test_flip_switches_pixel_order() {
    let mut s = powered(description());

    s.set_control(ids::HFLIP, 1).unwrap();
    assert_eq!(s.pipeline().format_index, 1);
    assert_eq!(s.bus().value(0x0101), Some(0x01));

    s.set_control(ids::VFLIP, 1).unwrap();
    assert_eq!(s.pipeline().format_index, 3);
    assert_eq!(s.bus().value(0x0101), Some(0x03));

    s.set_control(ids::HFLIP, 0).unwrap();
    assert_eq!(s.pipeline().format_index, 2);
    assert_eq!(s.bus().value(0x0101), Some(0x02));
}

#[test]
fn test_flip_without_matching_format_is_rolled_back() {
    let mut s = powered(description());
    s.set_format(super::SGRBG12).unwrap();

    assert!(matches!(
        s.set_control(ids::HFLIP, 1),
        Err(SensorError::NoDataFormat { bits_per_pixel: 12, .. })
    ));
    assert_eq!(s.get_control(ids::HFLIP).unwrap(), 0);
    assert_eq!(s.pipeline().format_index, 4);
    assert!(s.bus().writes_to(0x0101).is_empty());
}

#[test]
fn test_flip_without_flip_table_is_rejected() {
    let mut d = description();
    d.flips.clear();
    let mut s = sensor(d);

    // The stored flip cannot be restored either
    assert!(matches!(
        s.power_on(),
        Err(SensorError::UnsupportedFlip { flip: 0 })
    ));
    s.bus_mut().clear_log();

    assert!(matches!(
        s.set_control(ids::HFLIP, 1),
        Err(SensorError::UnsupportedFlip { flip: 0x01 })
    ));
    assert_eq!(s.get_control(ids::HFLIP).unwrap(), 0);
    assert!(s.pipeline().flip.is_empty());
    assert!(s.bus().writes_to(0x0101).is_empty());
}

#[test]
fn test_stepped_control_rejects_values_between_steps() {
    let mut d = description();
    d.controls[0].kind = ControlKind::Integer {
        min: 1,
        max: 65535,
        step: 4,
        default: 1,
    };
    let mut s = powered(d);

    s.set_control(ids::EXPOSURE, 9).unwrap();
    assert!(matches!(
        s.set_control(ids::EXPOSURE, 10),
        Err(SensorError::OffStep { value: 10, min: 1, step: 4, .. })
    ));
    assert_eq!(s.get_control(ids::EXPOSURE).unwrap(), 9);
}

#[test]
fn test_wide_value_must_fit_register() {
    let mut d = description();
    d.controls[2].kind = ControlKind::Integer64 {
        min: 0,
        max: i64::MAX,
        step: 1,
        default: 0x100,
    };
    let mut s = powered(d);

    assert!(matches!(
        s.set_control(ids::DIGITAL_GAIN, 0x1_0000_0000i64),
        Err(SensorError::OutOfRange { max: 0xFFFF_FFFF, .. })
    ));
    assert_eq!(s.get_control(ids::DIGITAL_GAIN).unwrap(), 0x100);
    assert!(s.bus().writes_to(0x020E).is_empty());

    s.set_control(ids::DIGITAL_GAIN, 0xFFFF_FFFFi64).unwrap();
    assert_eq!(s.get_control(ids::DIGITAL_GAIN).unwrap(), 0xFFFF_FFFF);
}

#[test]
fn test_volatile_control_reads_hardware() {
    let status_id = ControlId(0x0098_1911);
    let mut d = description();
    d.controls.push(ControlDescriptor {
        flags: ControlFlags::VOLATILE,
        ..control(
            status_id,
            "Sensor Status",
            0,
            255,
            vec![write(
                0x0151,
                RegWidth::Bits8,
                vec![Operation::new(ArithOp::Assign, Operand::Register(0x0151))],
            )],
        )
    });
    let mut s = powered(d);
    s.bus_mut().preset(0x0151, 0x5A);

    assert_eq!(s.get_control(status_id).unwrap(), 0x5A);
    assert_eq!(s.bank().find(status_id).unwrap().value(), 0);
}

#[test]
fn test_get_read_only_evaluates_first_entry() {
    let mut s = powered(description());
    s.bus_mut().preset(0x013A, 42);
    s.bus_mut().preset(0x013B, 7);

    assert_eq!(s.get_control(TEMPERATURE).unwrap(), 42);
}

#[test]
fn test_get_rejections() {
    let mut s = powered(description());

    assert!(matches!(
        s.get_control(ids::PIXEL_RATE),
        Err(SensorError::EmptyProgram { .. })
    ));
    assert!(matches!(
        s.get_control(ids::TEST_PATTERN),
        Err(SensorError::NotReadable { .. })
    ));
    assert!(matches!(
        s.get_control_on(Stage::Binner, ids::PIXEL_RATE),
        Err(SensorError::NotFound { .. })
    ));
}

#[test]
fn test_link_freq_selects_pll_and_publishes_rate() {
    let mut s = powered(description());
    assert_eq!(s.pll_index(), Some(0));
    assert_eq!(s.bank().find(ids::PIXEL_RATE).unwrap().value(), 288_000_000);

    s.set_control(ids::LINK_FREQ, 1).unwrap();

    assert_eq!(s.pll_index(), Some(2));
    assert_eq!(s.bank().find(ids::PIXEL_RATE).unwrap().value(), 144_000_000);
    // Link frequency has no register program
    assert!(s.bus().ops().is_empty());
}

#[test]
fn test_link_freq_without_pll_keeps_previous_value() {
    let mut s = powered(description());
    s.set_control(ids::LINK_FREQ, 1).unwrap();

    assert!(matches!(
        s.set_control(ids::LINK_FREQ, 2),
        Err(SensorError::NoPllConfiguration { link_freq: 180_000_000 })
    ));
    assert_eq!(s.bank().find(ids::LINK_FREQ).unwrap().value(), 1);
    assert_eq!(s.pll_index(), Some(2));
}

#[test]
fn test_pll_impacting_control_rechecks_match_lists() {
    let mut s = powered(description());
    s.stream_on().unwrap();
    assert_eq!(s.pll_index(), Some(0));

    // Row 0 requires the test pattern to be off
    s.set_control(ids::TEST_PATTERN, 1).unwrap();

    assert_eq!(s.pll_index(), Some(1));
    assert_eq!(s.bank().find(ids::PIXEL_RATE).unwrap().value(), 200_000_000);
}

#[test]
fn test_menu_items() {
    use crate::core::controls::MenuItem;

    let s = powered(description());

    assert_eq!(
        s.menu_item(ids::LINK_FREQ, 1).unwrap(),
        MenuItem::Integer(360_000_000)
    );
    assert_eq!(
        s.menu_item(ids::TEST_PATTERN, 2).unwrap(),
        MenuItem::Name("bars".to_string())
    );
}
