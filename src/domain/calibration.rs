//! Axis calibration
//!
//! Turns the raw 8-bit rotary positions of IIDX turntables and SDVX knobs into
//! joystick axis values. Two modes exist:
//!
//! - **Analog**: `round(raw * sensitivity / 255 * 32768) mod 32768`, stateless.
//! - **Digital**: the position is reduced to a rail signal (`0` one way,
//!   `32768` the other way, `16384` idle) for consumers that only understand
//!   digital scratch/knob input.
//!
//! The hardware counts positions 0..=255 and wraps. A jump of more than
//! [`ROTARY_WRAP_THRESHOLD`] between two samples is read as a wrap past the
//! 0/255 boundary, which inverts the naive direction. Packets also carry a
//! wrapping frame counter; digital mode ignores samples that arrive less than
//! [`UPDATE_FRAME_DELTA`] + 1 ticks after the last accepted one.
//!
//! The thresholds were found on real hardware and are kept as-is.

use crate::domain::models::{ControllerFrame, DeviceType, JoystickReport};

pub const AXIS_X: usize = 0;
pub const AXIS_Y: usize = 1;

/// Raw position jump above which a wrap past 0/255 is assumed.
pub const ROTARY_WRAP_THRESHOLD: i32 = 200;

/// Frame counter distance above which a wrap past 255 -> 0 is assumed.
pub const FRAME_WRAP_THRESHOLD: i32 = 200;

/// Minimum frame counter advance (exclusive) for a sample to be accepted.
pub const UPDATE_FRAME_DELTA: i32 = 1;

pub const AXIS_FULL_SCALE: i32 = 32768;

pub const RAIL_LOW: i32 = 0;
pub const RAIL_MID: i32 = AXIS_FULL_SCALE / 2;
pub const RAIL_HIGH: i32 = AXIS_FULL_SCALE;

/// Linear analog scaling of one raw axis byte.
///
/// Full deflection (`255` at sensitivity 1.0) folds back to `0`.
pub fn scale_analog(raw: u8, sensitivity: f64) -> i32 {
    let scaled = (f64::from(raw) * sensitivity / 255.0 * f64::from(AXIS_FULL_SCALE)).round();
    (scaled as i64).rem_euclid(i64::from(AXIS_FULL_SCALE)) as i32
}

/// Rail for a move from `last_raw` to `raw`.
pub fn rail_for(last_raw: u8, raw: u8) -> i32 {
    let diff = i32::from(last_raw) - i32::from(raw);
    let wrapped = diff.abs() > ROTARY_WRAP_THRESHOLD;

    match (wrapped, diff.signum()) {
        (_, 0) => RAIL_MID,
        (true, -1) | (false, 1) => RAIL_LOW,
        _ => RAIL_HIGH,
    }
}

/// Calibration memory of one connection session.
#[derive(Debug, Clone)]
pub struct CalibrationState {
    last_raw_value: [u8; 2],
    current_value: [i32; 2],
    initialized: [bool; 2],
    last_update_frame: Option<u8>,
    sensitivity: [f64; 2],
    digital_mode: bool,
}

impl CalibrationState {
    pub fn new(digital_mode: bool, sensitivity: [f64; 2]) -> Self {
        Self {
            last_raw_value: [0; 2],
            current_value: [0; 2],
            initialized: [false; 2],
            last_update_frame: None,
            sensitivity,
            digital_mode,
        }
    }

    pub fn digital_mode(&self) -> bool {
        self.digital_mode
    }

    pub fn current_value(&self, axis: usize) -> i32 {
        self.current_value[axis]
    }

    pub fn last_raw_value(&self, axis: usize) -> u8 {
        self.last_raw_value[axis]
    }

    pub fn is_initialized(&self, axis: usize) -> bool {
        self.initialized[axis]
    }

    pub fn last_update_frame(&self) -> Option<u8> {
        self.last_update_frame
    }

    /// Calibrate one decoded frame of `device_type`.
    ///
    /// pop'n and GITADORA axes are not rotary and pass through unscaled.
    pub fn apply(&mut self, device_type: DeviceType, frame: &ControllerFrame) -> JoystickReport {
        let buttons = u32::from(frame.buttons);

        if !device_type.has_rotary_axes() {
            return JoystickReport {
                axis_x: i32::from(frame.axis_x),
                axis_y: i32::from(frame.axis_y),
                axis_z: frame.axis_z.map(i32::from).unwrap_or_default(),
                buttons,
            };
        }

        if self.digital_mode {
            self.apply_digital(frame);
        } else {
            self.current_value[AXIS_X] = scale_analog(frame.axis_x, self.sensitivity[AXIS_X]);
            self.current_value[AXIS_Y] = scale_analog(frame.axis_y, self.sensitivity[AXIS_Y]);
        }

        JoystickReport {
            axis_x: self.current_value[AXIS_X],
            axis_y: self.current_value[AXIS_Y],
            axis_z: 0,
            buttons,
        }
    }

    /// Frame debounce. Rejects repeated or too-fresh samples but lets the
    /// counter wrap from 255 back to 0.
    fn accepts_frame(&self, frame_counter: u8) -> bool {
        let Some(last) = self.last_update_frame else {
            return true;
        };

        let delta = i32::from(frame_counter) - i32::from(last);
        let overflowed = (i32::from(last) - i32::from(frame_counter)).abs() > FRAME_WRAP_THRESHOLD;

        delta > UPDATE_FRAME_DELTA || (overflowed && delta < UPDATE_FRAME_DELTA)
    }

    fn apply_digital(&mut self, frame: &ControllerFrame) {
        if !self.accepts_frame(frame.frame_counter) {
            return;
        }

        for (axis, raw) in [(AXIS_X, frame.axis_x), (AXIS_Y, frame.axis_y)] {
            if self.initialized[axis] {
                self.current_value[axis] = rail_for(self.last_raw_value[axis], raw);
            } else {
                // First sample only sets the baseline
                self.initialized[axis] = true;
            }
            self.last_raw_value[axis] = raw;
        }
        self.last_update_frame = Some(frame.frame_counter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(axis_x: u8, axis_y: u8, frame_counter: u8) -> ControllerFrame {
        ControllerFrame {
            axis_x,
            axis_y,
            axis_z: None,
            buttons: 0,
            frame_counter,
        }
    }

    fn digital() -> CalibrationState {
        CalibrationState::new(true, [1.0, 1.0])
    }

    #[test]
    fn test_scale_analog() {
        assert_eq!(scale_analog(0, 1.0), 0);
        assert_eq!(scale_analog(128, 1.0), 16448);
        assert_eq!(scale_analog(64, 1.0), 8224);
        assert_eq!(scale_analog(254, 1.0), 32639);
        // 255 maps to exactly full scale, which folds to 0
        assert_eq!(scale_analog(255, 1.0), 0);
        assert_eq!(scale_analog(128, 2.0), 129);
    }

    #[test]
    fn test_scale_analog_is_stateless() {
        let mut state = CalibrationState::new(false, [1.5, 0.5]);
        let first = state.apply(DeviceType::Iidx, &frame(100, 200, 0));
        state.apply(DeviceType::Iidx, &frame(3, 250, 99));
        let again = state.apply(DeviceType::Iidx, &frame(100, 200, 0));
        assert_eq!(first, again);
        assert_eq!(first.axis_x, scale_analog(100, 1.5));
        assert_eq!(first.axis_y, scale_analog(200, 0.5));
    }

    #[test]
    fn test_sdvx_analog_end_to_end() {
        let mut state = CalibrationState::new(false, [1.0, 1.0]);
        let mut input = frame(128, 64, 7);
        input.buttons = 0x0005;
        let report = state.apply(DeviceType::Sdvx, &input);
        let expected_x = ((128.0_f64 / 255.0 * 32768.0).round() as i32) % 32768;
        let expected_y = ((64.0_f64 / 255.0 * 32768.0).round() as i32) % 32768;
        assert_eq!(
            report,
            JoystickReport {
                axis_x: expected_x,
                axis_y: expected_y,
                axis_z: 0,
                buttons: 0x0005,
            }
        );
    }

    #[test]
    fn test_rail_for() {
        // Normal motion
        assert_eq!(rail_for(20, 10), RAIL_LOW);
        assert_eq!(rail_for(10, 20), RAIL_HIGH);
        assert_eq!(rail_for(10, 10), RAIL_MID);
        // Wrapped motion inverts the naive direction
        assert_eq!(rail_for(10, 250), RAIL_LOW);
        assert_eq!(rail_for(250, 10), RAIL_HIGH);
        // Exactly at the threshold is still normal motion
        assert_eq!(rail_for(0, 200), RAIL_HIGH);
        assert_eq!(rail_for(0, 201), RAIL_LOW);
    }

    #[test]
    fn test_first_frame_only_sets_baseline() {
        let mut state = digital();
        let report = state.apply(DeviceType::Iidx, &frame(10, 77, 0));
        assert_eq!(report.axis_x, 0);
        assert_eq!(state.current_value(AXIS_X), 0);
        assert_eq!(state.current_value(AXIS_Y), 0);
        assert_eq!(state.last_raw_value(AXIS_X), 10);
        assert_eq!(state.last_raw_value(AXIS_Y), 77);
        assert!(state.is_initialized(AXIS_X));
        assert_eq!(state.last_update_frame(), Some(0));
    }

    #[test]
    fn test_consecutive_frame_is_gated() {
        let mut state = digital();
        state.apply(DeviceType::Iidx, &frame(10, 0, 0));
        let report = state.apply(DeviceType::Iidx, &frame(12, 0, 1));
        // delta of 1 is not > 1
        assert_eq!(report.axis_x, 0);
        assert_eq!(state.last_raw_value(AXIS_X), 10);
        assert_eq!(state.last_update_frame(), Some(0));
    }

    #[test]
    fn test_duplicate_frame_counter_is_gated() {
        let mut state = digital();
        state.apply(DeviceType::Sdvx, &frame(10, 10, 40));
        state.apply(DeviceType::Sdvx, &frame(20, 20, 42));
        assert_eq!(state.current_value(AXIS_X), RAIL_HIGH);

        let report = state.apply(DeviceType::Sdvx, &frame(5, 5, 42));
        assert_eq!(report.axis_x, RAIL_HIGH);
        assert_eq!(state.last_raw_value(AXIS_X), 20);
    }

    #[test]
    fn test_normal_and_wrapped_motion() {
        let mut state = digital();
        state.apply(DeviceType::Iidx, &frame(10, 0, 0));

        let report = state.apply(DeviceType::Iidx, &frame(20, 0, 2));
        assert_eq!(report.axis_x, RAIL_HIGH);

        // 20 -> 250 is a wrap, not a large move the naive way
        let report = state.apply(DeviceType::Iidx, &frame(250, 0, 4));
        assert_eq!(report.axis_x, RAIL_LOW);

        let report = state.apply(DeviceType::Iidx, &frame(5, 0, 6));
        assert_eq!(report.axis_x, RAIL_HIGH);

        let report = state.apply(DeviceType::Iidx, &frame(5, 0, 8));
        assert_eq!(report.axis_x, RAIL_MID);
    }

    #[test]
    fn test_axes_are_independent() {
        let mut state = digital();
        state.apply(DeviceType::Sdvx, &frame(100, 100, 0));
        let report = state.apply(DeviceType::Sdvx, &frame(90, 110, 2));
        assert_eq!(report.axis_x, RAIL_LOW);
        assert_eq!(report.axis_y, RAIL_HIGH);
    }

    #[test]
    fn test_frame_counter_wrap_is_accepted() {
        let mut state = digital();
        state.apply(DeviceType::Iidx, &frame(10, 0, 250));
        let report = state.apply(DeviceType::Iidx, &frame(20, 0, 3));
        assert_eq!(report.axis_x, RAIL_HIGH);
        assert_eq!(state.last_update_frame(), Some(3));
    }

    #[test]
    fn test_small_backwards_frame_is_gated() {
        let mut state = digital();
        state.apply(DeviceType::Iidx, &frame(10, 0, 5));
        state.apply(DeviceType::Iidx, &frame(20, 0, 4));
        assert_eq!(state.current_value(AXIS_X), 0);
        assert_eq!(state.last_update_frame(), Some(5));
    }

    #[test]
    fn test_digital_values_stay_on_rails() {
        let mut state = digital();
        let mut counter = 0u8;
        for raw in (0..=255u8).chain((0..=255u8).rev()).step_by(7) {
            counter = counter.wrapping_add(3);
            let report = state.apply(DeviceType::Iidx, &frame(raw, raw, counter));
            assert!([RAIL_LOW, RAIL_MID, RAIL_HIGH].contains(&report.axis_x));
            assert!([RAIL_LOW, RAIL_MID, RAIL_HIGH].contains(&report.axis_y));
        }
    }

    #[test]
    fn test_pad_devices_pass_through() {
        for digital_mode in [false, true] {
            let mut state = CalibrationState::new(digital_mode, [2.0, 2.0]);
            let input = ControllerFrame {
                axis_x: 1,
                axis_y: 2,
                axis_z: Some(255),
                buttons: 0x8001,
                frame_counter: 9,
            };
            let report = state.apply(DeviceType::PopN, &input);
            assert_eq!(
                report,
                JoystickReport {
                    axis_x: 1,
                    axis_y: 2,
                    axis_z: 255,
                    buttons: 0x8001,
                }
            );
            assert_eq!(state.last_update_frame(), None);
        }
    }
}
