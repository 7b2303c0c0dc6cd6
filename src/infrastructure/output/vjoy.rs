//! vJoy driver binding
//!
//! `vJoyInterface.dll` ships with the vJoy driver rather than with this
//! program, so it is loaded at runtime and its exports resolved by name.

use super::{JoystickDevice, StartupError};
use crate::domain::models::{JoystickReport, SlotStatus};
use libloading::Library;
use tracing::{error, trace};

const LIBRARY_NAME: &str = "vJoyInterface.dll";

type VJoyEnabledFn = unsafe extern "C" fn() -> i32;
type GetVjdStatusFn = unsafe extern "C" fn(u32) -> i32;
type AcquireVjdFn = unsafe extern "C" fn(u32) -> i32;
type RelinquishVjdFn = unsafe extern "C" fn(u32);
type UpdateVjdFn = unsafe extern "C" fn(u32, *mut JoystickPosition) -> i32;

// VjdStat
const VJD_STAT_OWN: i32 = 0;
const VJD_STAT_FREE: i32 = 1;
const VJD_STAT_BUSY: i32 = 2;
const VJD_STAT_MISS: i32 = 3;

/// `JOYSTICK_POSITION_V2` from the vJoy SDK.
#[repr(C)]
#[derive(Debug, Default)]
struct JoystickPosition {
    b_device: u8,
    w_throttle: i32,
    w_rudder: i32,
    w_aileron: i32,
    w_axis_x: i32,
    w_axis_y: i32,
    w_axis_z: i32,
    w_axis_x_rot: i32,
    w_axis_y_rot: i32,
    w_axis_z_rot: i32,
    w_slider: i32,
    w_dial: i32,
    w_wheel: i32,
    w_axis_vx: i32,
    w_axis_vy: i32,
    w_axis_vz: i32,
    w_axis_vbrx: i32,
    w_axis_vbry: i32,
    w_axis_vbrz: i32,
    l_buttons: i32,
    b_hats: u32,
    b_hats_ex1: u32,
    b_hats_ex2: u32,
    b_hats_ex3: u32,
    l_buttons_ex1: i32,
    l_buttons_ex2: i32,
    l_buttons_ex3: i32,
}

pub struct VJoyDevice {
    get_status: GetVjdStatusFn,
    acquire: AcquireVjdFn,
    relinquish: RelinquishVjdFn,
    update: UpdateVjdFn,
    // Owns the code the pointers above point into
    _library: Library,
}

impl VJoyDevice {
    /// Load the driver interface and check that vJoy is enabled.
    pub fn load() -> Result<Self, StartupError> {
        // SAFETY: vJoyInterface.dll has no initialisation routines with
        // preconditions on the caller.
        let library = unsafe { Library::new(LIBRARY_NAME) }.map_err(|e| {
            error!("Failed to load {}: {}", LIBRARY_NAME, e);
            StartupError::DriverUnavailable
        })?;

        // SAFETY: the signatures match the exports declared in vJoyInterface.h.
        let (enabled, get_status, acquire, relinquish, update): (
            VJoyEnabledFn,
            GetVjdStatusFn,
            AcquireVjdFn,
            RelinquishVjdFn,
            UpdateVjdFn,
        ) = unsafe {
            (
                symbol(&library, b"vJoyEnabled\0")?,
                symbol(&library, b"GetVJDStatus\0")?,
                symbol(&library, b"AcquireVJD\0")?,
                symbol(&library, b"RelinquishVJD\0")?,
                symbol(&library, b"UpdateVJD\0")?,
            )
        };

        // SAFETY: resolved from the loaded library, takes no arguments.
        if unsafe { enabled() } == 0 {
            error!("Function vJoyEnabled failed - make sure that vJoy is installed and enabled");
            return Err(StartupError::DriverUnavailable);
        }

        Ok(Self {
            get_status,
            acquire,
            relinquish,
            update,
            _library: library,
        })
    }
}

/// Copy the export `name` out of `library` as a function pointer.
///
/// # Safety
/// `F` must be an `extern "C"` function pointer type matching the export,
/// and must not be called after `library` is dropped.
unsafe fn symbol<F: Copy>(library: &Library, name: &[u8]) -> Result<F, StartupError> {
    library.get::<F>(name).map(|export| *export).map_err(|e| {
        error!("{} is missing a required export: {}", LIBRARY_NAME, e);
        StartupError::DriverUnavailable
    })
}

impl JoystickDevice for VJoyDevice {
    fn status(&self, slot: u32) -> SlotStatus {
        // SAFETY: resolved from the loaded module.
        match unsafe { (self.get_status)(slot) } {
            VJD_STAT_OWN => SlotStatus::Owned,
            VJD_STAT_FREE => SlotStatus::Free,
            VJD_STAT_BUSY => SlotStatus::Busy,
            VJD_STAT_MISS => SlotStatus::Missing,
            _ => SlotStatus::Error,
        }
    }

    fn acquire(&mut self, slot: u32) -> bool {
        // SAFETY: resolved from the loaded module.
        unsafe { (self.acquire)(slot) != 0 }
    }

    fn relinquish(&mut self, slot: u32) {
        // SAFETY: resolved from the loaded module.
        unsafe { (self.relinquish)(slot) }
    }

    fn update(&mut self, slot: u32, report: &JoystickReport) -> bool {
        let mut position = JoystickPosition {
            b_device: slot as u8,
            w_axis_x: report.axis_x,
            w_axis_y: report.axis_y,
            w_axis_z: report.axis_z,
            l_buttons: report.buttons as i32,
            ..Default::default()
        };
        trace!("UpdateVJD {}: {:?}", slot, position);

        // SAFETY: `position` is a valid JOYSTICK_POSITION_V2 for the duration of the call.
        unsafe { (self.update)(slot, &mut position) != 0 }
    }
}
