//! Virtual joystick output
//!
//! [`OutputSink`] owns one slot of a [`JoystickDevice`] for the lifetime of
//! the process: it checks the slot once at startup, acquires it, feeds
//! calibrated reports and relinquishes it on drop.

#[cfg(windows)]
pub mod vjoy;

use crate::domain::models::{JoystickReport, SlotStatus};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{info, warn};

/// A virtual joystick driver.
pub trait JoystickDevice {
    fn status(&self, slot: u32) -> SlotStatus;
    fn acquire(&mut self, slot: u32) -> bool;
    fn relinquish(&mut self, slot: u32);
    /// Submit the state of `slot`. Returns false when the driver refused it.
    fn update(&mut self, slot: u32, report: &JoystickReport) -> bool;
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("virtual joystick driver is not installed or not enabled")]
    DriverUnavailable,
    #[error("device {0} is already owned by another feeder")]
    SlotBusy(u32),
    #[error("device {0} is not installed or disabled")]
    SlotMissing(u32),
    #[error("device {0} general error")]
    SlotError(u32),
    #[error("failed to acquire device {0}")]
    AcquireFailed(u32),
}

impl StartupError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> ExitCode {
        let code = match self {
            Self::DriverUnavailable => 2,
            Self::SlotBusy(_) => 3,
            Self::SlotMissing(_) => 4,
            Self::SlotError(_) => 5,
            Self::AcquireFailed(_) => 6,
        };
        ExitCode::from(code)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputError {
    #[error("feeding device {slot} failed (re-acquired: {reacquired})")]
    FeedFailed { slot: u32, reacquired: bool },
}

pub struct OutputSink<D: JoystickDevice> {
    device: D,
    slot: u32,
}

impl<D: JoystickDevice> OutputSink<D> {
    /// Check the slot status and acquire it.
    pub fn open(mut device: D, slot: u32) -> Result<Self, StartupError> {
        match device.status(slot) {
            SlotStatus::Owned => info!("Device {} is already owned by this feeder", slot),
            SlotStatus::Free => info!("Device {} is free", slot),
            SlotStatus::Busy => return Err(StartupError::SlotBusy(slot)),
            SlotStatus::Missing => return Err(StartupError::SlotMissing(slot)),
            SlotStatus::Error => return Err(StartupError::SlotError(slot)),
        }

        if !device.acquire(slot) {
            return Err(StartupError::AcquireFailed(slot));
        }
        info!("Acquired device number {} - OK", slot);

        Ok(Self { device, slot })
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Submit one report. On failure the slot is re-acquired once and the
    /// failure is still returned; the report itself is not resent.
    pub fn feed(&mut self, report: &JoystickReport) -> Result<(), OutputError> {
        if self.device.update(self.slot, report) {
            return Ok(());
        }

        warn!(
            "Feeding device number {} failed - trying to re-acquire",
            self.slot
        );
        let reacquired = self.device.acquire(self.slot);
        Err(OutputError::FeedFailed {
            slot: self.slot,
            reacquired,
        })
    }
}

impl<D: JoystickDevice> Drop for OutputSink<D> {
    fn drop(&mut self) {
        info!("Relinquishing device number {}", self.slot);
        self.device.relinquish(self.slot);
    }
}
