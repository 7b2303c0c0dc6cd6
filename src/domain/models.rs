/// Supported controller families.
///
/// Resolved once per connection from the advertised local name and never
/// changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Unknown,
    Iidx,
    Sdvx,
    PopN,
    GitadoraGuitar,
}

impl DeviceType {
    /// Whether the X/Y axes carry an 8-bit rotary position that the
    /// calibrator scales or converts to rails.
    pub fn has_rotary_axes(self) -> bool {
        matches!(self, Self::Iidx | Self::Sdvx)
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Iidx => "IIDX",
            Self::Sdvx => "SDVX",
            Self::PopN => "pop'n music",
            Self::GitadoraGuitar => "GITADORA guitar",
        };
        f.write_str(name)
    }
}

/// One decoded hardware packet, before calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerFrame {
    // Raw axis bytes
    pub axis_x: u8,
    pub axis_y: u8,
    pub axis_z: Option<u8>,

    /// Button mask, bit N = hardware button bit N
    pub buttons: u16,

    /// 8-bit wrapping sequence number
    pub frame_counter: u8,
}

/// Calibrated joystick state for one frame, ready for the output device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoystickReport {
    pub axis_x: i32,
    pub axis_y: i32,
    pub axis_z: i32,
    pub buttons: u32,
}

/// Lifecycle of a connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Scanning,
    Validating,
    Subscribing,
    Streaming,
    Stopped,
    Disconnected,
}

/// Ownership status of a virtual joystick slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Already acquired by this process
    Owned,
    Free,
    /// Acquired by another feeder
    Busy,
    /// Not installed or disabled
    Missing,
    Error,
}
