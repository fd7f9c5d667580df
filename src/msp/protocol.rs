//! # MSP Protocol Constants and Types
//!
//! Core wire-format definitions for MSP (MultiWii Serial Protocol style)
//! communication with the flight controller.
//!
//! Frame layout on the wire:
//!
//! ```text
//! Offset  Bytes  Meaning
//! 0       1      '$' (0x24)
//! 1       1      'M' (0x4D)
//! 2       1      '<' (to device) or '>' (from device)
//! 3       1      payload size N (0..255)
//! 4       1      message ID (0..255)
//! 5..4+N  N      payload (packed little-endian fields)
//! 5+N     1      XOR-8 checksum of bytes 3..=4+N
//! ```

/// First header byte (`'$'`)
pub const MSP_HEADER_DOLLAR: u8 = b'$';

/// Second header byte (`'M'`)
pub const MSP_HEADER_M: u8 = b'M';

/// Direction byte for frames sent to the flight controller (`'<'`)
pub const MSP_DIRECTION_TO_DEVICE: u8 = b'<';

/// Direction byte for frames received from the flight controller (`'>'`)
pub const MSP_DIRECTION_FROM_DEVICE: u8 = b'>';

/// RC channels telemetry, six normalized channels
pub const MSP_RC_NORMAL: u8 = 121;

/// Attitude telemetry in radians
pub const MSP_ATTITUDE_RADIANS: u8 = 122;

/// Arming state telemetry
pub const MSP_ARM_STATUS: u8 = 123;

/// Battery voltage/current telemetry
pub const MSP_BATTERY_STATUS: u8 = 124;

/// Motor command, four normalized motor values
pub const MSP_SET_MOTOR_NORMAL: u8 = 215;

/// Frame direction relative to the flight controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    /// Ground station to flight controller (`'<'`)
    ToDevice,
    /// Flight controller to ground station (`'>'`)
    FromDevice,
}

/// One complete, checksum-validated frame off the wire
///
/// Transient: produced by the stream parser, consumed by registry decode,
/// never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame direction
    pub direction: FrameDirection,
    /// Message ID
    pub id: u8,
    /// Raw payload bytes (length 0..=255)
    pub payload: Vec<u8>,
}

/// Attitude in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Normalized RC channel values
///
/// Channel 1 (throttle) spans [-1, +1] as transmitted; consumers rescale
/// for display.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RcChannels {
    pub channels: [f32; 6],
}

/// Battery sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Battery {
    pub volts: f32,
    pub amps: f32,
}

/// A decoded inbound message with its typed fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// RC channels telemetry (ID 121)
    RcNormal(RcChannels),
    /// Attitude telemetry (ID 122)
    AttitudeRadians(Attitude),
    /// Arming state (ID 123)
    ArmStatus { armed: bool },
    /// Battery telemetry (ID 124)
    BatteryStatus(Battery),
}

impl Message {
    /// The wire ID this message decodes from
    pub fn id(&self) -> u8 {
        match self {
            Message::RcNormal(_) => MSP_RC_NORMAL,
            Message::AttitudeRadians(_) => MSP_ATTITUDE_RADIANS,
            Message::ArmStatus { .. } => MSP_ARM_STATUS,
            Message::BatteryStatus(_) => MSP_BATTERY_STATUS,
        }
    }
}
