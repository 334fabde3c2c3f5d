#![cfg_attr(not(feature = "std"), no_std)]

pub mod command;
pub mod osc;

pub use command::{Command, CommandError, CommandKind};
pub use osc::{OscArg, OscError, OscMessage};

/// Servo angle limits in degrees.
pub const ANGLE_MIN: u8 = 0;
pub const ANGLE_MAX: u8 = 180;

/// Pin numbers accepted on the wire. Boards may reserve some of them.
pub const PIN_MIN: u8 = 2;
pub const PIN_MAX: u8 = 26;

/// Reply address carrying the current angle.
pub const REPLY_POSITION: &str = "/position";
/// Reply address for `/ping`.
pub const REPLY_PONG: &str = "/pong";

/// Shutter status, derived from the current angle and the calibrated bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterStatus {
    Open,
    Closed,
    Intermediate,
}

impl ShutterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutterStatus::Open => "open",
            ShutterStatus::Closed => "closed",
            ShutterStatus::Intermediate => "intermediate",
        }
    }

    /// Bounds need not be ordered. When both bounds are equal, open wins.
    pub fn from_angle(angle: u8, closed: u8, open: u8) -> Self {
        if angle == open {
            ShutterStatus::Open
        } else if angle == closed {
            ShutterStatus::Closed
        } else {
            ShutterStatus::Intermediate
        }
    }
}

/// Build the `/position <angle>` reply.
pub fn position_reply(angle: u8) -> Result<OscMessage, OscError> {
    OscMessage::new(REPLY_POSITION)?.with_arg(OscArg::Int(angle as i32))
}

/// Build the `/pong` reply.
pub fn pong_reply() -> Result<OscMessage, OscError> {
    OscMessage::new(REPLY_PONG)
}
