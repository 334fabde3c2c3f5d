use core::ops::RangeInclusive;

use crate::osc::{OscArg, OscError, OscMessage};
use crate::{ANGLE_MAX, ANGLE_MIN, PIN_MAX, PIN_MIN};

/// Address tokens understood by the shutter.
///
/// [`CommandKind::ALL`] is the route table: every token maps to exactly one
/// kind and no two kinds share a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Open,
    Close,
    Move,
    Position,
    Ping,
    Test,
    SetClosed,
    SetOpen,
    ServoPin,
    ShutterIp,
    MasterIp,
    ShutterPort,
    MasterPort,
    ResetConfig,
    Reboot,
}

impl CommandKind {
    pub const ALL: [CommandKind; 15] = [
        CommandKind::Open,
        CommandKind::Close,
        CommandKind::Move,
        CommandKind::Position,
        CommandKind::Ping,
        CommandKind::Test,
        CommandKind::SetClosed,
        CommandKind::SetOpen,
        CommandKind::ServoPin,
        CommandKind::ShutterIp,
        CommandKind::MasterIp,
        CommandKind::ShutterPort,
        CommandKind::MasterPort,
        CommandKind::ResetConfig,
        CommandKind::Reboot,
    ];

    pub fn address(self) -> &'static str {
        match self {
            CommandKind::Open => "/open",
            CommandKind::Close => "/close",
            CommandKind::Move => "/move",
            CommandKind::Position => "/position",
            CommandKind::Ping => "/ping",
            CommandKind::Test => "/test",
            CommandKind::SetClosed => "/set_closed",
            CommandKind::SetOpen => "/set_open",
            CommandKind::ServoPin => "/servo_pin",
            CommandKind::ShutterIp => "/shutter_ip",
            CommandKind::MasterIp => "/master_ip",
            CommandKind::ShutterPort => "/shutter_port",
            CommandKind::MasterPort => "/master_port",
            CommandKind::ResetConfig => "/reset_config",
            CommandKind::Reboot => "/reboot",
        }
    }

    /// Look up an address token. Matching is exact.
    pub fn from_address(address: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.address() == address)
    }
}

/// A validated command, one variant per address token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    /// Target angle, already range-checked.
    Move(u8),
    Position,
    Ping,
    Test,
    SetClosed,
    SetOpen,
    ServoPin(u8),
    /// Last octet of the shutter address.
    ShutterIp(u8),
    /// Last octet of the master address.
    MasterIp(u8),
    ShutterPort(u16),
    MasterPort(u16),
    ResetConfig,
    Reboot,
}

/// Why a message did not decode into a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    UnknownAddress,
    MissingArgument,
    WrongType,
    OutOfRange(i32),
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownAddress => write!(f, "unknown address"),
            Self::MissingArgument => write!(f, "missing argument"),
            Self::WrongType => write!(f, "wrong argument type"),
            Self::OutOfRange(v) => write!(f, "argument {} out of range", v),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CommandError {}

impl Command {
    /// Decode and validate a message. Only the first argument is inspected.
    pub fn decode(msg: &OscMessage) -> Result<Self, CommandError> {
        let kind = CommandKind::from_address(msg.address()).ok_or(CommandError::UnknownAddress)?;

        let cmd = match kind {
            CommandKind::Open => Command::Open,
            CommandKind::Close => Command::Close,
            CommandKind::Move => Command::Move(angle_arg(msg)?),
            CommandKind::Position => Command::Position,
            CommandKind::Ping => Command::Ping,
            CommandKind::Test => Command::Test,
            CommandKind::SetClosed => Command::SetClosed,
            CommandKind::SetOpen => Command::SetOpen,
            CommandKind::ServoPin => {
                Command::ServoPin(int_in(msg, PIN_MIN as i32..=PIN_MAX as i32)? as u8)
            }
            CommandKind::ShutterIp => Command::ShutterIp(int_in(msg, 0..=255)? as u8),
            CommandKind::MasterIp => Command::MasterIp(int_in(msg, 0..=255)? as u8),
            CommandKind::ShutterPort => Command::ShutterPort(int_in(msg, 0..=65535)? as u16),
            CommandKind::MasterPort => Command::MasterPort(int_in(msg, 0..=65535)? as u16),
            CommandKind::ResetConfig => Command::ResetConfig,
            CommandKind::Reboot => Command::Reboot,
        };
        Ok(cmd)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Open => CommandKind::Open,
            Command::Close => CommandKind::Close,
            Command::Move(_) => CommandKind::Move,
            Command::Position => CommandKind::Position,
            Command::Ping => CommandKind::Ping,
            Command::Test => CommandKind::Test,
            Command::SetClosed => CommandKind::SetClosed,
            Command::SetOpen => CommandKind::SetOpen,
            Command::ServoPin(_) => CommandKind::ServoPin,
            Command::ShutterIp(_) => CommandKind::ShutterIp,
            Command::MasterIp(_) => CommandKind::MasterIp,
            Command::ShutterPort(_) => CommandKind::ShutterPort,
            Command::MasterPort(_) => CommandKind::MasterPort,
            Command::ResetConfig => CommandKind::ResetConfig,
            Command::Reboot => CommandKind::Reboot,
        }
    }

    pub fn address(&self) -> &'static str {
        self.kind().address()
    }

    /// Build the wire message a peer sends for this command.
    pub fn to_message(&self) -> Result<OscMessage, OscError> {
        let msg = OscMessage::new(self.address())?;
        let arg = match *self {
            Command::Move(v)
            | Command::ServoPin(v)
            | Command::ShutterIp(v)
            | Command::MasterIp(v) => Some(v as i32),
            Command::ShutterPort(v) | Command::MasterPort(v) => Some(v as i32),
            _ => None,
        };
        match arg {
            Some(v) => msg.with_arg(OscArg::Int(v)),
            None => Ok(msg),
        }
    }
}

fn int_arg(msg: &OscMessage) -> Result<i32, CommandError> {
    match msg.arg(0) {
        Some(OscArg::Int(v)) => Ok(*v),
        Some(_) => Err(CommandError::WrongType),
        None => Err(CommandError::MissingArgument),
    }
}

fn int_in(msg: &OscMessage, range: RangeInclusive<i32>) -> Result<i32, CommandError> {
    let v = int_arg(msg)?;
    if range.contains(&v) {
        Ok(v)
    } else {
        Err(CommandError::OutOfRange(v))
    }
}

/// Angle argument for `/move`. Faders send floats, which are truncated
/// toward zero before the range check.
fn angle_arg(msg: &OscMessage) -> Result<u8, CommandError> {
    let v = match msg.arg(0) {
        Some(OscArg::Int(v)) => *v,
        Some(OscArg::Float(f)) if f.is_finite() => *f as i32,
        Some(_) => return Err(CommandError::WrongType),
        None => return Err(CommandError::MissingArgument),
    };
    if (ANGLE_MIN as i32..=ANGLE_MAX as i32).contains(&v) {
        Ok(v as u8)
    } else {
        Err(CommandError::OutOfRange(v))
    }
}
