use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::store::Record;

/// Store layout. The sentinel sits outside both records.
pub const SENTINEL_OFFSET: usize = 0;
pub const NETWORK_OFFSET: usize = 1;
pub const CALIBRATION_OFFSET: usize = NetworkIdentity::SIZE + 1;

pub const SENTINEL_MARKED: u8 = 0xA5;
pub const SENTINEL_UNSET: u8 = 0x00;

/// Factory network defaults.
pub const MAC_PREFIX: [u8; 2] = [0xDE, 0xAD];
pub const DEFAULT_SHUTTER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 99);
pub const DEFAULT_MASTER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 40);
pub const DEFAULT_SHUTTER_PORT: u16 = 8000;
pub const DEFAULT_MASTER_PORT: u16 = 9000;

/// Factory calibration defaults.
pub const DEFAULT_CLOSED_ANGLE: u8 = 45;
pub const DEFAULT_OPEN_ANGLE: u8 = 135;
pub const DEFAULT_SERVO_PIN: u8 = 4;

/// GPIOs the servo may use on the ESP32-POE board. GPIO6-11 drive the SPI
/// flash and GPIO0, 12 and 17-27 belong to the RMII Ethernet PHY.
pub const SERVO_PINS: [u8; 6] = [2, 4, 5, 13, 14, 15];

pub fn is_servo_pin(pin: u8) -> bool {
    SERVO_PINS.contains(&pin)
}

/// Provisioning marker. Records are only trusted when this is `Marked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Unset,
    Marked,
}

impl Sentinel {
    /// Any byte other than the marker (including blank `0xFF`) reads as unset.
    pub fn from_byte(b: u8) -> Self {
        if b == SENTINEL_MARKED {
            Sentinel::Marked
        } else {
            Sentinel::Unset
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Sentinel::Unset => SENTINEL_UNSET,
            Sentinel::Marked => SENTINEL_MARKED,
        }
    }
}

/// Network identity record.
///
/// Layout (little-endian, 20 bytes):
/// `mac[6] | shutter_ip[4] | master_ip[4] | shutter_port | master_port | store_offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub mac: [u8; 6],
    pub shutter_ip: Ipv4Addr,
    pub master_ip: Ipv4Addr,
    /// Port the shutter listens on.
    pub shutter_port: u16,
    /// Port replies are sent to.
    pub master_port: u16,
    /// Where this record lives. Informational; writes always use [`NETWORK_OFFSET`].
    pub store_offset: u16,
}

impl NetworkIdentity {
    /// Factory identity with the three generated MAC bytes.
    pub fn factory(mac_suffix: [u8; 3]) -> Self {
        let mut mac = [0u8; 6];
        mac[..2].copy_from_slice(&MAC_PREFIX);
        mac[2..5].copy_from_slice(&mac_suffix);
        Self {
            mac,
            shutter_ip: DEFAULT_SHUTTER_IP,
            master_ip: DEFAULT_MASTER_IP,
            shutter_port: DEFAULT_SHUTTER_PORT,
            master_port: DEFAULT_MASTER_PORT,
            store_offset: NETWORK_OFFSET as u16,
        }
    }

    pub fn set_shutter_octet(&mut self, octet: u8) {
        self.shutter_ip = with_last_octet(self.shutter_ip, octet);
    }

    pub fn set_master_octet(&mut self, octet: u8) {
        self.master_ip = with_last_octet(self.master_ip, octet);
    }

    pub fn listen_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.shutter_ip, self.shutter_port)
    }

    pub fn master_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.master_ip, self.master_port)
    }

    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shutter {} master {} mac {}",
            self.listen_addr(),
            self.master_addr(),
            self.mac_string()
        )
    }
}

fn with_last_octet(ip: Ipv4Addr, octet: u8) -> Ipv4Addr {
    let mut o = ip.octets();
    o[3] = octet;
    Ipv4Addr::from(o)
}

impl Record for NetworkIdentity {
    const SIZE: usize = 20;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..6].copy_from_slice(&self.mac);
        buf[6..10].copy_from_slice(&self.shutter_ip.octets());
        buf[10..14].copy_from_slice(&self.master_ip.octets());
        buf[14..16].copy_from_slice(&self.shutter_port.to_le_bytes());
        buf[16..18].copy_from_slice(&self.master_port.to_le_bytes());
        buf[18..20].copy_from_slice(&self.store_offset.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&buf[0..6]);
        Self {
            mac,
            shutter_ip: Ipv4Addr::new(buf[6], buf[7], buf[8], buf[9]),
            master_ip: Ipv4Addr::new(buf[10], buf[11], buf[12], buf[13]),
            shutter_port: u16::from_le_bytes([buf[14], buf[15]]),
            master_port: u16::from_le_bytes([buf[16], buf[17]]),
            store_offset: u16::from_le_bytes([buf[18], buf[19]]),
        }
    }
}

/// Servo calibration record.
///
/// Layout (little-endian, 5 bytes): `closed | open | pin | store_offset`
///
/// The two angles are not ordered; either may be the larger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub closed: u8,
    pub open: u8,
    pub pin: u8,
    pub store_offset: u16,
}

impl Calibration {
    pub const fn factory() -> Self {
        Self {
            closed: DEFAULT_CLOSED_ANGLE,
            open: DEFAULT_OPEN_ANGLE,
            pin: DEFAULT_SERVO_PIN,
            store_offset: CALIBRATION_OFFSET as u16,
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::factory()
    }
}

impl Record for Calibration {
    const SIZE: usize = 5;

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.closed;
        buf[1] = self.open;
        buf[2] = self.pin;
        buf[3..5].copy_from_slice(&self.store_offset.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            closed: buf[0],
            open: buf[1],
            pin: buf[2],
            store_offset: u16::from_le_bytes([buf[3], buf[4]]),
        }
    }
}

/// Everything loaded from the store at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub network: NetworkIdentity,
    pub calibration: Calibration,
}
