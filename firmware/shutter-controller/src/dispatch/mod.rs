mod handlers;

use std::net::SocketAddrV4;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};
use shutter_protocol::{Command, OscMessage, ShutterStatus};

use crate::actuator::{swing_test, Actuator, ShutterState};
use crate::config::{
    is_servo_pin, Calibration, DeviceConfig, NetworkIdentity, DEFAULT_SERVO_PIN,
};
use crate::error::StoreError;
use crate::store::{ByteStore, RecordStore};

/// What the serve loop does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Any persistence already happened. No further work may be done before
    /// the device restarts.
    Restart,
}

/// Handler result: an optional reply for the master and the next step.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub reply: Option<OscMessage>,
    pub flow: Flow,
}

impl Outcome {
    pub fn done() -> Self {
        Self {
            reply: None,
            flow: Flow::Continue,
        }
    }

    pub fn reply(msg: OscMessage) -> Self {
        Self {
            reply: Some(msg),
            flow: Flow::Continue,
        }
    }

    pub fn restart() -> Self {
        Self {
            reply: None,
            flow: Flow::Restart,
        }
    }
}

/// Runtime context for one shutter: configuration, position, and the
/// collaborators handlers act on. Only handlers mutate it.
pub struct Shutter<S, A, D> {
    store: RecordStore<S>,
    network: NetworkIdentity,
    calibration: Calibration,
    state: ShutterState,
    actuator: A,
    delay: D,
}

impl<S, A, D> Shutter<S, A, D>
where
    S: ByteStore,
    A: Actuator,
    D: DelayNs,
{
    /// Attach the actuator to the calibrated pin and run the self-test
    /// swing. The shutter starts at its open angle.
    ///
    /// A stored pin the board reserves is replaced by the default pin for
    /// this run. The record keeps the old pin until the next calibration
    /// write.
    pub fn start(
        store: RecordStore<S>,
        config: DeviceConfig,
        mut actuator: A,
        mut delay: D,
    ) -> Result<Self, A::Error> {
        let mut calibration = config.calibration;
        if !is_servo_pin(calibration.pin) {
            warn!(
                "Stored servo pin {} is reserved, using GPIO{}",
                calibration.pin, DEFAULT_SERVO_PIN
            );
            calibration.pin = DEFAULT_SERVO_PIN;
        }
        info!(
            "Servo: closed={} open={} pin={}",
            calibration.closed, calibration.open, calibration.pin
        );
        actuator.attach(calibration.pin)?;
        let mut state = ShutterState::new(calibration.open);
        swing_test(&mut actuator, &mut delay, &calibration, &mut state)?;

        Ok(Self {
            store,
            network: config.network,
            calibration,
            state,
            actuator,
            delay,
        })
    }

    /// Decode one datagram and run its handler.
    ///
    /// Malformed packets, unknown addresses and invalid arguments are
    /// dropped without touching any state.
    pub fn dispatch(&mut self, datagram: &[u8]) -> Result<Outcome, StoreError> {
        let msg = match OscMessage::decode(datagram) {
            Ok(m) => m,
            Err(e) => {
                debug!("Dropping datagram ({} bytes): {}", datagram.len(), e);
                return Ok(Outcome::done());
            }
        };

        match Command::decode(&msg) {
            Ok(cmd) => self.handle(cmd),
            Err(e) => {
                debug!("Ignoring {}: {}", msg.address(), e);
                Ok(Outcome::done())
            }
        }
    }

    /// Run the handler for a validated command.
    pub fn handle(&mut self, cmd: Command) -> Result<Outcome, StoreError> {
        debug!("Handling {}", cmd.address());
        match cmd {
            Command::Open => Ok(self.open()),
            Command::Close => Ok(self.close()),
            Command::Move(angle) => Ok(self.move_to(angle)),
            Command::Position => Ok(self.position()),
            Command::Ping => Ok(self.ping()),
            Command::Test => Ok(self.test()),
            Command::SetClosed => self.set_closed(),
            Command::SetOpen => self.set_open(),
            Command::ServoPin(pin) => self.servo_pin(pin),
            Command::ShutterIp(octet) => self.shutter_ip(octet),
            Command::MasterIp(octet) => self.master_ip(octet),
            Command::ShutterPort(port) => self.shutter_port(port),
            Command::MasterPort(port) => self.master_port(port),
            Command::ResetConfig => self.reset_config(),
            Command::Reboot => Ok(self.reboot()),
        }
    }

    /// Move the actuator and mirror the new angle. On driver failure the
    /// recorded position is left as it was.
    fn drive(&mut self, angle: u8) -> bool {
        match self.actuator.move_to(angle) {
            Ok(()) => {
                self.state.set_angle(angle);
                true
            }
            Err(e) => {
                error!("Servo move to {}° failed: {:?}", angle, e);
                false
            }
        }
    }
}

impl<S, A, D> Shutter<S, A, D> {
    pub fn network(&self) -> &NetworkIdentity {
        &self.network
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn current_angle(&self) -> u8 {
        self.state.current_angle()
    }

    pub fn status(&self) -> ShutterStatus {
        self.state.status(&self.calibration)
    }

    /// Where replies go. Always taken from the current identity, never
    /// from the sender of the request.
    pub fn master_addr(&self) -> SocketAddrV4 {
        self.network.master_addr()
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn store(&self) -> &RecordStore<S> {
        &self.store
    }

    /// Tear down the context, keeping the store for the next boot.
    pub fn into_store(self) -> RecordStore<S> {
        self.store
    }
}
