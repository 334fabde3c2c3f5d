use embedded_hal::delay::DelayNs;
use log::{error, info, warn};
use shutter_protocol::{pong_reply, position_reply};

use super::{Outcome, Shutter};
use crate::actuator::{swing_test, Actuator};
use crate::config::{is_servo_pin, CALIBRATION_OFFSET, NETWORK_OFFSET};
use crate::error::StoreError;
use crate::provisioning::mark_unprovisioned;
use crate::store::ByteStore;

impl<S, A, D> Shutter<S, A, D>
where
    S: ByteStore,
    A: Actuator,
    D: DelayNs,
{
    pub(super) fn open(&mut self) -> Outcome {
        let target = self.calibration.open;
        if self.state.current_angle() != target && self.drive(target) {
            info!("Shutter open");
        }
        Outcome::done()
    }

    pub(super) fn close(&mut self) -> Outcome {
        let target = self.calibration.closed;
        if self.state.current_angle() != target && self.drive(target) {
            info!("Shutter closed");
        }
        Outcome::done()
    }

    pub(super) fn move_to(&mut self, angle: u8) -> Outcome {
        if self.drive(angle) {
            info!("Shutter at {}°", angle);
        }
        Outcome::done()
    }

    pub(super) fn position(&mut self) -> Outcome {
        let angle = self.state.current_angle();
        info!("/position {}", angle);
        match position_reply(angle) {
            Ok(msg) => Outcome::reply(msg),
            Err(e) => {
                warn!("Could not build /position reply: {}", e);
                Outcome::done()
            }
        }
    }

    pub(super) fn ping(&mut self) -> Outcome {
        info!("/pong");
        match pong_reply() {
            Ok(msg) => Outcome::reply(msg),
            Err(e) => {
                warn!("Could not build /pong reply: {}", e);
                Outcome::done()
            }
        }
    }

    pub(super) fn test(&mut self) -> Outcome {
        info!("Running servo self-test");
        if let Err(e) = swing_test(
            &mut self.actuator,
            &mut self.delay,
            &self.calibration,
            &mut self.state,
        ) {
            error!(
                "Servo self-test failed at {}°: {:?}",
                self.state.current_angle(),
                e
            );
        }
        Outcome::done()
    }

    pub(super) fn set_closed(&mut self) -> Result<Outcome, StoreError> {
        self.calibration.closed = self.state.current_angle();
        self.store.write_record(CALIBRATION_OFFSET, &self.calibration)?;
        info!("Closed position set to {}°", self.calibration.closed);
        Ok(Outcome::done())
    }

    pub(super) fn set_open(&mut self) -> Result<Outcome, StoreError> {
        self.calibration.open = self.state.current_angle();
        self.store.write_record(CALIBRATION_OFFSET, &self.calibration)?;
        info!("Open position set to {}°", self.calibration.open);
        Ok(Outcome::done())
    }

    /// The new pin is persisted and takes effect on the next boot.
    pub(super) fn servo_pin(&mut self, pin: u8) -> Result<Outcome, StoreError> {
        if !is_servo_pin(pin) {
            warn!("GPIO{} is reserved by the board; servo pin unchanged", pin);
            return Ok(Outcome::done());
        }
        self.calibration.pin = pin;
        self.store.write_record(CALIBRATION_OFFSET, &self.calibration)?;
        info!("Servo pin set to {} (applies after reboot)", pin);
        Ok(Outcome::done())
    }

    pub(super) fn shutter_ip(&mut self, octet: u8) -> Result<Outcome, StoreError> {
        self.network.set_shutter_octet(octet);
        self.store.write_record(NETWORK_OFFSET, &self.network)?;
        info!("Shutter address set to {}", self.network.shutter_ip);
        Ok(Outcome::restart())
    }

    pub(super) fn master_ip(&mut self, octet: u8) -> Result<Outcome, StoreError> {
        self.network.set_master_octet(octet);
        self.store.write_record(NETWORK_OFFSET, &self.network)?;
        info!("Master address set to {}", self.network.master_ip);
        Ok(Outcome::done())
    }

    pub(super) fn shutter_port(&mut self, port: u16) -> Result<Outcome, StoreError> {
        self.network.shutter_port = port;
        self.store.write_record(NETWORK_OFFSET, &self.network)?;
        info!("Shutter port set to {}", port);
        Ok(Outcome::restart())
    }

    pub(super) fn master_port(&mut self, port: u16) -> Result<Outcome, StoreError> {
        self.network.master_port = port;
        self.store.write_record(NETWORK_OFFSET, &self.network)?;
        info!("Master port set to {}", port);
        Ok(Outcome::done())
    }

    pub(super) fn reset_config(&mut self) -> Result<Outcome, StoreError> {
        mark_unprovisioned(&mut self.store)?;
        info!("Configuration reset; factory setup runs on next boot");
        Ok(Outcome::restart())
    }

    pub(super) fn reboot(&mut self) -> Outcome {
        info!("Reboot requested");
        Outcome::restart()
    }
}
