use embedded_hal::delay::DelayNs;
use shutter_protocol::ShutterStatus;

use crate::config::Calibration;

/// Hold time at the open position during the self-test swing.
pub const TEST_OPEN_HOLD_MS: u32 = 500;
/// Hold time at the closed position during the self-test swing.
pub const TEST_CLOSED_HOLD_MS: u32 = 2000;

/// Servo-like actuator that moves to an absolute angle.
pub trait Actuator {
    type Error: core::fmt::Debug;

    /// Bind the actuator to a digital pin.
    fn attach(&mut self, pin: u8) -> Result<(), Self::Error>;

    /// Move to `angle` degrees (0–180).
    fn move_to(&mut self, angle: u8) -> Result<(), Self::Error>;
}

/// In-memory mirror of the physical shutter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutterState {
    current_angle: u8,
}

impl ShutterState {
    pub fn new(angle: u8) -> Self {
        Self {
            current_angle: angle,
        }
    }

    pub fn current_angle(&self) -> u8 {
        self.current_angle
    }

    pub fn set_angle(&mut self, angle: u8) {
        self.current_angle = angle;
    }

    pub fn status(&self, calibration: &Calibration) -> ShutterStatus {
        ShutterStatus::from_angle(self.current_angle, calibration.closed, calibration.open)
    }
}

/// Swing open, closed, then open again.
///
/// `state` follows every move that succeeds, so an aborted swing leaves it
/// at the last position actually reached.
pub fn swing_test<A: Actuator, D: DelayNs>(
    actuator: &mut A,
    delay: &mut D,
    calibration: &Calibration,
    state: &mut ShutterState,
) -> Result<(), A::Error> {
    let steps = [
        (calibration.open, TEST_OPEN_HOLD_MS),
        (calibration.closed, TEST_CLOSED_HOLD_MS),
        (calibration.open, 0),
    ];
    for (angle, hold_ms) in steps {
        actuator.move_to(angle)?;
        state.set_angle(angle);
        if hold_ms > 0 {
            delay.delay_ms(hold_ms);
        }
    }
    Ok(())
}
