use shutter_protocol::ANGLE_MAX;

/// Servo PWM parameters.
pub const PWM_FREQ_HZ: u32 = 50;
const MIN_PULSE_US: u32 = 500; // 0° position
const MAX_PULSE_US: u32 = 2500; // 180° position
const PERIOD_US: u32 = 1_000_000 / PWM_FREQ_HZ;

/// Convert angle (0–180) to a duty value for a PWM channel whose full
/// period is `max_duty`. Angles above 180 are clamped.
pub fn angle_to_duty(angle: u8, max_duty: u32) -> u32 {
    let angle = angle.min(ANGLE_MAX) as u32;
    let pulse_us = MIN_PULSE_US + (angle * (MAX_PULSE_US - MIN_PULSE_US)) / ANGLE_MAX as u32;
    (pulse_us * max_duty) / PERIOD_US
}

#[cfg(feature = "espidf")]
pub use esp::ServoDriver;

#[cfg(feature = "espidf")]
mod esp {
    use esp_idf_hal::gpio::AnyOutputPin;
    use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, LowSpeed, CHANNEL0};
    use esp_idf_sys::{EspError, ESP_ERR_INVALID_ARG};
    use log::{info, warn};

    use super::angle_to_duty;
    use crate::actuator::Actuator;
    use crate::config::is_servo_pin;

    /// Servo driver on LEDC channel 0, attached to a GPIO chosen at runtime.
    pub struct ServoDriver {
        channel: Option<CHANNEL0>,
        timer: &'static LedcTimerDriver<'static, LowSpeed>,
        ledc: Option<LedcDriver<'static>>,
    }

    impl ServoDriver {
        pub fn new(channel: CHANNEL0, timer: LedcTimerDriver<'static, LowSpeed>) -> Self {
            Self {
                channel: Some(channel),
                // The timer lives for the whole firmware run.
                timer: Box::leak(Box::new(timer)),
                ledc: None,
            }
        }
    }

    impl Actuator for ServoDriver {
        type Error = EspError;

        fn attach(&mut self, pin: u8) -> Result<(), EspError> {
            if !is_servo_pin(pin) {
                warn!("GPIO{} is reserved by the board", pin);
                return Err(EspError::from_infallible::<{ ESP_ERR_INVALID_ARG as i32 }>());
            }
            let Some(channel) = self.channel.take() else {
                warn!("Servo already attached; ignoring pin {}", pin);
                return Ok(());
            };
            // SAFETY: pins in `SERVO_PINS` are not claimed by flash or Ethernet.
            let gpio = unsafe { AnyOutputPin::new(pin as i32) };
            let ledc = LedcDriver::new(channel, self.timer, gpio)?;
            info!("Servo attached to GPIO{}", pin);
            self.ledc = Some(ledc);
            Ok(())
        }

        fn move_to(&mut self, angle: u8) -> Result<(), EspError> {
            match self.ledc.as_mut() {
                Some(ledc) => {
                    let duty = angle_to_duty(angle, ledc.get_max_duty());
                    ledc.set_duty(duty)
                }
                None => {
                    warn!("Servo not attached; dropping move to {}°", angle);
                    Ok(())
                }
            }
        }
    }
}
