use std::time::Duration;

use log::info;

use crate::provisioning::NoiseSource;

/// Hardware RNG. With the radio or ADC running this is true entropy;
/// otherwise it is still a fine seed for MAC generation.
pub struct EspNoise;

impl NoiseSource for EspNoise {
    fn sample(&mut self) -> u32 {
        unsafe { esp_idf_sys::esp_random() }
    }
}

/// Wait `grace` so pending log output drains, then reset the chip.
#[allow(unreachable_code)]
pub fn restart_after(grace: Duration) -> ! {
    info!("Rebooting in {}ms...", grace.as_millis());
    std::thread::sleep(grace);

    unsafe {
        esp_idf_sys::esp_restart();
    }

    unreachable!()
}

/// Get the last reset reason as a string.
pub fn reset_reason_str() -> &'static str {
    unsafe {
        match esp_idf_sys::esp_reset_reason() {
            esp_idf_sys::esp_reset_reason_t_ESP_RST_POWERON => "power_on",
            esp_idf_sys::esp_reset_reason_t_ESP_RST_SW => "software",
            esp_idf_sys::esp_reset_reason_t_ESP_RST_PANIC => "panic",
            esp_idf_sys::esp_reset_reason_t_ESP_RST_TASK_WDT
            | esp_idf_sys::esp_reset_reason_t_ESP_RST_INT_WDT
            | esp_idf_sys::esp_reset_reason_t_ESP_RST_WDT => "watchdog",
            esp_idf_sys::esp_reset_reason_t_ESP_RST_BROWNOUT => "brownout",
            _ => "other",
        }
    }
}
