use std::time::Duration;

use anyhow::{anyhow, Result};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::ledc::{config::TimerConfig, LedcTimerDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};
use shutter_controller::config::DeviceConfig;
use shutter_controller::eeprom::NvsEeprom;
use shutter_controller::network::{EthPins, NetworkInterface};
use shutter_controller::provisioning::{self, BootOutcome};
use shutter_controller::servo::{ServoDriver, PWM_FREQ_HZ};
use shutter_controller::store::RecordStore;
use shutter_controller::system::{self, EspNoise};
use shutter_controller::transport::{serve_once, UdpTransport};
use shutter_controller::{Flow, ServeError, Shutter};
use shutter_protocol::osc::MAX_PACKET_SIZE;

/// Grace period before a requested restart, so log output drains.
const RESTART_GRACE: Duration = Duration::from_secs(1);

/// Socket read timeout; bounds how long one poll blocks.
const POLL_TIMEOUT: Duration = Duration::from_millis(10);

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Shutter Controller v{}", env!("CARGO_PKG_VERSION"));
    info!("Reset reason: {}", system::reset_reason_str());

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // Provisioning runs before anything can reach the dispatcher
    let mut store = RecordStore::new(NvsEeprom::new(nvs_partition)?);
    let config = match provisioning::boot(&mut store, &mut EspNoise)? {
        BootOutcome::Provisioned => {
            info!("First boot setup complete");
            system::restart_after(RESTART_GRACE);
        }
        BootOutcome::Ready(config) => config,
    };
    log_config(&config);

    let pins = peripherals.pins;
    let net = NetworkInterface::start(
        peripherals.mac,
        EthPins {
            rdx0: pins.gpio25,
            rdx1: pins.gpio26,
            crs_dv: pins.gpio27,
            mdc: pins.gpio23,
            txd1: pins.gpio22,
            tx_en: pins.gpio21,
            txd0: pins.gpio19,
            mdio: pins.gpio18,
            clk: pins.gpio17,
            power: pins.gpio12,
        },
        &config.network,
        sysloop,
    )?;

    let timer_config = TimerConfig::default().frequency(PWM_FREQ_HZ.Hz().into());
    let timer = LedcTimerDriver::new(peripherals.ledc.timer0, &timer_config)?;
    let servo = ServoDriver::new(peripherals.ledc.channel0, timer);

    let mut shutter = Shutter::start(store, config, servo, FreeRtos)
        .map_err(|e| anyhow!("servo init failed: {:?}", e))?;
    info!("Shutter {} at {}°", shutter.status().as_str(), shutter.current_angle());

    let mut transport = UdpTransport::bind(config.network.shutter_port, POLL_TIMEOUT)?;
    let mut buf = [0u8; MAX_PACKET_SIZE];

    info!("Shutter controller running. Waiting for OSC commands...");

    loop {
        match serve_once(&mut shutter, &mut transport, &mut buf) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Restart) => system::restart_after(RESTART_GRACE),
            Err(ServeError::Transport(e)) => {
                warn!("Receive failed: {} (link up: {})", e, net.is_up());
                FreeRtos::delay_ms(100);
            }
            Err(ServeError::Store(e)) => {
                error!("Store failure, restarting: {}", e);
                system::restart_after(RESTART_GRACE);
            }
        }
    }
}

fn log_config(config: &DeviceConfig) {
    let net = &config.network;
    info!("Shutter IP Address: {}", net.shutter_ip);
    info!("Shutter Port: {}", net.shutter_port);
    info!("Master IP Address: {}", net.master_ip);
    info!("Master Port: {}", net.master_port);
    info!("MAC: {}", net.mac_string());
    let cal = &config.calibration;
    info!(
        "Closed: {}° Open: {}° Servo pin: {}",
        cal.closed, cal.open, cal.pin
    );
}
