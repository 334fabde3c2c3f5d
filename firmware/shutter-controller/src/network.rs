use std::net::Ipv4Addr;

use esp_idf_hal::gpio::{self, Gpio12, Gpio17, Gpio18, Gpio19, Gpio21, Gpio22, Gpio23, Gpio25, Gpio26, Gpio27};
use esp_idf_hal::mac::MAC;
use esp_idf_svc::eth::{BlockingEth, EspEth, EthDriver, RmiiClockConfig, RmiiEth, RmiiEthChipset};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::ipv4::{self, ClientConfiguration, ClientSettings, Mask, Subnet};
use esp_idf_svc::netif::{EspNetif, NetifConfiguration};
use esp_idf_sys::EspError;
use log::info;

use crate::config::NetworkIdentity;

/// RMII pins for a LAN8720 PHY (ESP32-POE layout).
pub struct EthPins {
    pub rdx0: Gpio25,
    pub rdx1: Gpio26,
    pub crs_dv: Gpio27,
    pub mdc: Gpio23,
    pub txd1: Gpio22,
    pub tx_en: Gpio21,
    pub txd0: Gpio19,
    pub mdio: Gpio18,
    pub clk: Gpio17,
    pub power: Gpio12,
}

/// Wired network interface with a fixed address taken from the identity.
pub struct NetworkInterface {
    eth: BlockingEth<EspEth<'static, RmiiEth>>,
}

impl NetworkInterface {
    /// Bring up Ethernet with the persisted MAC and a static /24 address.
    pub fn start(
        mac: MAC,
        pins: EthPins,
        identity: &NetworkIdentity,
        sysloop: EspSystemEventLoop,
    ) -> Result<Self, EspError> {
        info!("Initializing Ethernet...");

        // The MAC must be set before the driver reads it.
        unsafe {
            esp_idf_sys::esp!(esp_idf_sys::esp_iface_mac_addr_set(
                identity.mac.as_ptr(),
                esp_idf_sys::esp_mac_type_t_ESP_MAC_ETH,
            ))?;
        }

        let driver = EthDriver::new_rmii(
            mac,
            pins.rdx0,
            pins.rdx1,
            pins.crs_dv,
            pins.mdc,
            pins.txd1,
            pins.tx_en,
            pins.txd0,
            pins.mdio,
            RmiiClockConfig::<gpio::Gpio0, gpio::Gpio16, gpio::Gpio17>::OutputInvertedGpio17(
                pins.clk,
            ),
            Some(pins.power),
            RmiiEthChipset::LAN87XX,
            Some(0),
            sysloop.clone(),
        )?;

        let netif = EspNetif::new_with_conf(&NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(ClientConfiguration::Fixed(
                ClientSettings {
                    ip: identity.shutter_ip,
                    subnet: Subnet {
                        gateway: gateway_for(identity.shutter_ip),
                        mask: Mask(24),
                    },
                    dns: None,
                    secondary_dns: None,
                },
            ))),
            ..NetifConfiguration::eth_default_client()
        })?;

        let eth = EspEth::wrap_all(driver, netif)?;
        let mut eth = BlockingEth::wrap(eth, sysloop)?;
        eth.start()?;
        eth.wait_netif_up()?;

        info!(
            "Ethernet up: {} (mac {})",
            identity.shutter_ip,
            identity.mac_string()
        );
        Ok(Self { eth })
    }

    /// Link state; reads as down if the driver cannot be queried.
    pub fn is_up(&self) -> bool {
        self.eth.is_up().unwrap_or(false)
    }
}

/// Gateway is `.1` on the shutter's /24.
fn gateway_for(ip: Ipv4Addr) -> Ipv4Addr {
    let o = ip.octets();
    Ipv4Addr::new(o[0], o[1], o[2], 1)
}
