//! Shutter controller firmware library.
//!
//! Everything except the ESP-IDF adapters builds and tests on the host.
//! Device-only modules are behind the `espidf` feature.

pub mod actuator;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod provisioning;
pub mod servo;
pub mod store;
pub mod transport;

#[cfg(feature = "espidf")]
pub mod eeprom;
#[cfg(feature = "espidf")]
pub mod network;
#[cfg(feature = "espidf")]
pub mod system;

pub use dispatch::{Flow, Outcome, Shutter};
pub use error::{ServeError, StoreError};
