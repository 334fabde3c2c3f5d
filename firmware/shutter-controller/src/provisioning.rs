use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{
    Calibration, DeviceConfig, NetworkIdentity, Sentinel, CALIBRATION_OFFSET, NETWORK_OFFSET,
};
use crate::error::StoreError;
use crate::store::{ByteStore, RecordStore};

/// Source of an environmental noise reading used to seed the MAC generator.
pub trait NoiseSource {
    fn sample(&mut self) -> u32;
}

/// Boot states. The initial state comes from the sentinel byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Unprovisioned,
    LoadingConfig,
    Operational,
}

impl BootState {
    pub fn initial(sentinel: Sentinel) -> Self {
        match sentinel {
            Sentinel::Marked => BootState::LoadingConfig,
            Sentinel::Unset => BootState::Unprovisioned,
        }
    }
}

/// Result of running the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Factory defaults were written. The device must restart before serving.
    Provisioned,
    /// Configuration loaded; the device is operational.
    Ready(DeviceConfig),
}

/// Decide between first-time setup and loading the stored configuration.
pub fn boot<S: ByteStore, N: NoiseSource>(
    store: &mut RecordStore<S>,
    noise: &mut N,
) -> Result<BootOutcome, StoreError> {
    let state = BootState::initial(store.read_sentinel()?);
    debug!("boot state: {:?}", state);

    if state == BootState::Unprovisioned {
        provision(store, noise)?;
        return Ok(BootOutcome::Provisioned);
    }

    // The sentinel is the only consistency check; record contents are trusted.
    let config = load(store)?;
    debug!("boot state: {:?}", BootState::Operational);
    Ok(BootOutcome::Ready(config))
}

/// Erase the store, write factory records, then mark the sentinel.
///
/// The sentinel is written last so an interrupted run is retried on the next boot.
pub fn provision<S: ByteStore, N: NoiseSource>(
    store: &mut RecordStore<S>,
    noise: &mut N,
) -> Result<DeviceConfig, StoreError> {
    info!("Provisioning factory configuration...");
    store.erase()?;
    info!("Store cleared");

    let mut rng = SmallRng::seed_from_u64(noise.sample() as u64);
    let mut suffix = [0u8; 3];
    for b in suffix.iter_mut() {
        *b = rng.gen_range(0..255);
    }
    let network = NetworkIdentity::factory(suffix);
    info!("Generated MAC {}", network.mac_string());

    store.write_record(NETWORK_OFFSET, &network)?;
    info!("Network settings stored");

    let calibration = Calibration::factory();
    store.write_record(CALIBRATION_OFFSET, &calibration)?;
    info!("Servo settings stored");

    store.write_sentinel(Sentinel::Marked)?;
    info!("Board configured");

    Ok(DeviceConfig {
        network,
        calibration,
    })
}

/// Read both records from their fixed offsets.
pub fn load<S: ByteStore>(store: &RecordStore<S>) -> Result<DeviceConfig, StoreError> {
    let network: NetworkIdentity = store.read_record(NETWORK_OFFSET)?;
    let calibration: Calibration = store.read_record(CALIBRATION_OFFSET)?;
    Ok(DeviceConfig {
        network,
        calibration,
    })
}

/// Clear the sentinel so the next boot provisions from scratch.
pub fn mark_unprovisioned<S: ByteStore>(store: &mut RecordStore<S>) -> Result<(), StoreError> {
    store.write_sentinel(Sentinel::Unset)
}
