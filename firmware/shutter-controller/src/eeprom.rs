use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_sys::EspError;
use log::{info, warn};

use crate::error::StoreError;
use crate::store::{span, ByteStore, STORE_CAPACITY};

const NVS_NAMESPACE: &str = "shutter";
const KEY_IMAGE: &str = "eeprom";

/// Byte-addressed store emulated on top of NVS.
///
/// The full image is kept in RAM and written back as a single blob on every
/// write, so each write is committed atomically by NVS.
pub struct NvsEeprom {
    nvs: EspNvs<NvsDefault>,
    image: [u8; STORE_CAPACITY],
}

impl NvsEeprom {
    pub fn new(nvs_partition: EspNvsPartition<NvsDefault>) -> Result<Self, EspError> {
        let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)?;
        let mut image = [0xFF; STORE_CAPACITY];

        let found = nvs.get_raw(KEY_IMAGE, &mut image)?.map(|blob| blob.len());
        match found {
            Some(STORE_CAPACITY) => info!("Loaded {}-byte store image", STORE_CAPACITY),
            Some(len) => {
                warn!("Store image has {} bytes, expected {}; starting blank", len, STORE_CAPACITY);
                image = [0xFF; STORE_CAPACITY];
            }
            None => info!("No store image; starting blank"),
        }

        Ok(Self { nvs, image })
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.nvs
            .set_raw(KEY_IMAGE, &self.image)
            .map(|_| ())
            .map_err(|e| StoreError::Backend(e.code()))
    }
}

impl ByteStore for NvsEeprom {
    fn capacity(&self) -> usize {
        STORE_CAPACITY
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        let range = span(offset, buf.len(), STORE_CAPACITY)?;
        buf.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StoreError> {
        let range = span(offset, data.len(), STORE_CAPACITY)?;
        self.image[range].copy_from_slice(data);
        self.commit()
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        self.image = [0u8; STORE_CAPACITY];
        self.commit()
    }
}
