use core::ops::Range;

use crate::config::{Sentinel, SENTINEL_OFFSET};
use crate::error::StoreError;

/// Size of the emulated EEPROM on the device.
pub const STORE_CAPACITY: usize = 512;

/// Largest record the typed layer will read or write.
const MAX_RECORD_SIZE: usize = 32;

/// Raw non-volatile byte store, addressed by offset.
///
/// Writes are treated as atomic. There is no partial-write recovery.
pub trait ByteStore {
    fn capacity(&self) -> usize;

    /// Fill `buf` from `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Write `data` at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StoreError>;

    /// Zero the whole store.
    fn erase(&mut self) -> Result<(), StoreError> {
        let zeros = [0u8; 64];
        let capacity = self.capacity();
        let mut offset = 0;
        while offset < capacity {
            let n = (capacity - offset).min(zeros.len());
            self.write(offset, &zeros[..n])?;
            offset += n;
        }
        Ok(())
    }
}

/// Bounds-check an access and return the byte range it covers.
pub fn span(offset: usize, len: usize, capacity: usize) -> Result<Range<usize>, StoreError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(offset..end),
        _ => Err(StoreError::OutOfRange {
            offset,
            len,
            capacity,
        }),
    }
}

/// A fixed-size structured record with an explicit byte layout.
pub trait Record: Sized {
    const SIZE: usize;

    /// Write the record into `buf`, which is exactly `SIZE` bytes.
    fn encode(&self, buf: &mut [u8]);

    /// Read the record from `buf`, which is exactly `SIZE` bytes.
    fn decode(buf: &[u8]) -> Self;
}

/// Typed record access on top of a [`ByteStore`].
pub struct RecordStore<S> {
    inner: S,
}

impl<S: ByteStore> RecordStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn read_record<R: Record>(&self, offset: usize) -> Result<R, StoreError> {
        debug_assert!(R::SIZE <= MAX_RECORD_SIZE);
        let mut buf = [0u8; MAX_RECORD_SIZE];
        let buf = &mut buf[..R::SIZE];
        self.inner.read(offset, buf)?;
        Ok(R::decode(buf))
    }

    pub fn write_record<R: Record>(&mut self, offset: usize, record: &R) -> Result<(), StoreError> {
        debug_assert!(R::SIZE <= MAX_RECORD_SIZE);
        let mut buf = [0u8; MAX_RECORD_SIZE];
        let buf = &mut buf[..R::SIZE];
        record.encode(buf);
        self.inner.write(offset, buf)
    }

    pub fn read_sentinel(&self) -> Result<Sentinel, StoreError> {
        let mut byte = [0u8; 1];
        self.inner.read(SENTINEL_OFFSET, &mut byte)?;
        Ok(Sentinel::from_byte(byte[0]))
    }

    pub fn write_sentinel(&mut self, sentinel: Sentinel) -> Result<(), StoreError> {
        self.inner.write(SENTINEL_OFFSET, &[sentinel.as_byte()])
    }

    pub fn erase(&mut self) -> Result<(), StoreError> {
        self.inner.erase()
    }
}

/// RAM-backed store. Starts filled with `0xFF` like blank flash.
#[derive(Debug, Clone)]
pub struct MemStore {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0xFF; capacity],
            writes: 0,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of write calls since creation.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(STORE_CAPACITY)
    }
}

impl ByteStore for MemStore {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        let range = span(offset, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StoreError> {
        let range = span(offset, data.len(), self.bytes.len())?;
        self.bytes[range].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}
