use core::fmt;

/// Errors from the byte store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Access past the end of the store. Record offsets are constants, so
    /// this is a firmware bug rather than bad input.
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    /// The backing medium reported an error code.
    Backend(i32),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "access of {} bytes at offset {} exceeds capacity {}",
                len, offset, capacity
            ),
            Self::Backend(code) => write!(f, "storage backend error {}", code),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors surfaced by one turn of the serve loop.
#[derive(Debug)]
pub enum ServeError {
    /// Persisting state failed. Fatal: the device restarts.
    Store(StoreError),
    /// Receiving from the socket failed.
    Transport(std::io::Error),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for ServeError {}

impl From<StoreError> for ServeError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
