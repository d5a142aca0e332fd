use ulid::Ulid;

use crate::limits::{MAX_ROOMS_PER_BOOKING, MIN_ROOMS_PER_BOOKING};

/// Failures raised by a room store.
#[derive(Debug)]
pub enum StoreError {
    /// A batch named a room the store does not hold; nothing was written.
    UnknownRoom(Ulid),
    WalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnknownRoom(id) => write!(f, "unknown room: {id}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug)]
pub enum EngineError {
    /// Requested block size, or `None` when the request did not carry an integer.
    InvalidRoomCount(Option<i64>),
    NoAvailability { requested: usize },
    /// Room numbers that were taken between selection and commit.
    Conflict(Vec<u32>),
    Store(StoreError),
}

impl EngineError {
    /// Caller-side failures (bad input, nothing free, lost a race) as opposed to
    /// faults inside the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::Store(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRoomCount(_) => write!(
                f,
                "Invalid number of rooms. Must be between {MIN_ROOMS_PER_BOOKING} and {MAX_ROOMS_PER_BOOKING}."
            ),
            EngineError::NoAvailability { .. } => write!(f, "No suitable rooms available."),
            EngineError::Conflict(_) => write!(
                f,
                "Selected rooms were just booked by another request. Please retry."
            ),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}
