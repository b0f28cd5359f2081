use std::time::Duration;

use crate::protocol::Value;
use crate::transport::TransportError;

/// Errors surfaced to callers of the mixer API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A blocking wait reached its deadline without a matching notification.
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// The value does not fit the 35-bit wire format.
    #[error("value {0} is outside the transmittable range")]
    ValueOutOfRange(Value),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The frame delivery task is gone; no reply can arrive any more.
    #[error("mixer connection closed")]
    Closed,
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
