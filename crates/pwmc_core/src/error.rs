//!A mod for the error types
use std::fmt::Debug;

///Errors returned by the `Pca9685` controller. `E` is the error type of the `BusTransport`.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: Debug> {
    ///The device did not acknowledge a register write.
    #[error("no acknowledgment writing register 0x{register:02x}: {cause:?}")]
    Write { register: u8, cause: E },

    ///The device did not acknowledge a register read (or the register select write before it).
    #[error("no acknowledgment reading register 0x{register:02x}: {cause:?}")]
    Read { register: u8, cause: E },

    #[error("invalid channel {0}, the PCA9685 has channels 0 to 15")]
    InvalidChannel(u8),
}

impl<E: Debug> Error<E> {
    ///true when the bus reported a missing acknowledgment
    pub fn is_bus_error(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Read { .. })
    }

    ///The register that was being accessed, if any
    pub fn register(&self) -> Option<u8> {
        match self {
            Self::Write { register, .. } | Self::Read { register, .. } => Some(*register),
            Self::InvalidChannel(_) => None,
        }
    }
}
