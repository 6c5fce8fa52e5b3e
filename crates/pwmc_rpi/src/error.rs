use std::fmt::{Debug, Formatter};

use pwmc_devices::error::BuildError;

pub struct RpiError {
    pub message: String,
}

impl Debug for RpiError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        fmt.write_str(&self.message)
    }
}

impl From<&str> for RpiError {
    fn from(s: &str) -> Self {
        Self {
            message: s.to_string(),
        }
    }
}

impl From<rppal::i2c::Error> for RpiError {
    fn from(err: rppal::i2c::Error) -> Self {
        Self {
            message: format!("RpiI2cError - Cause: {}", err),
        }
    }
}

impl From<RpiError> for BuildError {
    fn from(err: RpiError) -> Self {
        BuildError::from_string(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_build_error() {
        let err: BuildError = RpiError::from("bus 7 missing").into();
        assert_eq!(err.to_string(), "bus 7 missing");
    }
}
