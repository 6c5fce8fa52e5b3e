//!This library provides access to the Raspberry Pi I2C buses. It is a wrapper around the rppal library.
//!
//! `get_bus` opens a bus that can be used to construct modules in `pwmc_devices`, and `get_delay` provides the
//! blocking delay the PCA9685 driver waits with.

//internal error type for rpi i2c
pub mod error;

use error::RpiError;
use pwmc_core::I2cBus;
use tracing::debug;

pub use rppal;
pub use rppal::{hal::Delay, i2c::I2c};

//get i2c bus by id
pub fn get_bus(bus: u8) -> Result<I2cBus<I2c>, RpiError> {
    let i2c = I2c::with_bus(bus)?;
    debug!("opened i2c bus {} at {} Hz", bus, i2c.clock_speed().unwrap_or(0));
    Ok(I2cBus::new(i2c))
}

pub fn get_delay() -> Delay {
    Delay::new()
}
