//! The two-wire bus seen by the controller.
//!
//! Addresses passed to a `BusTransport` are the 7-bit device address shifted left by one, the way the chip's
//! datasheet writes them. `I2cBus` adapts any `embedded_hal::i2c::I2c` (which takes 7-bit addresses) to this trait.

use embedded_hal::i2c::I2c;
use std::fmt::Debug;

///Blocking register-level access to a device on a two-wire bus. Implementations make a single attempt per call.
pub trait BusTransport {
    type Error: Debug;

    ///Write `bytes` to the device in one transaction. Returns an error if the device does not acknowledge.
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    ///Write `bytes` without a stop condition, then read `buffer.len()` bytes back (repeated start).
    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    type Error = T::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(address, bytes)
    }

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
        (**self).write_read(address, bytes, buffer)
    }
}

///`BusTransport` over an embedded-hal 1.0 I2C bus.
pub struct I2cBus<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> I2cBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    ///Give back the wrapped bus
    pub fn into_inner(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> BusTransport for I2cBus<I2C> {
    type Error = I2C::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(address >> 1, bytes)
    }

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(address >> 1, bytes, buffer)
    }
}
