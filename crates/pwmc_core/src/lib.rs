//!This is the core library for the pwmc project. It drives a PCA9685 16 channel, 12 bit PWM controller over I2C.
//!
//! The `Pca9685` controller owns a `DeviceHandle` (bus address and the cached oscillator frequency), a `BusTransport`
//! and a delay. Every operation that touches the bus returns a `Result`, so callers can decide whether a missing
//! acknowledgment should be propagated or ignored.

pub mod bits;
pub mod bus;
pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod handle;
pub mod prescale;
pub mod registers;
pub mod sim;

pub use bus::{BusTransport, I2cBus};
pub use channel::{Channel, PwmTicks};
pub use config::{ClockSource, OutputDriver};
pub use controller::Pca9685;
pub use error::Error;
pub use handle::DeviceHandle;
