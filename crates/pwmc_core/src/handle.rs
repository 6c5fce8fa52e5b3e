use crate::registers::{DEFAULT_ADDRESS, FREQUENCY_OSCILLATOR};

///Software side state of one chip: where it lives on the bus, and the oscillator frequency used for the frequency
/// and pulse width math. The chip cannot report its real oscillator frequency, so this is whatever the caller says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle {
    address: u8,
    oscillator_hz: u32,
}

impl DeviceHandle {
    ///`address` is the 7-bit I2C address of the chip (0x40 to 0x7F depending on the address pins)
    pub fn new(address: u8) -> Self {
        Self {
            address: address & 0x7F,
            oscillator_hz: FREQUENCY_OSCILLATOR,
        }
    }

    pub fn with_oscillator(address: u8, oscillator_hz: u32) -> Self {
        Self {
            oscillator_hz,
            ..Self::new(address)
        }
    }

    ///7-bit I2C address
    pub fn address(&self) -> u8 {
        self.address
    }

    ///Address shifted left by one, as passed to a `BusTransport`
    pub fn bus_address(&self) -> u8 {
        self.address << 1
    }

    pub fn oscillator_hz(&self) -> u32 {
        self.oscillator_hz
    }

    pub(crate) fn set_oscillator_hz(&mut self, oscillator_hz: u32) {
        self.oscillator_hz = oscillator_hz;
    }
}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}
