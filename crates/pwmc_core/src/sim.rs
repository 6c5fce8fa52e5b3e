//! In-memory PCA9685 for running the controller without hardware.
//!
//! `SimulatedChip` keeps a register file and a log of every bus transaction. Clones share the same chip, so a test
//! (or a dry run of the service) can hand one clone to the controller and inspect the other.

use crate::bits::is_set;
use crate::bus::BusTransport;
use crate::registers::{mode1, DEFAULT_ADDRESS, MODE1, MODE2, PRE_SCALE};
use embedded_hal::delay::DelayNs;
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tracing::trace;

const POWER_ON_MODE1: u8 = mode1::SLEEP | mode1::ALLCALL;
const POWER_ON_MODE2: u8 = 0x04;
///200 Hz with the internal oscillator
const POWER_ON_PRESCALE: u8 = 0x1E;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("no acknowledgment from bus address 0x{0:02x}")]
    Nack(u8),
}

///A bus transaction seen by the simulated chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { address: u8, bytes: Vec<u8> },
    WriteRead { address: u8, bytes: Vec<u8>, read_len: usize },
}

struct ChipState {
    bus_address: u8,
    registers: [u8; 256],
    log: Vec<Transaction>,
    nack: bool,
    nack_register: Option<u8>,
}

impl ChipState {
    fn auto_increment(&self) -> bool {
        is_set(self.registers[MODE1 as usize], mode1::AI)
    }

    fn sleeping(&self) -> bool {
        is_set(self.registers[MODE1 as usize], mode1::SLEEP)
    }

    fn store(&mut self, register: u8, value: u8) {
        //the prescaler can only be changed while the oscillator is off
        if register == PRE_SCALE && !self.sleeping() {
            trace!("simulated PCA9685 ignored PRE_SCALE write while awake");
            return;
        }
        self.registers[register as usize] = value;
    }
}

#[derive(Clone)]
pub struct SimulatedChip {
    state: Arc<Mutex<ChipState>>,
}

impl SimulatedChip {
    ///A chip answering on the given 7-bit address, with power-on register values
    pub fn new(address: u8) -> Self {
        let mut registers = [0u8; 256];
        registers[MODE1 as usize] = POWER_ON_MODE1;
        registers[MODE2 as usize] = POWER_ON_MODE2;
        registers[PRE_SCALE as usize] = POWER_ON_PRESCALE;
        Self {
            state: Arc::new(Mutex::new(ChipState {
                bus_address: (address & 0x7F) << 1,
                registers,
                log: Vec::new(),
                nack: false,
                nack_register: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChipState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    ///When set, every transaction fails as if the chip did not acknowledge
    pub fn set_nack(&self, nack: bool) {
        self.state().nack = nack;
    }

    ///When set, writes to this one register fail and everything else succeeds
    pub fn set_nack_register(&self, register: Option<u8>) {
        self.state().nack_register = register;
    }

    pub fn register(&self, register: u8) -> u8 {
        self.state().registers[register as usize]
    }

    ///Set a register directly, bypassing the bus and the log
    pub fn set_register(&self, register: u8, value: u8) {
        self.state().registers[register as usize] = value;
    }

    pub fn log(&self) -> Vec<Transaction> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    ///Values written to `register` by single register writes, in order
    pub fn writes_to(&self, register: u8) -> Vec<u8> {
        self.state()
            .log
            .iter()
            .filter_map(|t| match t {
                Transaction::Write { bytes, .. } if bytes.len() == 2 && bytes[0] == register => {
                    Some(bytes[1])
                }
                _ => None,
            })
            .collect()
    }
}

impl Default for SimulatedChip {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

impl BusTransport for SimulatedChip {
    type Error = SimError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), SimError> {
        let mut state = self.state();
        state.log.push(Transaction::Write {
            address,
            bytes: bytes.to_vec(),
        });
        if state.nack || address != state.bus_address {
            return Err(SimError::Nack(address));
        }
        if state.nack_register.is_some() && bytes.first().copied() == state.nack_register {
            return Err(SimError::Nack(address));
        }
        if let Some((&register, values)) = bytes.split_first() {
            let step = if state.auto_increment() { 1 } else { 0 };
            let mut pointer = register;
            for &value in values {
                state.store(pointer, value);
                pointer = pointer.wrapping_add(step);
            }
        }
        Ok(())
    }

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), SimError> {
        let mut state = self.state();
        state.log.push(Transaction::WriteRead {
            address,
            bytes: bytes.to_vec(),
            read_len: buffer.len(),
        });
        if state.nack || address != state.bus_address {
            return Err(SimError::Nack(address));
        }
        let step = if state.auto_increment() { 1 } else { 0 };
        let mut pointer = bytes.first().copied().unwrap_or(MODE1);
        for slot in buffer.iter_mut() {
            *slot = state.registers[pointer as usize];
            pointer = pointer.wrapping_add(step);
        }
        Ok(())
    }
}

///`DelayNs` that returns immediately. Used with `SimulatedChip` for dry runs, where nothing needs to settle.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

///`DelayNs` that returns immediately and remembers what was asked for.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, wait: Duration) {
        match self.waits.lock() {
            Ok(mut waits) => waits.push(wait),
            Err(poisoned) => poisoned.into_inner().push(wait),
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        match self.waits.lock() {
            Ok(waits) => waits.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.push(Duration::from_nanos(ns as u64));
    }

    fn delay_us(&mut self, us: u32) {
        self.push(Duration::from_micros(us as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.push(Duration::from_millis(ms as u64));
    }
}
