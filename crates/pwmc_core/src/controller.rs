//! The PCA9685 clock and channel controller.

use crate::{
    bits::{with_bit, with_bit_cleared, with_bit_set},
    bus::BusTransport,
    channel::{ticks_for_value, Channel, PwmTicks},
    config::{ClockSource, OutputDriver},
    error::Error,
    handle::DeviceHandle,
    prescale::{frequency_for_prescale, prescale_for_frequency, ticks_for_pulse},
    registers::{mode1, mode2, MODE1, MODE2, PRE_SCALE, RESET_DELAY_MS, SLEEP_DELAY_MS},
};
use embedded_hal::delay::DelayNs;
use std::fmt::Debug;
use tracing::{debug, warn};

///Tick fields are 12 bits plus the FULL_ON/FULL_OFF bit
const TICK_FIELD_MASK: u16 = 0x1FFF;

///Keeps running a register sequence after a failed write and remembers the first failure.
struct Sequence<E: Debug> {
    first_error: Option<Error<E>>,
}

impl<E: Debug> Sequence<E> {
    fn new() -> Self {
        Self { first_error: None }
    }

    fn step<T>(&mut self, res: Result<T, Error<E>>) {
        if let Err(err) = res {
            if self.first_error.is_none() {
                self.first_error = Some(err);
            }
        }
    }

    fn finish(self) -> Result<(), Error<E>> {
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

///Driver for one PCA9685 on a bus.
///
/// Register sequences are not atomic on the bus. If more than one task can reach the same chip, wrap the whole
/// controller in a mutex and hold it for the duration of each call.
pub struct Pca9685<B, D> {
    bus: B,
    delay: D,
    handle: DeviceHandle,
}

impl<B, D> Pca9685<B, D>
where
    B: BusTransport,
    D: DelayNs,
{
    pub fn new(bus: B, delay: D, handle: DeviceHandle) -> Self {
        Self { bus, delay, handle }
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    ///Give back the bus and the delay
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    ///Reset the chip and set up its clock. `ClockSource::default()` runs the internal oscillator at 1 kHz.
    pub fn begin(&mut self, clock: ClockSource) -> Result<(), Error<B::Error>> {
        let mut seq = Sequence::new();
        seq.step(self.reset());
        match clock {
            ClockSource::External { prescale } => seq.step(self.set_external_clock(prescale)),
            ClockSource::Internal { frequency_hz } => seq.step(self.set_pwm_frequency(frequency_hz)),
        }
        seq.finish()
    }

    ///Restart the chip. Blocks for 10ms while the chip runs its restart sequence.
    pub fn reset(&mut self) -> Result<(), Error<B::Error>> {
        debug!("resetting PCA9685 at 0x{:02x}", self.handle.address());
        let res = self.write_register(MODE1, mode1::RESTART);
        self.delay.delay_ms(RESET_DELAY_MS);
        res
    }

    ///Put the chip in low power mode. Blocks for 5ms so the running PWM cycle can end.
    pub fn sleep(&mut self) -> Result<(), Error<B::Error>> {
        let awake = self.read_register(MODE1)?;
        let res = self.write_register(MODE1, with_bit_set(awake, mode1::SLEEP));
        self.delay.delay_ms(SLEEP_DELAY_MS);
        res
    }

    ///Clear the SLEEP bit.
    ///
    /// This does not wait for the oscillator: it needs up to 500us to stabilize, and outputs should not be driven
    /// before then.
    pub fn wakeup(&mut self) -> Result<(), Error<B::Error>> {
        let sleeping = self.read_register(MODE1)?;
        self.write_register(MODE1, with_bit_cleared(sleeping, mode1::SLEEP))
    }

    ///Switch to the clock on the EXTCLK pin, divided by `prescale`.
    ///
    /// EXTCLK can only be set while sleeping, and once set it sticks until the next power cycle.
    pub fn set_external_clock(&mut self, prescale: u8) -> Result<(), Error<B::Error>> {
        let old_mode = self.read_register(MODE1)?;
        let sleep_mode = with_bit_set(with_bit_cleared(old_mode, mode1::RESTART), mode1::SLEEP);
        let ext_mode = with_bit_set(sleep_mode, mode1::EXTCLK);
        let run_mode = with_bit_set(
            with_bit_cleared(ext_mode, mode1::SLEEP),
            mode1::RESTART | mode1::AI,
        );

        let mut seq = Sequence::new();
        seq.step(self.write_register(MODE1, sleep_mode));
        seq.step(self.write_register(MODE1, ext_mode));
        seq.step(self.write_register(PRE_SCALE, prescale));
        self.delay.delay_ms(SLEEP_DELAY_MS);
        seq.step(self.write_register(MODE1, run_mode));

        debug!("external clock enabled, mode now 0x{:02x}", run_mode);
        seq.finish()
    }

    ///Set the PWM frequency of all channels. The frequency is clamped to 1..=3500 Hz, and the resulting prescale
    /// to 3..=255. Returns the prescale value written.
    pub fn set_pwm_frequency(&mut self, freq_hz: f32) -> Result<u8, Error<B::Error>> {
        debug!("attempting to set PWM frequency to {} Hz", freq_hz);
        let prescale = prescale_for_frequency(self.handle.oscillator_hz(), freq_hz);
        debug!(
            "final prescale: {}, chip will run at {} Hz",
            prescale,
            frequency_for_prescale(self.handle.oscillator_hz(), prescale)
        );

        let old_mode = self.read_register(MODE1)?;
        let sleep_mode = with_bit_set(with_bit_cleared(old_mode, mode1::RESTART), mode1::SLEEP);

        let mut seq = Sequence::new();
        seq.step(self.write_register(MODE1, sleep_mode));
        seq.step(self.write_register(PRE_SCALE, prescale));
        //restore the previous bits (EXTCLK among them) before restarting
        seq.step(self.write_register(MODE1, old_mode));
        self.delay.delay_ms(SLEEP_DELAY_MS);
        seq.step(self.write_register(MODE1, with_bit_set(old_mode, mode1::RESTART | mode1::AI)));

        seq.finish().map(|_| prescale)
    }

    ///Select totem pole or open drain outputs
    pub fn set_output_mode(&mut self, driver: OutputDriver) -> Result<(), Error<B::Error>> {
        let old_mode = self.read_register(MODE2)?;
        let new_mode = with_bit(old_mode, mode2::OUTDRV, driver == OutputDriver::TotemPole);
        debug!("setting output mode {:?}, MODE2 now 0x{:02x}", driver, new_mode);
        self.write_register(MODE2, new_mode)
    }

    pub fn read_prescale(&mut self) -> Result<u8, Error<B::Error>> {
        self.read_register(PRE_SCALE)
    }

    ///Read the ON_L register of a channel, the low byte of its on tick.
    ///
    /// Use `read_channel` to get the full on/off pair.
    pub fn get_channel_pwm(&mut self, channel: u8) -> Result<u8, Error<B::Error>> {
        let channel = Self::channel(channel)?;
        self.read_register(channel.base_register())
    }

    ///Read the on and off ticks of a channel. Requires auto-increment, which `begin` and the clock setters enable.
    pub fn read_channel(&mut self, channel: u8) -> Result<PwmTicks, Error<B::Error>> {
        let channel = Self::channel(channel)?;
        let mut buffer = [0u8; 4];
        self.read_registers(channel.base_register(), &mut buffer)?;
        Ok(PwmTicks::from_bytes(buffer))
    }

    ///Set the tick at which a channel turns on and the tick at which it turns off, in one bus transaction.
    pub fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), Error<B::Error>> {
        let channel = Self::channel(channel)?;
        debug!("setting PWM {}: {}->{}", channel, on, off);
        let ticks = PwmTicks::new(on & TICK_FIELD_MASK, off & TICK_FIELD_MASK);
        let register = channel.base_register();
        let [on_l, on_h, off_l, off_h] = ticks.to_bytes();
        self.bus
            .write(self.handle.bus_address(), &[register, on_l, on_h, off_l, off_h])
            .map_err(|cause| {
                warn!("setPWM: no ack on i2c write for channel {}: {:?}", channel, cause);
                Error::Write { register, cause }
            })
    }

    ///Make a channel active for `ticks` out of 4095 (clamped), treating 0 as fully off and 4095 as fully on.
    /// `invert` flips the output for loads that sink to ground.
    pub fn set_channel_value(&mut self, channel: u8, ticks: u16, invert: bool) -> Result<(), Error<B::Error>> {
        let PwmTicks { on, off } = ticks_for_value(ticks, invert);
        self.set_pwm(channel, on, off)
    }

    ///Set a channel to a pulse `micros` long at the start of each cycle. Returns the tick count written.
    ///
    /// The result is approximate: it is limited by the integer prescale and the 12 bit counter, and pulses longer
    /// than the cycle are clamped to 4095 ticks.
    pub fn set_pulse_microseconds(&mut self, channel: u8, micros: u32) -> Result<u16, Error<B::Error>> {
        let channel = Self::channel(channel)?;
        let prescale = self.read_prescale()?;
        let ticks = ticks_for_pulse(self.handle.oscillator_hz(), prescale, micros);
        debug!(
            "{}us on channel {} is {} ticks with prescale {}",
            micros, channel, ticks, prescale
        );
        self.set_pwm(channel.index(), 0, ticks)?;
        Ok(ticks)
    }

    ///The oscillator frequency used for frequency and pulse calculations.
    pub fn oscillator_frequency(&self) -> u32 {
        self.handle.oscillator_hz()
    }

    ///Set the oscillator frequency used for calculations. Does not touch the chip.
    pub fn set_oscillator_frequency(&mut self, oscillator_hz: u32) {
        self.handle.set_oscillator_hz(oscillator_hz);
    }

    fn channel(index: u8) -> Result<Channel, Error<B::Error>> {
        Channel::try_from(index).map_err(Error::InvalidChannel)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<B::Error>> {
        self.bus
            .write(self.handle.bus_address(), &[register, value])
            .map_err(|cause| {
                warn!("I2C ERR: no ack writing 0x{:02x} to register 0x{:02x}: {:?}", value, register, cause);
                Error::Write { register, cause }
            })
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error<B::Error>> {
        self.bus
            .write_read(self.handle.bus_address(), &[register], buffer)
            .map_err(|cause| {
                warn!("I2C ERR: no ack reading register 0x{:02x}: {:?}", register, cause);
                Error::Read { register, cause }
            })
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error<B::Error>> {
        let mut buffer = [0u8; 1];
        self.read_registers(register, &mut buffer)?;
        Ok(buffer[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        registers::{LED0_ON_L, PRESCALE_MAX, PRESCALE_MIN},
        sim::{RecordingDelay, SimError, SimulatedChip, Transaction},
    };
    use std::time::Duration;

    const BUS_ADDR: u8 = 0x80;

    fn controller() -> (Pca9685<SimulatedChip, RecordingDelay>, SimulatedChip, RecordingDelay) {
        let chip = SimulatedChip::default();
        let delay = RecordingDelay::new();
        let pca = Pca9685::new(chip.clone(), delay.clone(), DeviceHandle::default());
        (pca, chip, delay)
    }

    fn started() -> (Pca9685<SimulatedChip, RecordingDelay>, SimulatedChip, RecordingDelay) {
        let (mut pca, chip, delay) = controller();
        pca.begin(ClockSource::default()).unwrap();
        chip.clear_log();
        (pca, chip, delay)
    }

    #[test]
    fn test_reset() {
        let (mut pca, chip, delay) = controller();
        pca.reset().unwrap();
        assert_eq!(chip.writes_to(MODE1), vec![0x80]);
        assert_eq!(delay.waits(), vec![Duration::from_millis(10)]);
    }

    #[test]
    fn test_sleep_and_wakeup() {
        let (mut pca, chip, delay) = controller();
        chip.set_register(MODE1, mode1::RESTART | mode1::AI);

        pca.sleep().unwrap();
        assert_eq!(chip.register(MODE1), 0xB0);
        assert_eq!(delay.waits(), vec![Duration::from_millis(5)]);

        pca.wakeup().unwrap();
        assert_eq!(chip.register(MODE1), 0xA0);
        //no wait after wakeup
        assert_eq!(delay.waits().len(), 1);
    }

    #[test]
    fn test_external_clock_sequence() {
        let (mut pca, chip, delay) = controller();
        chip.set_register(MODE1, mode1::RESTART | mode1::AI | mode1::ALLCALL);

        pca.set_external_clock(200).unwrap();

        assert_eq!(
            chip.log(),
            vec![
                Transaction::WriteRead { address: BUS_ADDR, bytes: vec![MODE1], read_len: 1 },
                //RESTART cleared, SLEEP set
                Transaction::Write { address: BUS_ADDR, bytes: vec![MODE1, 0x31] },
                //same plus EXTCLK
                Transaction::Write { address: BUS_ADDR, bytes: vec![MODE1, 0x71] },
                Transaction::Write { address: BUS_ADDR, bytes: vec![PRE_SCALE, 200] },
                //SLEEP cleared, RESTART and AI set
                Transaction::Write { address: BUS_ADDR, bytes: vec![MODE1, 0xE1] },
            ]
        );
        assert_eq!(chip.register(PRE_SCALE), 200);
        assert_eq!(delay.waits(), vec![Duration::from_millis(5)]);
    }

    #[test]
    fn test_pwm_frequency_sequence() {
        let (mut pca, chip, delay) = controller();
        chip.set_register(MODE1, mode1::EXTCLK | mode1::ALLCALL);

        let prescale = pca.set_pwm_frequency(50.0).unwrap();

        assert_eq!(prescale, 121);
        //sleep, restore old mode (keeping EXTCLK), then restart with AI
        assert_eq!(chip.writes_to(MODE1), vec![0x51, 0x41, 0xE1]);
        assert_eq!(chip.writes_to(PRE_SCALE), vec![121]);
        assert_eq!(delay.waits(), vec![Duration::from_millis(5)]);
    }

    #[test]
    fn test_pwm_frequency_echo() {
        let (mut pca, _chip, _delay) = started();
        for freq in [1.0, 24.0, 50.0, 60.0, 200.0, 1000.0, 1600.0, 3500.0, 9000.0] {
            let written = pca.set_pwm_frequency(freq).unwrap();
            assert_eq!(pca.read_prescale().unwrap(), written);
            assert!((PRESCALE_MIN..=PRESCALE_MAX).contains(&written));
        }
    }

    #[test]
    fn test_begin() {
        let (mut pca, chip, delay) = controller();
        pca.begin(ClockSource::default()).unwrap();
        assert_eq!(chip.register(PRE_SCALE), 5);
        assert_eq!(chip.register(MODE1), mode1::RESTART | mode1::AI);
        assert_eq!(delay.total(), Duration::from_millis(15));

        let (mut pca, chip, _delay) = controller();
        pca.begin(ClockSource::External { prescale: 3 }).unwrap();
        assert_eq!(chip.register(PRE_SCALE), 3);
        assert_eq!(chip.register(MODE1), mode1::RESTART | mode1::AI | mode1::EXTCLK);
    }

    #[test]
    fn test_output_mode() {
        let (mut pca, chip, _delay) = controller();
        chip.set_register(MODE2, mode2::INVRT | mode2::OUTDRV);

        pca.set_output_mode(OutputDriver::OpenDrain).unwrap();
        assert_eq!(chip.register(MODE2), mode2::INVRT);

        pca.set_output_mode(true.into()).unwrap();
        assert_eq!(chip.register(MODE2), mode2::INVRT | mode2::OUTDRV);
    }

    #[test]
    fn test_set_pwm_writes_one_transaction() {
        let (mut pca, chip, _delay) = started();

        pca.set_pwm(3, 0x123, 0xFED).unwrap();

        assert_eq!(
            chip.log(),
            vec![Transaction::Write {
                address: BUS_ADDR,
                bytes: vec![LED0_ON_L + 12, 0x23, 0x01, 0xED, 0x0F],
            }]
        );
        assert_eq!(pca.read_channel(3).unwrap(), PwmTicks::new(0x123, 0xFED));
        assert_eq!(pca.get_channel_pwm(3).unwrap(), 0x23);
    }

    #[test]
    fn test_set_pwm_masks_reserved_bits() {
        let (mut pca, _chip, _delay) = started();
        pca.set_pwm(0, 0xFFFF, 0xE000).unwrap();
        assert_eq!(pca.read_channel(0).unwrap(), PwmTicks::new(0x1FFF, 0));
    }

    #[test]
    fn test_invalid_channel() {
        let (mut pca, chip, _delay) = started();
        assert!(matches!(pca.set_pwm(16, 0, 0), Err(Error::InvalidChannel(16))));
        assert!(matches!(pca.set_channel_value(200, 0, false), Err(Error::InvalidChannel(200))));
        assert!(matches!(pca.get_channel_pwm(16), Err(Error::InvalidChannel(16))));
        assert!(matches!(pca.read_channel(16), Err(Error::InvalidChannel(16))));
        assert!(matches!(pca.set_pulse_microseconds(16, 1500), Err(Error::InvalidChannel(16))));
        assert!(chip.log().is_empty());
    }

    #[test]
    fn test_channel_value_table() {
        let (mut pca, _chip, _delay) = started();
        let cases = [
            (0, false, PwmTicks::new(0, 4095)),
            (4095, false, PwmTicks::new(4095, 0)),
            (0, true, PwmTicks::new(4095, 0)),
            (4095, true, PwmTicks::new(0, 4095)),
            (2048, false, PwmTicks::new(0, 2048)),
            (2048, true, PwmTicks::new(0, 2047)),
            (9000, false, PwmTicks::new(4095, 0)),
            (9000, true, PwmTicks::new(0, 4095)),
        ];
        for (ticks, invert, expected) in cases {
            pca.set_channel_value(7, ticks, invert).unwrap();
            assert_eq!(pca.read_channel(7).unwrap(), expected, "ticks {ticks} invert {invert}");
        }
    }

    #[test]
    fn test_pulse_microseconds() {
        let (mut pca, chip, _delay) = started();

        //prescale register 3: 0.16us per tick, 1500us would be 9375 ticks
        chip.set_register(PRE_SCALE, 3);
        assert_eq!(pca.set_pulse_microseconds(1, 1500).unwrap(), 4095);
        assert_eq!(pca.read_channel(1).unwrap(), PwmTicks::new(0, 4095));

        chip.set_register(PRE_SCALE, 121);
        assert_eq!(pca.set_pulse_microseconds(1, 1500).unwrap(), 307);
        assert_eq!(pca.read_channel(1).unwrap(), PwmTicks::new(0, 307));
    }

    #[test]
    fn test_oscillator_frequency() {
        let (mut pca, chip, _delay) = started();
        assert_eq!(pca.oscillator_frequency(), 25_000_000);

        pca.set_oscillator_frequency(27_000_000);
        assert_eq!(pca.oscillator_frequency(), 27_000_000);
        assert_eq!(pca.handle().oscillator_hz(), 27_000_000);
        assert!(chip.log().is_empty());

        //27MHz / (50 * 4095) = 131.9
        assert_eq!(pca.set_pwm_frequency(50.0).unwrap(), 131);
    }

    #[test]
    fn test_nack_everywhere() {
        let (mut pca, chip, _delay) = controller();
        pca.set_oscillator_frequency(26_000_000);
        chip.set_nack(true);

        let nack = SimError::Nack(BUS_ADDR);
        assert!(matches!(pca.reset(), Err(Error::Write { register: MODE1, cause }) if cause == nack));
        assert!(matches!(pca.begin(ClockSource::default()), Err(Error::Write { register: MODE1, .. })));
        assert!(matches!(pca.sleep(), Err(Error::Read { register: MODE1, .. })));
        assert!(matches!(pca.wakeup(), Err(Error::Read { register: MODE1, .. })));
        assert!(matches!(pca.set_external_clock(200), Err(Error::Read { register: MODE1, .. })));
        assert!(matches!(pca.set_pwm_frequency(60.0), Err(Error::Read { register: MODE1, .. })));
        assert!(matches!(pca.set_output_mode(OutputDriver::TotemPole), Err(Error::Read { register: MODE2, .. })));
        assert!(matches!(pca.read_prescale(), Err(Error::Read { register: PRE_SCALE, .. })));
        assert!(matches!(pca.get_channel_pwm(0), Err(Error::Read { .. })));
        assert!(matches!(pca.set_pwm(0, 0, 4095), Err(Error::Write { register: 0x06, .. })));
        assert!(matches!(pca.set_channel_value(1, 100, false), Err(Error::Write { register: 0x0A, .. })));
        assert!(matches!(pca.set_pulse_microseconds(2, 1500), Err(Error::Read { register: PRE_SCALE, .. })));

        assert_eq!(pca.oscillator_frequency(), 26_000_000);
    }

    #[test]
    fn test_sequence_continues_after_failed_write() {
        let (mut pca, chip, delay) = controller();
        chip.set_register(MODE1, mode1::ALLCALL);
        chip.set_nack_register(Some(PRE_SCALE));

        let res = pca.set_external_clock(200);

        assert!(matches!(res, Err(Error::Write { register: PRE_SCALE, .. })));
        //the final MODE1 write still went out
        assert_eq!(chip.writes_to(MODE1), vec![0x11, 0x51, 0xE1]);
        assert_eq!(delay.waits(), vec![Duration::from_millis(5)]);
    }
}
