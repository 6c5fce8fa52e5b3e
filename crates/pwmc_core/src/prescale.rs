//! Frequency and pulse width math.

use crate::registers::{MAX_TICKS, PRESCALE_MAX, PRESCALE_MIN};

pub const MIN_FREQUENCY: f32 = 1.0;
///Datasheet limit is about 3052 Hz with a 50 MHz external clock
pub const MAX_FREQUENCY: f32 = 3500.0;

///Clamp a requested PWM frequency into the supported range. NaN becomes the minimum.
pub fn clamp_frequency(freq_hz: f32) -> f32 {
    freq_hz.max(MIN_FREQUENCY).min(MAX_FREQUENCY)
}

///Prescale register value that gets closest to `freq_hz` with the given oscillator.
///
/// `round(osc / (freq * 4095)) - 1`, clamped to the range the chip accepts.
pub fn prescale_for_frequency(oscillator_hz: u32, freq_hz: f32) -> u8 {
    let freq = clamp_frequency(freq_hz) as f64;
    let prescale = (oscillator_hz as f64 / (freq * 4095.0) + 0.5).floor() - 1.0;
    prescale.max(PRESCALE_MIN as f64).min(PRESCALE_MAX as f64) as u8
}

///Number of ticks covering `micros` microseconds, for the given prescale register value.
///
/// One tick lasts `1e6 * (prescale + 1) / oscillator_hz` microseconds. The result is not clamped and can exceed
/// the 12 bit counter.
pub fn pulse_ticks(oscillator_hz: u32, prescale: u8, micros: u32) -> u32 {
    let numerator = micros as u64 * oscillator_hz as u64;
    let denominator = 1_000_000u64 * (prescale as u64 + 1);
    (numerator / denominator).min(u32::MAX as u64) as u32
}

///`pulse_ticks` clamped to the largest tick value.
pub fn ticks_for_pulse(oscillator_hz: u32, prescale: u8, micros: u32) -> u16 {
    pulse_ticks(oscillator_hz, prescale, micros).min(MAX_TICKS as u32) as u16
}

///PWM frequency the chip actually runs at for a prescale register value.
pub fn frequency_for_prescale(oscillator_hz: u32, prescale: u8) -> f32 {
    (oscillator_hz as f64 / (4096.0 * (prescale as f64 + 1.0))) as f32
}
