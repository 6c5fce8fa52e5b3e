//! PCA9685 register map and bit masks.

pub const MODE1: u8 = 0x00;
pub const MODE2: u8 = 0x01;
pub const SUBADR1: u8 = 0x02;
pub const SUBADR2: u8 = 0x03;
pub const SUBADR3: u8 = 0x04;
pub const ALLCALLADR: u8 = 0x05;
///First of the 4 registers of channel 0. Channel n starts at `LED0_ON_L + 4 * n`
pub const LED0_ON_L: u8 = 0x06;
pub const ALL_LED_ON_L: u8 = 0xFA;
pub const ALL_LED_OFF_L: u8 = 0xFC;
pub const PRE_SCALE: u8 = 0xFE;
pub const TESTMODE: u8 = 0xFF;

///Number of registers used by each channel (ON_L, ON_H, OFF_L, OFF_H)
pub const REGISTERS_PER_CHANNEL: u8 = 4;

///Bits of the MODE1 register
pub mod mode1 {
    ///Respond to the LED All Call address
    pub const ALLCALL: u8 = 0x01;
    pub const SUB3: u8 = 0x02;
    pub const SUB2: u8 = 0x04;
    pub const SUB1: u8 = 0x08;
    ///Low power mode, oscillator off
    pub const SLEEP: u8 = 0x10;
    ///Register auto-increment
    pub const AI: u8 = 0x20;
    ///Use the EXTCLK pin as clock source
    pub const EXTCLK: u8 = 0x40;
    pub const RESTART: u8 = 0x80;
}

///Bits of the MODE2 register
pub mod mode2 {
    ///Output enable behaviour, 2 bits
    pub const OUTNE: u8 = 0x03;
    ///Totem pole outputs when set, open drain when cleared
    pub const OUTDRV: u8 = 0x04;
    ///Outputs change on ACK instead of on STOP
    pub const OCH: u8 = 0x08;
    pub const INVRT: u8 = 0x10;
}

///Default 7-bit I2C address with all address pins low
pub const DEFAULT_ADDRESS: u8 = 0x40;
///Nominal frequency of the internal oscillator
pub const FREQUENCY_OSCILLATOR: u32 = 25_000_000;
pub const PRESCALE_MIN: u8 = 3;
pub const PRESCALE_MAX: u8 = 255;
///PWM frequency used by `begin` when no external clock is requested
pub const DEFAULT_PWM_FREQUENCY: f32 = 1000.0;

///Largest tick value of the 12 bit counter. Also the "full on"/"full off" sentinel.
pub const MAX_TICKS: u16 = 4095;

pub const RESET_DELAY_MS: u32 = 10;
pub const SLEEP_DELAY_MS: u32 = 5;

///First register of the given channel index
pub const fn channel_base(channel: u8) -> u8 {
    LED0_ON_L + REGISTERS_PER_CHANNEL * channel
}
