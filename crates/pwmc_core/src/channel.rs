use crate::registers::{channel_base, MAX_TICKS};
use std::fmt;

pub const CHANNEL_COUNT: u8 = 16;

///One of the 16 PWM outputs of the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    pub fn index(&self) -> u8 {
        self.0
    }

    ///Address of this channel's ON_L register
    pub fn base_register(&self) -> u8 {
        channel_base(self.0)
    }
}

impl TryFrom<u8> for Channel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value < CHANNEL_COUNT {
            Ok(Channel(value))
        } else {
            Err(value)
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///The on and off tick positions of a channel within the 4096 tick cycle.
///
/// `(4095, 0)` keeps the output fully on and `(0, 4095)` keeps it fully off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmTicks {
    pub on: u16,
    pub off: u16,
}

impl PwmTicks {
    pub const FULL_ON: PwmTicks = PwmTicks { on: MAX_TICKS, off: 0 };
    pub const FULL_OFF: PwmTicks = PwmTicks { on: 0, off: MAX_TICKS };

    pub fn new(on: u16, off: u16) -> Self {
        Self { on, off }
    }

    ///Register payload in chip order: ON_L, ON_H, OFF_L, OFF_H
    pub fn to_bytes(self) -> [u8; 4] {
        let [on_l, on_h] = self.on.to_le_bytes();
        let [off_l, off_h] = self.off.to_le_bytes();
        [on_l, on_h, off_l, off_h]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            on: u16::from_le_bytes([bytes[0], bytes[1]]),
            off: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

///Tick pair for an output that should be active for `ticks` out of 4095.
///
/// 0 and 4095 map to the full off/full on sentinels. `invert` flips the active sense, for loads wired to sink to
/// ground.
pub fn ticks_for_value(ticks: u16, invert: bool) -> PwmTicks {
    let ticks = ticks.min(MAX_TICKS);
    match (invert, ticks) {
        (false, 0) => PwmTicks::FULL_OFF,
        (false, MAX_TICKS) => PwmTicks::FULL_ON,
        (false, ticks) => PwmTicks::new(0, ticks),
        (true, 0) => PwmTicks::FULL_ON,
        (true, MAX_TICKS) => PwmTicks::FULL_OFF,
        (true, ticks) => PwmTicks::new(0, MAX_TICKS - ticks),
    }
}
