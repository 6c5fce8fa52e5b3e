use crate::registers::DEFAULT_PWM_FREQUENCY;
use serde::Deserialize;

///Where the PWM clock comes from, and how it is divided.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum ClockSource {
    ///Internal oscillator, prescale computed from the requested frequency
    Internal { frequency_hz: f32 },
    ///Clock on the EXTCLK pin with a fixed prescale register value
    External { prescale: u8 },
}

impl Default for ClockSource {
    fn default() -> Self {
        ClockSource::Internal {
            frequency_hz: DEFAULT_PWM_FREQUENCY,
        }
    }
}

///Output stage of the 16 channels, the OUTDRV bit of MODE2.
///
/// LEDs with integrated zener diodes should only be driven in open drain mode.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputDriver {
    ///Push-pull outputs
    #[default]
    TotemPole,
    OpenDrain,
}

impl From<bool> for OutputDriver {
    ///`true` selects totem pole outputs
    fn from(totempole: bool) -> Self {
        if totempole {
            OutputDriver::TotemPole
        } else {
            OutputDriver::OpenDrain
        }
    }
}
