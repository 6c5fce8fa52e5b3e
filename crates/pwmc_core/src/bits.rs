//! Read-modify-write helpers for the mode registers.

pub const fn with_bit_set(value: u8, mask: u8) -> u8 {
    value | mask
}

pub const fn with_bit_cleared(value: u8, mask: u8) -> u8 {
    value & !mask
}

pub const fn with_bit(value: u8, mask: u8, set: bool) -> u8 {
    if set {
        with_bit_set(value, mask)
    } else {
        with_bit_cleared(value, mask)
    }
}

pub const fn is_set(value: u8, mask: u8) -> bool {
    value & mask == mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::mode1;

    #[test]
    fn test_set_and_clear() {
        assert_eq!(with_bit_set(0x01, mode1::SLEEP), 0x11);
        assert_eq!(with_bit_set(0x11, mode1::SLEEP), 0x11);
        assert_eq!(with_bit_cleared(0x91, mode1::RESTART), 0x11);
        assert_eq!(with_bit_cleared(0x11, mode1::RESTART), 0x11);
    }

    #[test]
    fn test_with_bit() {
        assert_eq!(with_bit(0x00, mode1::AI, true), 0x20);
        assert_eq!(with_bit(0xFF, mode1::AI, false), 0xDF);
        assert!(is_set(0xA0, mode1::RESTART | mode1::AI));
        assert!(!is_set(0x80, mode1::RESTART | mode1::AI));
    }
}
