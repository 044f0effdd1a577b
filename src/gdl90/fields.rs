//! Bit-packed field helpers for GDL90 payloads
//!
//! Bit ranges are given MSB-first within the payload, the way the ICD
//! draws them. Each helper touches only its own bits so fields sharing a
//! byte can be written in any order.

/// High nibble of a byte
#[inline]
pub fn get_hi_nibble(byte: u8) -> u8 {
    byte >> 4
}

/// Low nibble of a byte
#[inline]
pub fn get_lo_nibble(byte: u8) -> u8 {
    byte & 0x0F
}

/// Write `value` (4 bits) into the high nibble, keeping the low nibble
#[inline]
pub fn put_hi_nibble(byte: &mut u8, value: u8) {
    *byte = (*byte & 0x0F) | ((value & 0x0F) << 4);
}

/// Write `value` (4 bits) into the low nibble, keeping the high nibble
#[inline]
pub fn put_lo_nibble(byte: &mut u8, value: u8) {
    *byte = (*byte & 0xF0) | (value & 0x0F);
}

/// 24-bit big-endian unsigned value from 3 bytes
pub fn get_u24(buf: &[u8]) -> u32 {
    ((buf[0] as u32) << 16) | ((buf[1] as u32) << 8) | buf[2] as u32
}

/// 24-bit big-endian unsigned value into 3 bytes (upper 8 bits dropped)
pub fn put_u24(buf: &mut [u8], value: u32) {
    buf[0] = (value >> 16) as u8;
    buf[1] = (value >> 8) as u8;
    buf[2] = value as u8;
}

/// 24-bit big-endian two's complement value from 3 bytes
pub fn get_i24(buf: &[u8]) -> i32 {
    // Shift into the top of an i32 and back down to sign-extend
    ((get_u24(buf) << 8) as i32) >> 8
}

/// 24-bit big-endian two's complement value into 3 bytes
pub fn put_i24(buf: &mut [u8], value: i32) {
    put_u24(buf, value as u32 & 0xFF_FFFF);
}

/// 12-bit value stored as a full byte followed by the high nibble of the next
/// byte: bits `[b0:7..0][b1:7..4]`
pub fn get_u12_hi(buf: &[u8]) -> u16 {
    ((buf[0] as u16) << 4) | get_hi_nibble(buf[1]) as u16
}

pub fn put_u12_hi(buf: &mut [u8], value: u16) {
    buf[0] = (value >> 4) as u8;
    put_hi_nibble(&mut buf[1], value as u8 & 0x0F);
}

/// 12-bit value stored as the low nibble of a byte followed by a full byte:
/// bits `[b0:3..0][b1:7..0]`
pub fn get_u12_lo(buf: &[u8]) -> u16 {
    ((get_lo_nibble(buf[0]) as u16) << 8) | buf[1] as u16
}

pub fn put_u12_lo(buf: &mut [u8], value: u16) {
    put_lo_nibble(&mut buf[0], (value >> 8) as u8);
    buf[1] = value as u8;
}

/// Sign-extend a 12-bit two's complement field
#[inline]
pub fn sign_extend_12(value: u16) -> i16 {
    ((value << 4) as i16) >> 4
}

/// Truncate a signed value to its 12-bit two's complement form
#[inline]
pub fn to_u12(value: i16) -> u16 {
    value as u16 & 0x0FFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_independent() {
        let mut b = 0u8;
        put_hi_nibble(&mut b, 0xA);
        put_lo_nibble(&mut b, 0x5);
        assert_eq!(b, 0xA5);
        put_hi_nibble(&mut b, 0x3);
        assert_eq!(b, 0x35);
        assert_eq!(get_hi_nibble(b), 0x3);
        assert_eq!(get_lo_nibble(b), 0x5);
        // Oversized values are masked to 4 bits
        put_lo_nibble(&mut b, 0x1F);
        assert_eq!(b, 0x3F);
    }

    #[test]
    fn test_u24() {
        let mut buf = [0u8; 3];
        put_u24(&mut buf, 0x29CBB8);
        assert_eq!(buf, [0x29, 0xCB, 0xB8]);
        assert_eq!(get_u24(&buf), 0x29CBB8);
    }

    #[test]
    fn test_i24_sign() {
        let mut buf = [0u8; 3];
        put_i24(&mut buf, -1);
        assert_eq!(buf, [0xFF, 0xFF, 0xFF]);
        assert_eq!(get_i24(&buf), -1);

        put_i24(&mut buf, -0x80_0000);
        assert_eq!(buf, [0x80, 0x00, 0x00]);
        assert_eq!(get_i24(&buf), -0x80_0000);

        put_i24(&mut buf, 0x7F_FFFF);
        assert_eq!(get_i24(&buf), 0x7F_FFFF);
    }

    #[test]
    fn test_u12_hi_keeps_low_nibble() {
        let mut buf = [0u8, 0x0B];
        put_u12_hi(&mut buf, 0xABC);
        assert_eq!(buf, [0xAB, 0xCB]);
        assert_eq!(get_u12_hi(&buf), 0xABC);
    }

    #[test]
    fn test_u12_lo_keeps_high_nibble() {
        let mut buf = [0x70u8, 0];
        put_u12_lo(&mut buf, 0xFFE);
        assert_eq!(buf, [0x7F, 0xFE]);
        assert_eq!(get_u12_lo(&buf), 0xFFE);
    }

    #[test]
    fn test_sign_extend_12() {
        assert_eq!(sign_extend_12(0xFFE), -2);
        assert_eq!(sign_extend_12(0x7FF), 2047);
        assert_eq!(sign_extend_12(0x800), -2048);
        assert_eq!(to_u12(-2), 0xFFE);
        assert_eq!(to_u12(5), 0x005);
    }
}
