//! Formatting helpers for user programs
//!
//! User mode has no heap and no core::fmt machinery wired to anything, so
//! the programs build their output bytes by hand.

/// Render a signed integer into `buf`, returning the used tail slice.
pub fn itoa(value: i32, buf: &mut [u8; 12]) -> &[u8] {
    let mut magnitude = (value as i64).unsigned_abs();
    let mut idx = buf.len();

    loop {
        idx -= 1;
        buf[idx] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
        if magnitude == 0 {
            break;
        }
    }
    if value < 0 {
        idx -= 1;
        buf[idx] = b'-';
    }
    &buf[idx..]
}

/// Parse an optionally signed decimal integer; None on anything else.
pub fn atoi(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let (sign, digits) = match bytes.first()? {
        b'-' => (-1i64, &bytes[1..]),
        _ => (1i64, bytes),
    };
    if digits.is_empty() {
        return None;
    }

    let mut value: i64 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value * 10 + (byte - b'0') as i64;
        if value > i32::MAX as i64 + 1 {
            return None;
        }
    }
    i32::try_from(sign * value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn itoa_covers_signs_and_bounds() {
        let mut buf = [0u8; 12];
        assert_eq!(itoa(0, &mut buf), b"0");
        assert_eq!(itoa(42, &mut buf), b"42");
        assert_eq!(itoa(-7, &mut buf), b"-7");
        assert_eq!(itoa(i32::MAX, &mut buf), b"2147483647");
        assert_eq!(itoa(i32::MIN, &mut buf), b"-2147483648");
    }

    #[test]
    fn atoi_round_trips_and_rejects_junk() {
        assert_eq!(atoi("0"), Some(0));
        assert_eq!(atoi("15"), Some(15));
        assert_eq!(atoi("-19"), Some(-19));
        assert_eq!(atoi("2147483647"), Some(i32::MAX));
        assert_eq!(atoi("-2147483648"), Some(i32::MIN));
        assert_eq!(atoi(""), None);
        assert_eq!(atoi("-"), None);
        assert_eq!(atoi("12x"), None);
        assert_eq!(atoi("9999999999"), None);
    }
}
