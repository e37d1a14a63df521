//! Protocol-wide constants and unit conversions.

/// The IEEE time unit (TU) in microseconds. Lifetime fields exchanged with
/// peers are expressed in TUs; everything internal is microseconds.
pub const TU_US: u64 = 1024;

/// Convert a wire lifetime in TUs to microseconds.
#[must_use]
pub const fn tu_to_us(tu: u32) -> u64 {
    tu as u64 * TU_US
}

/// Convert a microsecond span to whole TUs, saturating at the field width.
#[must_use]
pub const fn us_to_tu(us: u64) -> u32 {
    let tu = us / TU_US;
    if tu > u32::MAX as u64 { u32::MAX } else { tu as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tu_roundtrip() {
        assert_eq!(tu_to_us(100), 102_400);
        assert_eq!(us_to_tu(102_400), 100);
        // Sub-TU remainders truncate.
        assert_eq!(us_to_tu(102_399), 99);
    }

    #[test]
    fn us_to_tu_saturates() {
        assert_eq!(us_to_tu(u64::MAX), u32::MAX);
    }
}
