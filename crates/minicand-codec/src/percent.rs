//! 8-bit percentage fields.
//!
//! Stored as `trunc(100 * p)`. Anything above 255 clamps to 255 instead of
//! failing, negatives and NaN clamp to 0.

/// Code written for any fraction at or above 2.55.
pub const SATURATED: u8 = u8::MAX;

pub fn encode(fraction: f32) -> u8 {
    let scaled = 100.0 * fraction;
    if scaled > f32::from(SATURATED) {
        SATURATED
    } else if scaled > 0.0 {
        scaled as u8
    } else {
        0
    }
}

pub fn decode(code: u8) -> f32 {
    (f64::from(code) / 100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_in_range() {
        assert_eq!(encode(0.0), 0);
        assert_eq!(encode(0.5), 50);
        assert_eq!(encode(1.0), 100);
        assert_eq!(encode(2.5), 250);
    }

    #[test]
    fn test_saturates() {
        assert_eq!(encode(2.56), SATURATED);
        assert_eq!(encode(1.0e9), SATURATED);
        assert_eq!(encode(f32::INFINITY), SATURATED);
        assert_eq!(encode(-0.3), 0);
        assert_eq!(encode(f32::NAN), 0);
    }

    #[test]
    fn test_saturated_code_is_stable() {
        let once = decode(encode(7.0));
        assert_eq!(encode(once), SATURATED);
        assert_eq!(decode(encode(once)), once);
    }
}
