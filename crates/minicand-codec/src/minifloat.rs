//! # minicand-codec: Minifloat
//!
//! 16-bit reduced-precision floats laid out as `[sign | exponent | mantissa]`.
//! `Half` (5 exponent bits, 10 mantissa bits) is the layout used by every
//! energy-like field of the packed record.

/// A 16-bit float with a configurable exponent/mantissa split.
///
/// ## Rounding
/// - Normals round half-up on the dropped mantissa bits, but the top mantissa
///   code never carries into the exponent.
/// - Subnormals truncate.
/// - Magnitudes above the largest normal become infinity; NaN stays NaN
///   unless its payload lives entirely in the dropped bits.
pub struct MiniFloat<const EXPONENT: u32, const MANTISSA: u32>;

/// IEEE-754 half precision layout.
pub type Half = MiniFloat<5, 10>;

impl<const EXPONENT: u32, const MANTISSA: u32> MiniFloat<EXPONENT, MANTISSA> {
    const LAYOUT: () = assert!(
        1 + EXPONENT + MANTISSA == 16 && EXPONENT >= 2 && EXPONENT <= 8,
        "MiniFloat: 1 sign + EXPONENT + MANTISSA must be 16 bits with 2..=8 exponent bits"
    );

    pub const BIAS: i32 = (1 << (EXPONENT - 1)) - 1;
    const MANTISSA_MASK: u16 = ((1u32 << MANTISSA) - 1) as u16;
    const EXPONENT_MASK: u16 = ((1u32 << EXPONENT) - 1) as u16;
    const MIN_NORMAL_EXP: i32 = 1 - Self::BIAS;
    const MIN_SUBNORMAL_EXP: i32 = Self::MIN_NORMAL_EXP - MANTISSA as i32;

    /// Bit pattern of positive infinity.
    pub const INFINITY: u16 = Self::EXPONENT_MASK << MANTISSA;

    /// Packs an `f32` into 16 bits.
    pub fn encode(x: f32) -> u16 {
        let () = Self::LAYOUT;

        let bits = x.to_bits();
        let sign = ((bits >> 16) & 0x8000) as u16;
        let raw_exp = ((bits >> 23) & 0xff) as i32;
        let mantissa = bits & 0x007f_ffff;

        if raw_exp == 0xff {
            return sign | Self::INFINITY | Self::round_mantissa(mantissa);
        }

        let exp = raw_exp - 127;
        if exp < Self::MIN_SUBNORMAL_EXP {
            return sign;
        }
        if exp < Self::MIN_NORMAL_EXP {
            let depth = (Self::MIN_NORMAL_EXP - exp) as u32;
            let implicit = (1u32 << MANTISSA) >> depth;
            let fraction = mantissa >> (23 - MANTISSA + depth);
            return sign | (implicit + fraction) as u16;
        }
        if exp <= Self::BIAS {
            let biased = ((exp + Self::BIAS) as u16) << MANTISSA;
            return sign | biased | Self::round_mantissa(mantissa);
        }
        sign | Self::INFINITY
    }

    /// Expands 16 bits back into an `f32`. Exact: every code is representable.
    pub fn decode(h: u16) -> f32 {
        let () = Self::LAYOUT;

        let negative = h & 0x8000 != 0;
        let exp = ((h >> MANTISSA) & Self::EXPONENT_MASK) as i32;
        let mantissa = u32::from(h & Self::MANTISSA_MASK);

        if exp == 0 {
            let magnitude = (f64::from(mantissa) * 2f64.powi(Self::MIN_SUBNORMAL_EXP)) as f32;
            return if negative { -magnitude } else { magnitude };
        }

        let sign = if negative { 0x8000_0000 } else { 0 };
        let fraction = mantissa << (23 - MANTISSA);
        if exp == i32::from(Self::EXPONENT_MASK) {
            return f32::from_bits(sign | 0x7f80_0000 | fraction);
        }
        let exp32 = (exp - Self::BIAS + 127) as u32;
        f32::from_bits(sign | (exp32 << 23) | fraction)
    }

    /// Largest finite magnitude of this layout.
    pub fn max_finite() -> f32 {
        Self::decode(Self::INFINITY - 1)
    }

    #[inline(always)]
    fn round_mantissa(mantissa: u32) -> u16 {
        let extended = mantissa >> (22 - MANTISSA);
        let mut kept = (extended >> 1) as u16;
        if extended & 1 != 0 && kept < Self::MANTISSA_MASK {
            kept += 1;
        }
        kept
    }
}

/// Packs an `f32` into the half layout.
#[inline]
pub fn float32_to16(x: f32) -> u16 {
    Half::encode(x)
}

/// Unpacks a half-layout code into an `f32`.
#[inline]
pub fn float16_to32(h: u16) -> f32 {
    Half::decode(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_half_codes() {
        assert_eq!(float32_to16(0.0), 0x0000);
        assert_eq!(float32_to16(-0.0), 0x8000);
        assert_eq!(float32_to16(1.0), 0x3C00);
        assert_eq!(float32_to16(-2.0), 0xC000);
        assert_eq!(float32_to16(65504.0), 0x7BFF);
        assert_eq!(float32_to16(f32::INFINITY), 0x7C00);
        assert_eq!(float32_to16(f32::NEG_INFINITY), 0xFC00);
        assert_eq!(float32_to16(1.0e6), 0x7C00);
    }

    #[test]
    fn test_relative_error_bound() {
        for exp in -4..=3i32 {
            for &m in &[1.0f32, 1.37, 2.5, 7.77, 9.99] {
                let v = m * 10f32.powi(exp);
                let back = float16_to32(float32_to16(v));
                let rel = ((back - v) / v).abs();
                assert!(rel <= 1.0 / 2048.0, "v={v}, back={back}, rel={rel}");
            }
        }
    }

    #[test]
    fn test_top_mantissa_does_not_carry() {
        // Just below 2.0: the mantissa is all ones and the round bit is set.
        let v = f32::from_bits(0x3FFF_FFFF);
        let code = float32_to16(v);
        assert_eq!(code, 0x3FFF);
        assert!(float16_to32(code) < 2.0);
    }

    #[test]
    fn test_subnormals_truncate() {
        let smallest = 2f32.powi(-24);
        assert_eq!(float32_to16(smallest), 0x0001);
        assert_eq!(float16_to32(0x0001), smallest);
        assert_eq!(float32_to16(smallest * 1.9), 0x0001);
        assert_eq!(float32_to16(smallest * 0.49), 0x0000);
    }

    #[test]
    fn test_nan_survives() {
        assert!(float16_to32(float32_to16(f32::NAN)).is_nan());
    }

    #[test]
    fn test_alternative_layout() {
        type Wide = MiniFloat<8, 7>;
        assert_eq!(Wide::BIAS, 127);
        let v = 3.0e20f32;
        let back = Wide::decode(Wide::encode(v));
        assert!(((back - v) / v).abs() < 1.0 / 128.0);
        assert_eq!(Half::max_finite(), 65504.0);
    }
}
