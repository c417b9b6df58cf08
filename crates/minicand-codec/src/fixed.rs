//! # minicand-codec: Fixed-Point
//!
//! Linear maps of a symmetric real range `[-R, R]` onto the symmetric integer
//! range `[-MAX, MAX]`.
//!
//! Both directions are generic over the float width so that each packed field
//! reproduces the arithmetic width of the stored layout (eta packs in double
//! precision, dz and dphi in single precision).

use num_traits::{Float, PrimInt, Signed};

#[inline(always)]
fn int_max<F: Float, I: PrimInt>() -> F {
    F::from(I::max_value()).unwrap_or_else(F::max_value)
}

/// Quantizes `value` within `[-range, range]`, rounding to nearest.
///
/// Values outside the range saturate at `±MAX`; NaN packs to zero.
pub fn encode<F, I>(value: F, range: F) -> I
where
    F: Float,
    I: PrimInt + Signed,
{
    let max = int_max::<F, I>();
    let scaled = (value / range * max).round();
    if scaled.is_nan() {
        return I::zero();
    }
    if scaled >= max {
        return I::max_value();
    }
    if scaled <= -max {
        return -I::max_value();
    }
    I::from(scaled).unwrap_or_else(I::zero)
}

/// Inverse of [`encode`]: `code * range / MAX`.
pub fn decode<F, I>(code: I, range: F) -> F
where
    F: Float,
    I: PrimInt + Signed,
{
    let code = F::from(code).unwrap_or_else(F::zero);
    code * range / int_max::<F, I>()
}

/// Quantization step of a 16-bit code over `[-range, range]`.
pub fn step16(range: f64) -> f64 {
    2.0 * range / (2.0 * f64::from(i16::MAX))
}
