//! # minicand-codec
//!
//! Stateless scalar codecs behind every packed field of the candidate record.
//! All functions are pure; none allocate.

pub mod fixed;
pub mod logint;
pub mod minifloat;
pub mod percent;

pub use minifloat::{float16_to32, float32_to16, Half, MiniFloat};

/// The two 16-bit encodings a packed field can use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding16 {
    /// Half-layout minifloat of `value * scale`.
    MiniFloat { scale: f32 },
    /// Signed fixed-point over `[-range, range]`, computed in single precision.
    Fixed { range: f32 },
}

impl Encoding16 {
    /// Minifloat without scaling.
    pub const HALF: Encoding16 = Encoding16::MiniFloat { scale: 1.0 };
}

/// Packs `value` with the given encoding. Fixed-point codes are returned as
/// their two's-complement bit pattern.
pub fn encode16(value: f32, mode: Encoding16) -> u16 {
    match mode {
        Encoding16::MiniFloat { scale } => float32_to16(value * scale),
        Encoding16::Fixed { range } => fixed::encode::<f32, i16>(value, range) as u16,
    }
}

/// Inverse of [`encode16`].
pub fn decode16(code: u16, mode: Encoding16) -> f32 {
    match mode {
        Encoding16::MiniFloat { scale } => {
            (f64::from(float16_to32(code)) / f64::from(scale)) as f32
        }
        Encoding16::Fixed { range } => fixed::decode::<f32, i16>(code as i16, range),
    }
}
