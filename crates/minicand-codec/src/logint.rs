//! # minicand-codec: Log-Quantized Integers
//!
//! Packs `ln|x|` linearly between `lmin` and `lmax` into a signed integer,
//! keeping the sign of `x` as the sign of the code. Values below `e^lmin`
//! collapse onto the smallest code; values above `e^lmax` saturate.
//!
//! The "closed" 8-bit variant reserves both end codes so that `±e^lmax`
//! (typically `±1`) survive a round trip exactly. It is the encoding used for
//! the pileup weights `(w - 0.5) * 2 ∈ [-1, 1]`.

#[inline(always)]
fn apply_sign(x: f64, code: i32) -> i32 {
    if x < 0.0 {
        if code == 0 {
            -1
        } else {
            -code
        }
    } else {
        code
    }
}

#[inline(always)]
fn position(x: f64, lmin: f64, lmax: f64) -> f64 {
    (x.abs().ln() - lmin) / (lmax - lmin)
}

/// 8-bit closed packing. `base` is the number of magnitude levels (capped at 128).
pub fn pack8_log_closed(x: f64, lmin: f64, lmax: f64, base: u8) -> i8 {
    let top = i32::from(base.clamp(2, 128)) - 1;
    let centered = position(x, lmin, lmax) * f64::from(top);
    let mut code = centered.round() as i32;
    if centered >= f64::from(top) {
        code = top;
    }
    if centered < 0.0 || centered.is_nan() {
        code = 0;
    }
    apply_sign(x, code) as i8
}

pub fn unpack8_log_closed(code: i8, lmin: f64, lmax: f64, base: u8) -> f64 {
    let top = base.clamp(2, 128) - 1;
    let magnitude = code.unsigned_abs();
    let l = if magnitude == top {
        lmax
    } else {
        lmin + f64::from(magnitude) / f64::from(top) * (lmax - lmin)
    };
    let value = l.exp();
    if code < 0 {
        -value
    } else {
        value
    }
}

/// 8-bit open packing (truncating).
pub fn pack8_log(x: f64, lmin: f64, lmax: f64, base: u8) -> i8 {
    let base = i32::from(base.clamp(2, 128));
    let centered = position(x, lmin, lmax) * f64::from(base);
    let mut code = centered as i32;
    if centered >= f64::from(base - 1) {
        code = base - 1;
    }
    if centered < 0.0 || centered.is_nan() {
        code = 0;
    }
    apply_sign(x, code) as i8
}

pub fn unpack8_log(code: i8, lmin: f64, lmax: f64, base: u8) -> f64 {
    let base = f64::from(base.clamp(2, 128));
    let l = lmin + f64::from(code.unsigned_abs()) / base * (lmax - lmin);
    let value = l.exp();
    if code < 0 {
        -value
    } else {
        value
    }
}

/// 16-bit packing (rounding up). `base` is capped at 32768.
pub fn pack16_log(x: f64, lmin: f64, lmax: f64, base: u16) -> i16 {
    let base = i32::from(base.clamp(2, 32768));
    let centered = position(x, lmin, lmax) * f64::from(base);
    let mut code = centered.ceil() as i32;
    if centered >= f64::from(base - 1) {
        code = base - 1;
    }
    if centered < 0.0 || centered.is_nan() {
        code = 0;
    }
    apply_sign(x, code) as i16
}

pub fn unpack16_log(code: i16, lmin: f64, lmax: f64, base: u16) -> f64 {
    let base = f64::from(base.clamp(2, 32768));
    let l = lmin + f64::from(code.unsigned_abs()) / base * (lmax - lmin);
    let value = l.exp();
    if code < 0 {
        -value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_endpoints_are_exact() {
        for &x in &[1.0f64, -1.0] {
            let code = pack8_log_closed(x, -2.0, 0.0, 64);
            assert_eq!(code.unsigned_abs(), 63);
            assert_eq!(unpack8_log_closed(code, -2.0, 0.0, 64), x);
        }
    }

    #[test]
    fn test_closed_below_range_collapses() {
        assert_eq!(pack8_log_closed(0.0, -2.0, 0.0, 64), 0);
        assert_eq!(pack8_log_closed(-0.01, -2.0, 0.0, 64), -1);
        let smallest = unpack8_log_closed(0, -2.0, 0.0, 64);
        assert!((smallest - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_closed_within_one_level() {
        let level = 2.0 / 63.0;
        let mut x = 0.2f64;
        while x < 1.0 {
            let back = unpack8_log_closed(pack8_log_closed(x, -2.0, 0.0, 64), -2.0, 0.0, 64);
            assert!((back.ln() - x.ln()).abs() <= level / 2.0 + 1e-12, "x={x} back={back}");
            x += 0.01;
        }
    }

    #[test]
    fn test_pack16_is_fine_grained() {
        let (lmin, lmax) = (-8.0, 8.0);
        for &x in &[1.0e-3f64, 0.02, 0.5, 3.0, 700.0, -42.0] {
            let back = unpack16_log(pack16_log(x, lmin, lmax, 32768), lmin, lmax, 32768);
            let rel = ((back - x) / x).abs();
            assert!(rel < 1e-3, "x={x} back={back}");
        }
    }

    #[test]
    fn test_open_packing_saturates_with_sign() {
        assert_eq!(pack8_log(1.0e9, -4.0, 4.0, 128), 127);
        assert_eq!(pack8_log(-1.0e9, -4.0, 4.0, 128), -127);
        let back = unpack8_log(pack8_log(2.0, -4.0, 4.0, 128), -4.0, 4.0, 128);
        assert!(back <= 2.0 && back > 2.0 * (-8.0f64 / 128.0).exp());
    }
}
