//! Q16.16 fixed point and the CORDIC kernel behind the trig PEU.
//!
//! The kernel runs in Q2.30 internally and rounds back to Q16.16, so
//! exact angles like 0 land on exact results.

/// 1.0 in Q16.16.
pub const Q16_ONE: u32 = 0x0001_0000;

const FRAC_BITS: u32 = 30;
const WIDEN: u32 = FRAC_BITS - 16;
const ITERATIONS: usize = 30;

/// atan(2^-i) in Q2.30.
const ATAN_TABLE: [i64; ITERATIONS] = [
    843314857, 497837829, 263043837, 133525159, 67021687, 33543516, 16775851, 8388437, 4194283,
    2097149, 1048576, 524288, 262144, 131072, 65536, 32768, 16384, 8192, 4096, 2048, 1024, 512,
    256, 128, 64, 32, 16, 8, 4, 2,
];

/// CORDIC gain compensation 1/K for 30 iterations, Q2.30.
const GAIN: i64 = 652032874;

const PI: i64 = 3373259426;
const HALF_PI: i64 = 1686629713;
const TWO_PI: i64 = 6746518852;

/// Converts a real value to Q16.16, rounding to nearest.
pub fn to_q16(value: f64) -> u32 {
    ((value * Q16_ONE as f64).round() as i64) as i32 as u32
}

/// Converts a raw Q16.16 register value to a real value.
pub fn from_q16(raw: u32) -> f64 {
    raw as i32 as f64 / Q16_ONE as f64
}

fn narrow(v: i64) -> u32 {
    ((v + (1 << (WIDEN - 1))) >> WIDEN) as i32 as u32
}

/// Computes `(cos, sin)` of a Q16.16 angle in radians. Both results are
/// Q16.16 bit patterns as the PEU would place them in its result registers.
pub fn cordic_sin_cos(angle: u32) -> (u32, u32) {
    let mut z = ((angle as i32) as i64) << WIDEN;

    z = z.rem_euclid(TWO_PI);
    if z > PI {
        z -= TWO_PI;
    }

    // Rotation mode converges on [-pi/2, pi/2]; fold the outer quadrants.
    let mut negate = false;
    if z > HALF_PI {
        z -= PI;
        negate = true;
    } else if z < -HALF_PI {
        z += PI;
        negate = true;
    }

    let mut x = GAIN;
    let mut y: i64 = 0;
    for (i, atan) in ATAN_TABLE.iter().enumerate() {
        let (dx, dy) = (y >> i, x >> i);
        if z >= 0 {
            x -= dx;
            y += dy;
            z -= atan;
        } else {
            x += dx;
            y -= dy;
            z += atan;
        }
    }

    if negate {
        x = -x;
        y = -y;
    }

    (narrow(x), narrow(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_angle_is_exact() {
        assert_eq!(cordic_sin_cos(0), (0x0001_0000, 0x0000_0000));
    }

    #[test]
    fn test_forty_five_degrees() {
        let (cos, sin) = cordic_sin_cos(0xC910);
        assert_eq!(cos, 0x0000_B505);
        assert_eq!(sin, 0x0000_B505);
    }

    #[test]
    fn test_outer_quadrants() {
        // pi: cos = -1, sin = 0
        let (cos, sin) = cordic_sin_cos(to_q16(std::f64::consts::PI));
        assert_eq!(cos, 0xFFFF_0000);
        assert_eq!(sin, 0);

        // -pi/4 mirrors the sine
        let (cos, sin) = cordic_sin_cos((-(0xC910i32)) as u32);
        assert_eq!(cos, 0x0000_B505);
        assert_eq!(sin, 0xFFFF_4AFB);
    }

    #[test]
    fn test_matches_float_reference() {
        for step in -40..=40 {
            let angle = step as f64 * 0.2;
            let (cos, sin) = cordic_sin_cos(to_q16(angle));
            let quantized = from_q16(to_q16(angle));
            assert!((from_q16(cos) - quantized.cos()).abs() < 2.0 / Q16_ONE as f64);
            assert!((from_q16(sin) - quantized.sin()).abs() < 2.0 / Q16_ONE as f64);
        }
    }

    #[test]
    fn test_q16_conversions() {
        assert_eq!(to_q16(1.0), Q16_ONE);
        assert_eq!(to_q16(-1.0), 0xFFFF_0000);
        assert_eq!(from_q16(0x0000_8000), 0.5);
    }
}
