mod angle;

use std::f32::consts::PI;

pub use angle::*;

pub const FRACBITS: i32 = 16;
pub const FRACUNIT: i32 = 1 << FRACBITS;
pub const FRACUNIT_F32: f32 = FRACUNIT as f32;

/// Convert a `fixed_t` fixed-point value to `f32`
#[inline]
pub const fn fixed_to_float(value: i32) -> f32 {
    value as f32 / FRACUNIT_F32
}

/// Convert an `f32` world unit back to `fixed_t`
#[inline]
pub fn float_to_fixed(value: f32) -> i32 {
    (value * FRACUNIT_F32) as i32
}

/// Reduce a fixed-point texture offset modulo a texture height (given in
/// whole map units). Keeps the sign behaviour of C `%`: a negative peg stays
/// negative. Texture pegging on very tall multi-tile textures relies on this
/// to bound the vertical coordinate origin.
#[inline]
pub fn fixed_rem(value: i32, height_units: i32) -> i32 {
    if height_units <= 0 {
        return value;
    }
    value % (height_units << FRACBITS)
}

/// Same reduction carried out through fixed point for float inputs, so the
/// wall builder gets bit-comparable pegs to the fixed-point path.
#[inline]
pub fn float_rem(value: f32, height_units: f32) -> f32 {
    if height_units <= 0.0 {
        return value;
    }
    fixed_to_float(fixed_rem(float_to_fixed(value), height_units as i32))
}

const DEG_TO_RAD: f32 = PI / 180.0;

/// Convert a BAM (Binary Angle Measure) to radians
#[inline]
pub const fn bam_to_radian(value: u32) -> f32 {
    (value as f32 * 8.381_903e-8) * DEG_TO_RAD
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn bam_quarter_turn() {
        // 0x40000000 is 90 degrees in BAM
        assert!((bam_to_radian(0x4000_0000) - FRAC_PI_2).abs() < 0.0001);
        assert!((bam_to_radian(0x8000_0000) - PI).abs() < 0.0001);
    }

    #[test]
    fn fixed_round_trip() {
        assert_eq!(fixed_to_float(FRACUNIT), 1.0);
        assert_eq!(float_to_fixed(64.0), 64 << FRACBITS);
        assert_eq!(fixed_to_float(float_to_fixed(-12.5)), -12.5);
    }

    #[test]
    fn peg_reduction() {
        // a peg of 3.5 texture heights reduces to half a height, sign kept
        assert_eq!(fixed_rem(float_to_fixed(224.0), 64), float_to_fixed(32.0));
        assert_eq!(fixed_rem(float_to_fixed(-224.0), 64), float_to_fixed(-32.0));
        // degenerate heights pass through untouched
        assert_eq!(fixed_rem(1234, 0), 1234);
        assert_eq!(float_rem(224.0, 64.0), 32.0);
    }
}
