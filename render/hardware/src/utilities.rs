//! Small angle/geometry helpers shared by the walker, wall builder and
//! sprite projector.

use glam::Vec2;
use math::Angle;
use std::f32::consts::TAU;

/// Full-circle binary angle for the clipper. All clipper arithmetic runs on
/// wrapping `u32` BAMs so interval maths never sees float wraparound.
#[inline]
pub fn to_bam(angle: Angle) -> u32 {
    ((angle.rad() / TAU) * 4_294_967_296.0) as i64 as u32
}

#[inline]
pub fn bam_from_radians(rad: f32) -> u32 {
    to_bam(Angle::new(rad))
}

/// World angle of `point` as seen from `from`.
#[inline]
pub fn point_view_angle(point: Vec2, from: Vec2) -> Angle {
    Angle::new((point.y - from.y).atan2(point.x - from.x))
}

/// BAM view angle, for clipper queries.
#[inline]
pub fn point_view_bam(point: Vec2, from: Vec2) -> u32 {
    to_bam(point_view_angle(point, from))
}

#[inline]
pub fn clamp_light(light: i32) -> i32 {
    light.clamp(0, 255)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn bam_wraps_like_angles() {
        let quarter = to_bam(Angle::new(FRAC_PI_2));
        assert!((quarter as i64 - 0x4000_0000i64).abs() < 0x0010_0000);
        // -90 degrees lands at 0xC0000000
        let neg = to_bam(Angle::new(-FRAC_PI_2));
        assert!((neg as i64 - 0xC000_0000i64).abs() < 0x0010_0000);
    }

    #[test]
    fn view_angles() {
        let from = Vec2::new(10.0, 10.0);
        let east = point_view_angle(Vec2::new(20.0, 10.0), from);
        assert!(east.rad().abs() < 0.0001);
        let north = point_view_angle(Vec2::new(10.0, 20.0), from);
        assert!((north.rad() - FRAC_PI_2).abs() < 0.0001);
    }
}
