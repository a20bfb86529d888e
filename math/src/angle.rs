use glam::Vec2;
use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A wrapping angle in radians, always held in `[0, TAU)`.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Angle(f32);

impl Angle {
    /// Will always wrap < 0 to > PI
    #[inline]
    pub const fn new(mut radians: f32) -> Self {
        radians %= TAU;
        if radians < 0.0 {
            radians += TAU;
        }
        Angle(radians)
    }

    #[inline]
    pub const fn rad(&self) -> f32 {
        self.0
    }

    #[inline]
    pub fn sin(&self) -> f32 {
        self.0.sin()
    }

    #[inline]
    pub fn cos(&self) -> f32 {
        self.0.cos()
    }

    #[inline]
    pub fn tan(&self) -> f32 {
        self.0.tan()
    }

    #[inline]
    pub fn sin_cos(&self) -> (f32, f32) {
        self.0.sin_cos()
    }

    #[inline(always)]
    pub fn unit(&self) -> Vec2 {
        let (y, x) = self.sin_cos();
        Vec2::new(x, y)
    }

    pub fn from_vector(input: Vec2) -> Self {
        Angle::new(input.y.atan2(input.x))
    }

    /// Shortest signed distance from `other` to `self`, in `(-PI, PI]`.
    /// The sign says which way around the circle `self` sits relative to
    /// `other`; the occlusion clipper leans on this for interval ordering.
    #[inline]
    pub fn signed_diff(self, other: Angle) -> f32 {
        let mut d = self.0 - other.0;
        if d > PI {
            d -= TAU;
        } else if d <= -PI {
            d += TAU;
        }
        d
    }
}

impl Add for Angle {
    type Output = Angle;
    #[inline]
    fn add(self, other: Angle) -> Angle {
        Angle::new(self.0 + other.0)
    }
}

impl Add<f32> for Angle {
    type Output = Angle;
    #[inline]
    fn add(self, other: f32) -> Angle {
        Angle::new(self.0 + other)
    }
}

impl AddAssign for Angle {
    #[inline]
    fn add_assign(&mut self, other: Angle) {
        *self = Angle::new(self.0 + other.0);
    }
}

impl AddAssign<f32> for Angle {
    #[inline]
    fn add_assign(&mut self, other: f32) {
        *self = Angle::new(self.0 + other);
    }
}

impl Sub for Angle {
    type Output = Angle;
    #[inline]
    fn sub(self, other: Angle) -> Angle {
        Angle::new(self.0 - other.0)
    }
}

impl Sub<f32> for Angle {
    type Output = Angle;
    #[inline]
    fn sub(self, other: f32) -> Angle {
        Angle::new(self.0 - other)
    }
}

impl SubAssign for Angle {
    #[inline]
    fn sub_assign(&mut self, other: Angle) {
        *self = Angle::new(self.0 - other.0);
    }
}

impl SubAssign<f32> for Angle {
    #[inline]
    fn sub_assign(&mut self, other: f32) {
        *self = Angle::new(self.0 - other);
    }
}

impl Neg for Angle {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self::Output {
        Angle::new(-self.0)
    }
}

#[inline]
pub fn point_to_angle_2(point1: Vec2, point2: Vec2) -> Angle {
    let x = point1.x - point2.x;
    let y = point1.y - point2.y;
    Angle::new(y.atan2(x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn wrapping() {
        assert!((Angle::new(-FRAC_PI_2).rad() - (PI + FRAC_PI_2)).abs() < 0.0001);
        assert!((Angle::new(TAU + FRAC_PI_4).rad() - FRAC_PI_4).abs() < 0.0001);
    }

    #[test]
    fn signed_diff_direction() {
        let a = Angle::new(0.2);
        let b = Angle::new(TAU - 0.2);
        // a sits 0.4 anticlockwise of b even though raw values are far apart
        assert!((a.signed_diff(b) - 0.4).abs() < 0.0001);
        assert!((b.signed_diff(a) + 0.4).abs() < 0.0001);
    }

    #[test]
    fn point_angles() {
        let origin = Vec2::new(0.0, 0.0);
        let east = Vec2::new(10.0, 0.0);
        let north = Vec2::new(0.0, 10.0);
        assert!((point_to_angle_2(east, origin).rad() - 0.0).abs() < 0.0001);
        assert!((point_to_angle_2(north, origin).rad() - FRAC_PI_2).abs() < 0.0001);
    }
}
