use glam::{Vec2, Vec3};
use math::Angle;

/// A sloped floor or ceiling plane. Heights are a linear field over the map:
/// `z(p) = origin.z + dot(p - origin.xy, direction) * zdelta` with
/// `direction` a unit vector pointing "uphill" in the xy plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slope {
    pub origin: Vec3,
    /// Unit xy direction of steepest ascent
    pub direction: Vec2,
    /// Height change per map unit travelled along `direction`
    pub zdelta: f32,
}

impl Slope {
    pub fn new(origin: Vec3, direction: Vec2, zdelta: f32) -> Self {
        Slope {
            origin,
            direction: direction.normalize_or_zero(),
            zdelta,
        }
    }

    /// Height of the plane above the map point
    #[inline]
    pub fn z_at(&self, pos: Vec2) -> f32 {
        let along = (pos - Vec2::new(self.origin.x, self.origin.y)).dot(self.direction);
        self.origin.z + along * self.zdelta
    }

    /// Which way the slope faces in the xy plane
    #[inline]
    pub fn xy_angle(&self) -> Angle {
        Angle::from_vector(self.direction)
    }

    /// Steep slopes (a full map unit of rise per unit run) get doubled
    /// fake-contrast treatment
    #[inline]
    pub fn is_steep(&self) -> bool {
        self.zdelta.abs() >= 1.0
    }
}

/// Evaluate an optional slope, falling back to a flat height.
#[inline]
pub fn slope_z_at(slope: Option<&Slope>, pos: Vec2, flat: f32) -> f32 {
    match slope {
        Some(s) => s.z_at(pos),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_fallback() {
        assert_eq!(slope_z_at(None, Vec2::new(5.0, 5.0), 128.0), 128.0);
    }

    #[test]
    fn linear_field() {
        let s = Slope::new(Vec3::new(0.0, 0.0, 64.0), Vec2::new(1.0, 0.0), 0.5);
        assert_eq!(s.z_at(Vec2::new(0.0, 0.0)), 64.0);
        assert_eq!(s.z_at(Vec2::new(32.0, 0.0)), 80.0);
        // movement perpendicular to the gradient changes nothing
        assert_eq!(s.z_at(Vec2::new(0.0, 100.0)), 64.0);
        assert!(!s.is_steep());
        assert!(Slope::new(Vec3::ZERO, Vec2::new(0.0, 1.0), 1.0).is_steep());
    }
}
