use glam::{Vec2, Vec3};
use math::Angle;

/// A camera for one render of the scene. The main player view, a skybox
/// camera and every portal destination all use this same shape; the portal
/// manager clones and restores it wholesale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPoint {
    pub pos: Vec3,
    pub angle: Angle,
    /// Up/down aim
    pub aiming: Angle,
    pub roll: Angle,
    /// Horizontal field of view in degrees
    pub fov: f32,
    /// Vertically flipped view (reverse gravity)
    pub flip: bool,
}

impl ViewPoint {
    pub fn new(pos: Vec3, angle: Angle, aiming: Angle, fov: f32) -> Self {
        ViewPoint {
            pos,
            angle,
            aiming,
            roll: Angle::default(),
            fov,
            flip: false,
        }
    }

    #[inline]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.pos.x, self.pos.y)
    }

    /// View direction sine/cosine pair, cached per use site
    #[inline]
    pub fn sin_cos(&self) -> (f32, f32) {
        self.angle.sin_cos()
    }

    /// Aiming sine/cosine, used for sprite billboard tilt
    #[inline]
    pub fn aim_sin_cos(&self) -> (f32, f32) {
        self.aiming.sin_cos()
    }
}
