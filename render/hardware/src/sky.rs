//! Sky dome background. Drawn first each viewpoint with depth testing off;
//! visible sky is whatever geometry never covers.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec3;
use level::ViewPoint;
use math::Angle;
use render_backend::{GraphicsBackend, PolyFlags, Transform};

use crate::{HardwareRenderer, RenderContext};

/// Dome transform: orientation only, anchored on the camera. The dome
/// texture's seam sits at 270 degrees, so yaw is measured from there.
pub(crate) fn sky_dome_transform(view: &ViewPoint, aspect_ratio: f32) -> Transform {
    let roll = if view.roll.rad() != 0.0 {
        Some(view.roll.signed_diff(Angle::default()).to_degrees())
    } else {
        None
    };
    Transform {
        pos: Vec3::ZERO,
        angle_x: view.aiming.signed_diff(Angle::default()).to_degrees(),
        angle_y: (view.angle - Angle::new(270f32.to_radians())).rad().to_degrees(),
        scale: Vec3::new(1.0, aspect_ratio, 1.0),
        fov_x: view.fov,
        fov_y: view.fov,
        flip: view.flip,
        roll,
    }
}

impl HardwareRenderer {
    pub(crate) fn draw_sky_background<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
    ) {
        #[cfg(feature = "hprof")]
        profile!("draw_sky_background");

        #[cfg(feature = "debug_portal")]
        if self.suppress_color {
            return;
        }

        backend.set_blend(
            PolyFlags::TRANSLUCENT | PolyFlags::NO_DEPTH_TEST | PolyFlags::MODULATED,
        );
        let transform = sky_dome_transform(ctx.view, ctx.config.aspect_ratio);
        backend.draw_sky_dome(ctx.pics.sky_texture, &transform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dome_yaw_is_seam_relative() {
        let view = ViewPoint::new(
            Vec3::new(100.0, 200.0, 41.0),
            Angle::new(270f32.to_radians()),
            Angle::default(),
            90.0,
        );
        let t = sky_dome_transform(&view, 4.0 / 3.0);
        // facing the seam angle gives zero dome yaw, and the dome never
        // translates with the camera
        assert!(t.angle_y.abs() < 0.001);
        assert_eq!(t.pos, Vec3::ZERO);
    }

    #[test]
    fn dome_carries_pitch() {
        let mut view = ViewPoint::new(Vec3::ZERO, Angle::default(), Angle::default(), 90.0);
        view.aiming = Angle::new(-0.5);
        let t = sky_dome_transform(&view, 4.0 / 3.0);
        assert!((t.angle_x - (-0.5f32).to_degrees()).abs() < 0.01);
    }
}
