//! Floor and ceiling polygons. A subsector carries a precomputed convex
//! outline; this turns it into one textured fan with slope-evaluated vertex
//! heights, plus the horizon-line fans for edge-of-world sectors.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec2;
use level::{Sector, Slope, HORIZON_SPECIAL};
use render_backend::{GraphicsBackend, OutVector, PolyFlags, ShaderTarget, TextureSource};

use crate::defs::{PlaneInfo, PolyPlaneInfo};
use crate::light::calc_slope_light;
use crate::{HardwareRenderer, RenderContext};

/// How far out horizon quads extend before the fill-to-eye-level pass.
const HORIZON_RENDER_DIST: f32 = 27000.0;
/// Beyond this the horizon fill raises to viewer height.
const HORIZON_FAR_DIST: f32 = 32768.0;

/// Texture-coordinate state for one plane. Snapping the reference vertex to
/// the tile grid keeps flats aligned across subsector boundaries; rotation
/// applies after the scroll offset.
pub(crate) struct PlaneUv {
    width: f32,
    height: f32,
    xref: f32,
    yref: f32,
    scroll_x: f32,
    scroll_y: f32,
    /// sin/cos of the negated flat angle, None when unrotated
    rot: Option<(f32, f32)>,
}

impl PlaneUv {
    pub(crate) fn new(
        flat_w: f32,
        flat_h: f32,
        ref_point: Vec2,
        scroll: Vec2,
        angle: math::Angle,
    ) -> Self {
        // Tile-size flats snap their reference to the tile grid. Texture
        // flats with arbitrary sizes skip the snap and just wrap.
        let (mut xref, mut yref) = if flat_w == flat_h && (flat_w as u32).is_power_of_two() {
            let mask = !(flat_w as i32 - 1);
            (
                ((ref_point.x as i32 & mask) as f32) / flat_w,
                ((ref_point.y as i32 & mask) as f32) / flat_h,
            )
        } else {
            (0.0, 0.0)
        };

        let rot = if angle.rad() != 0.0 {
            let (sin, cos) = (-angle.rad()).sin_cos();
            let (x, y) = (xref, yref);
            xref = x * cos - y * sin;
            yref = x * sin + y * cos;
            Some((sin, cos))
        } else {
            None
        };

        PlaneUv {
            width: flat_w,
            height: flat_h,
            xref,
            yref,
            scroll_x: scroll.x / flat_w,
            scroll_y: scroll.y / flat_h,
            rot,
        }
    }

    /// One output vertex, slope height winning over the constant height.
    pub(crate) fn vert(&self, pos: Vec2, height: f32, slope: Option<&Slope>) -> OutVector {
        let mut s = pos.x / self.width - self.xref + self.scroll_x;
        let mut t = self.yref - pos.y / self.height + self.scroll_y;

        if let Some((sin, cos)) = self.rot {
            let (os, ot) = (s, t);
            s = os * cos - ot * sin;
            t = os * sin + ot * cos;
        }

        let y = match slope {
            Some(sl) => sl.z_at(pos),
            None => height,
        };
        OutVector::new(pos.x, y, pos.y, s, t)
    }
}

impl HardwareRenderer {
    /// Build and submit one sector plane. `scroll_sector` supplies the flat
    /// scroll/rotation fields (the FOF control sector for 3D-floor planes,
    /// the front sector otherwise); `subsector` enables the horizon scan.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render_plane<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        subsector: Option<usize>,
        points: &[Vec2],
        is_ceiling: bool,
        height: f32,
        mut flags: PolyFlags,
        mut lightlevel: i32,
        flat: usize,
        scroll_sector: &Sector,
        slope: Option<&Slope>,
        alpha: i32,
        colormap: Option<usize>,
    ) {
        #[cfg(feature = "hprof")]
        profile!("render_plane");

        if points.len() < 3 {
            return;
        }

        let flat_info = ctx.pics.flat(flat);
        let (flat_w, flat_h, ripple) = (flat_info.width, flat_info.height, flat_info.ripple);

        let (scroll, angle) = if is_ceiling {
            (
                Vec2::new(scroll_sector.ceiling_xoffs, scroll_sector.ceiling_yoffs),
                scroll_sector.ceilingpic_angle,
            )
        } else {
            (
                Vec2::new(scroll_sector.floor_xoffs, scroll_sector.floor_yoffs),
                scroll_sector.floorpic_angle,
            )
        };
        let uv = PlaneUv::new(flat_w, flat_h, points[0], scroll, angle);

        let verts: Vec<OutVector> = points.iter().map(|&p| uv.vert(p, height, slope)).collect();

        if let Some(slope) = slope {
            lightlevel = calc_slope_light(
                lightlevel,
                slope.xy_angle(),
                slope.zdelta,
                ctx.config.fake_contrast,
            );
        }
        let mut surf = self.lighting(ctx, backend, lightlevel, colormap);

        if flags.intersects(
            PolyFlags::TRANSLUCENT
                | PolyFlags::FOG
                | PolyFlags::ADDITIVE
                | PolyFlags::SUBTRACTIVE
                | PolyFlags::REVERSE_SUBTRACT
                | PolyFlags::MULTIPLICATIVE,
        ) {
            surf.poly_color[3] = alpha.clamp(0, 255) as u8;
            flags |= PolyFlags::MODULATED;
        } else {
            flags |= PolyFlags::MASKED | PolyFlags::MODULATED;
        }

        let mut shader = ShaderTarget::None;
        if ctx.config.shaders {
            shader = if flags.contains(PolyFlags::FOG) {
                ShaderTarget::Fog
            } else if ripple {
                flags |= PolyFlags::RIPPLE;
                ShaderTarget::WaterRipple
            } else {
                ShaderTarget::Floor
            };
        }

        let texture = if flags.contains(PolyFlags::NO_TEXTURE) {
            TextureSource::None
        } else {
            TextureSource::Flat(flat)
        };

        let flags = self.world_blend(flags);
        self.state_mut()
            .batch
            .process_polygon(backend, &surf, &verts, flags, shader, texture, false);

        if let Some(ss) = subsector {
            self.horizon_fans(ctx, backend, ss, &uv, height, slope, &surf, flags, shader, texture);
        }
    }

    /// Fans of quads pushing a horizon-special sector's plane out to the
    /// render distance, then up to eye level so the last band hides the void.
    /// Long segs close to the camera get more subdivisions to tame the
    /// texture distortion.
    #[allow(clippy::too_many_arguments)]
    fn horizon_fans<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        subsector: usize,
        uv: &PlaneUv,
        height: f32,
        slope: Option<&Slope>,
        surf: &render_backend::SurfaceInfo,
        flags: PolyFlags,
        shader: ShaderTarget,
        texture: TextureSource,
    ) {
        let ss = &ctx.level.subsectors[subsector];
        let view = ctx.view.xy();

        for s in 0..ss.seg_count {
            let seg = &ctx.level.segs[(ss.start_seg + s) as usize];
            if seg.polyobj.is_some()
                || seg.linedef.special != HORIZON_SPECIAL
                || seg.point_on_side(view) != 0
            {
                continue;
            }

            let near = closest_point_on_line(view, seg.linedef.v1, seg.linedef.v2);
            let dist = (near - view).length().max(1.0);
            let delta = seg.v2 - seg.v1;
            let ratio = delta.length() / dist / 16.0;
            let numplanes = if ratio > 100.0 { 100 } else { ratio as u32 + 1 };

            let push_out = |p: Vec2, reach: f32| -> Vec2 {
                let d = (p - view).length().max(1.0);
                view + (p - view) * (reach / d)
            };

            for j in 0..numplanes {
                let left = seg.v1 + delta * (j as f32 / numplanes as f32);
                let right = seg.v1 + delta * ((j + 1) as f32 / numplanes as f32);
                let far_left = push_out(left, HORIZON_RENDER_DIST);
                let far_right = push_out(right, HORIZON_RENDER_DIST);

                let mut pts = [
                    uv.vert(far_left, height, slope),
                    uv.vert(left, height, slope),
                    uv.vert(right, height, slope),
                    uv.vert(far_right, height, slope),
                    uv.vert(
                        push_out(far_right, HORIZON_FAR_DIST),
                        height,
                        slope,
                    ),
                    uv.vert(push_out(far_left, HORIZON_FAR_DIST), height, slope),
                ];
                // the outermost band lifts to eye level
                pts[4].y = ctx.view.pos.z;
                pts[5].y = ctx.view.pos.z;

                self.state_mut()
                    .batch
                    .process_polygon(backend, surf, &pts, flags, shader, texture, true);
            }
        }
    }

    /// Flat polygon for a polyobject's vertex ring. Polyobject planes are
    /// never sloped.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render_polyobj_plane<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        polyobj: usize,
        is_ceiling: bool,
        height: f32,
        mut flags: PolyFlags,
        lightlevel: i32,
        flat: usize,
        scroll_sector: &Sector,
        alpha: i32,
        colormap: Option<usize>,
    ) {
        let points = &ctx.level.polyobjects[polyobj].vertices;
        if points.len() < 3 {
            return;
        }

        let flat_info = ctx.pics.flat(flat);
        let (scroll, angle) = if is_ceiling {
            (
                Vec2::new(scroll_sector.ceiling_xoffs, scroll_sector.ceiling_yoffs),
                scroll_sector.ceilingpic_angle,
            )
        } else {
            (
                Vec2::new(scroll_sector.floor_xoffs, scroll_sector.floor_yoffs),
                scroll_sector.floorpic_angle,
            )
        };
        let uv = PlaneUv::new(flat_info.width, flat_info.height, points[0], scroll, angle);
        let verts: Vec<OutVector> = points.iter().map(|&p| uv.vert(p, height, None)).collect();

        let mut surf = self.lighting(ctx, backend, lightlevel, colormap);
        if flags.intersects(
            PolyFlags::TRANSLUCENT
                | PolyFlags::FOG
                | PolyFlags::ADDITIVE
                | PolyFlags::SUBTRACTIVE
                | PolyFlags::REVERSE_SUBTRACT
                | PolyFlags::MULTIPLICATIVE,
        ) {
            surf.poly_color[3] = alpha.clamp(0, 255) as u8;
            flags |= PolyFlags::MODULATED;
        } else {
            flags |= PolyFlags::MASKED | PolyFlags::MODULATED;
        }

        let shader = if ctx.config.shaders {
            ShaderTarget::Floor
        } else {
            ShaderTarget::None
        };

        let flags = self.world_blend(flags);
        self.state_mut().batch.process_polygon(
            backend,
            &surf,
            &verts,
            flags,
            shader,
            TextureSource::Flat(flat),
            false,
        );
    }

    /// Deferred sector plane, drawn in resolved translucency order.
    pub(crate) fn draw_deferred_plane<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        plane: &PlaneInfo,
    ) {
        let ss = &ctx.level.subsectors[plane.subsector];
        let points = ss.planepoly.points.clone();

        let scroll_sector: &Sector = match plane.fof_sector {
            Some(fof) => &ctx.level.sectors[fof],
            None => ss.sector.as_ref(),
        };
        let slope = if plane.is_ceiling {
            scroll_sector.ceiling_slope
        } else {
            scroll_sector.floor_slope
        };

        self.render_plane(
            ctx,
            backend,
            Some(plane.subsector),
            &points,
            plane.is_ceiling,
            plane.height,
            plane.blend,
            plane.lightlevel,
            plane.flat,
            scroll_sector,
            slope.as_ref(),
            plane.alpha,
            plane.colormap,
        );
    }

    pub(crate) fn draw_deferred_polyplane<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        plane: &PolyPlaneInfo,
    ) {
        let scroll_sector: &Sector = match plane.fof_sector {
            Some(fof) => &ctx.level.sectors[fof],
            None => ctx.level.polyobjects[plane.polyobj].control.as_ref(),
        };

        self.render_polyobj_plane(
            ctx,
            backend,
            plane.polyobj,
            plane.is_ceiling,
            plane.height,
            plane.blend,
            plane.lightlevel,
            plane.flat,
            scroll_sector,
            plane.alpha,
            plane.colormap,
        );
    }
}

/// Closest point to `p` on the segment a..b.
fn closest_point_on_line(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use math::Angle;

    #[test]
    fn uv_zero_at_snapped_reference() {
        // reference point already on the 64-unit grid: (s,t) must be (0,0)
        let uv = PlaneUv::new(64.0, 64.0, Vec2::new(128.0, 192.0), Vec2::ZERO, Angle::default());
        let v = uv.vert(Vec2::new(128.0, 192.0), 0.0, None);
        assert!(v.s.abs() < 1e-6);
        assert!(v.t.abs() < 1e-6);
        // one tile east advances s by exactly one wrap
        let v2 = uv.vert(Vec2::new(192.0, 192.0), 0.0, None);
        assert!((v2.s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uv_snap_off_grid_reference() {
        // off-grid reference still lands on the grid-aligned tiling
        let uv = PlaneUv::new(64.0, 64.0, Vec2::new(150.0, 0.0), Vec2::ZERO, Angle::default());
        let v = uv.vert(Vec2::new(150.0, 0.0), 0.0, None);
        // 150 snaps to 128, so s = (150-128)/64
        assert!((v.s - 22.0 / 64.0).abs() < 1e-6);
    }

    #[test]
    fn uv_scroll_applies_before_rotation() {
        let uv = PlaneUv::new(
            64.0,
            64.0,
            Vec2::ZERO,
            Vec2::new(32.0, 0.0),
            Angle::default(),
        );
        let v = uv.vert(Vec2::ZERO, 0.0, None);
        assert!((v.s - 0.5).abs() < 1e-6);
    }

    #[test]
    fn vert_takes_slope_height() {
        let slope = Slope {
            origin: glam::Vec3::new(0.0, 0.0, 16.0),
            direction: Vec2::new(1.0, 0.0),
            zdelta: 0.5,
        };
        let uv = PlaneUv::new(64.0, 64.0, Vec2::ZERO, Vec2::ZERO, Angle::default());
        let v = uv.vert(Vec2::new(32.0, 0.0), 999.0, Some(&slope));
        assert!((v.y - 32.0).abs() < 1e-6);
    }

    #[test]
    fn closest_point_clamps_to_ends() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(64.0, 0.0);
        assert_eq!(closest_point_on_line(Vec2::new(-10.0, 5.0), a, b), a);
        assert_eq!(closest_point_on_line(Vec2::new(90.0, 5.0), a, b), b);
        let mid = closest_point_on_line(Vec2::new(32.0, 50.0), a, b);
        assert!((mid.x - 32.0).abs() < 1e-6);
    }
}
