//! See-through line portals. A portal line found during the BSP walk is
//! queued rather than drawn; after the walk each portal stamps its wall
//! shape into the stencil buffer, renders the destination viewpoint inside
//! that window, then restores the wall's depth so the outer scene draws
//! around it correctly.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
#[cfg(feature = "debug_portal")]
use log::debug;
use level::{LineDef, ViewPoint};
use math::Angle;
use render_backend::{GraphicsBackend, StencilState, Transform};

use crate::bsp::ANGLE_180;
use crate::utilities::point_view_bam;
use crate::{HardwareRenderer, RenderContext};

/// A portal seg queued for rendering after the walk, with the destination
/// viewpoint already computed.
#[derive(Debug, Clone)]
pub(crate) struct Portal {
    /// Seg whose wall shape becomes the stencil window
    pub(crate) seg: usize,
    /// Viewpoint on the destination side
    pub(crate) view: ViewPoint,
    /// Destination line, for the angular clip window
    pub(crate) dest_line: usize,
}

/// Mirror a viewpoint through a portal line pair: the view keeps its
/// distance and bearing relative to the line, re-anchored on the
/// destination and turned by the angle between the two lines.
pub(crate) fn portal_viewpoint(view: &ViewPoint, start: &LineDef, dest: &LineDef) -> ViewPoint {
    let dangle = Angle::from_vector(dest.delta) - Angle::from_vector(-start.delta);

    let start_c = (start.v1 + start.v2) * 0.5;
    let dest_c = (dest.v1 + dest.v2) * 0.5;

    let dist = (view.xy() - start_c).length();
    let ang = Angle::from_vector(view.xy() - start_c) + dangle;
    let xy = dest_c + dist * ang.unit();

    let z = view.pos.z + dest.frontsector.floorheight - start.frontsector.floorheight;

    ViewPoint {
        pos: glam::Vec3::new(xy.x, xy.y, z),
        angle: view.angle + dangle,
        ..*view
    }
}

/// Angular window covering the destination line as seen from the child
/// viewpoint, in clipper orientation.
fn portal_clip_window(level: &level::Level, view: &ViewPoint, dest_line: usize) -> (u32, u32) {
    let dest = &level.lines[dest_line];
    let a1 = point_view_bam(dest.v1, view.xy());
    let a2 = point_view_bam(dest.v2, view.xy());
    if a1.wrapping_sub(a2) < ANGLE_180 {
        (a2, a1)
    } else {
        (a1, a2)
    }
}

impl HardwareRenderer {
    /// Queue a portal seg found during the walk. The destination viewpoint
    /// is computed now so the queue entry is self-contained.
    pub(crate) fn add_portal(&mut self, ctx: &RenderContext, seg_idx: usize) {
        let seg = &ctx.level.segs[seg_idx];
        let line = seg.linedef.as_ref();
        let Some(dest_line) = line.portal_target else {
            return;
        };
        let dest = &ctx.level.lines[dest_line];
        let view = portal_viewpoint(ctx.view, line, dest);

        #[cfg(feature = "debug_portal")]
        debug!(
            "portal at depth {}: seg {seg_idx} -> line {dest_line}, view {:?}",
            self.portal_depth, view.pos
        );

        self.portals[self.portal_depth].push(Portal {
            seg: seg_idx,
            view,
            dest_line,
        });
    }

    /// Render every portal queued at the current depth. Each gets the full
    /// stencil dance: mark the window, draw the inner scene inside it, then
    /// put the wall's depth back.
    pub(crate) fn render_portals<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        parent_transform: &Transform,
    ) {
        #[cfg(feature = "hprof")]
        profile!("render_portals");

        let depth = self.portal_depth;
        let queued = std::mem::take(&mut self.portals[depth]);
        #[cfg(feature = "debug_portal")]
        let queued = match self.debug_portal {
            // isolation renders exactly one top-level portal
            Some(want) if depth == 0 => {
                queued.into_iter().skip(want).take(1).collect::<Vec<_>>()
            }
            _ => queued,
        };
        if queued.is_empty() {
            return;
        }

        for portal in queued {
            // carve the window where the portal wall is visible
            backend.set_stencil(StencilState::Begin, depth as u32);
            self.draw_stencil_seg(ctx, backend, portal.seg);

            // inner scene draws only inside the window, on fresh depth
            backend.set_stencil(StencilState::Inside, depth as u32 + 1);
            backend.clear_depth();

            self.push_state();
            self.portal_depth += 1;
            let child_view = portal.view;
            let child_ctx = RenderContext {
                view: &child_view,
                ..*ctx
            };
            let window = portal_clip_window(ctx.level, &child_view, portal.dest_line);
            self.render_viewpoint(&child_ctx, backend, Some(window));
            self.portal_depth -= 1;
            self.pop_state();

            backend.set_transform(parent_transform);

            // overwrite the window's depth with the portal wall itself so
            // the rest of the outer scene occludes against it
            backend.set_stencil(StencilState::Finish, depth as u32 + 1);
            self.draw_stencil_seg(ctx, backend, portal.seg);
        }

        // a nested render resumes testing against its own window; only the
        // top level turns the stencil off
        if depth == 0 {
            backend.set_stencil(StencilState::Inactive, 0);
        } else {
            backend.set_stencil(StencilState::Inside, depth as u32);
        }
    }

    /// Draw one seg's wall shape for stencil or depth purposes only.
    fn draw_stencil_seg<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg_idx: usize,
    ) {
        let seg = ctx.level.segs[seg_idx].clone();
        self.drawing_stencil = true;
        self.process_seg(ctx, backend, &seg);
        self.drawing_stencil = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderConfig;
    use glam::{Vec2, Vec3};
    use level::{
        Level, LineDefFlags, MapPtr, PicData, PlanePoly, Sector, Segment, SideDef, SubSector,
        IS_SSECTOR_MASK,
    };
    use render_backend::{OutVector, PolyFlags, ShaderTarget, SurfaceInfo, TextureSource};

    fn init_log() {
        let _ = simplelog::SimpleLogger::init(
            log::LevelFilter::Warn,
            simplelog::Config::default(),
        );
    }

    fn line(
        v1: Vec2,
        v2: Vec2,
        sector: &mut Box<Sector>,
        side: &mut Box<SideDef>,
        target: Option<usize>,
    ) -> LineDef {
        LineDef {
            v1,
            v2,
            delta: v2 - v1,
            flags: 0,
            special: level::PORTAL_SPECIAL,
            tag: 0,
            translucency: None,
            blend: 0,
            bbox: level::BBox::new(v1, v2),
            front_sidedef: unsafe { MapPtr::new(side) },
            back_sidedef: None,
            frontsector: unsafe { MapPtr::new(sector) },
            backsector: None,
            portal_target: target,
        }
    }

    #[test]
    fn viewpoint_mirrors_through_line_pair() {
        let mut sector = Box::new(Sector::new(0, 0.0, 128.0, 0, 1, 255));
        let mut side = Box::new(SideDef {
            textureoffset: 0.0,
            rowoffset: 0.0,
            toptexture: None,
            bottomtexture: None,
            midtexture: None,
            repeat_count: 0,
            sector: unsafe { MapPtr::new(&mut sector) },
        });

        // two parallel east-west lines facing each other, 512 apart
        let start = line(
            Vec2::new(0.0, 0.0),
            Vec2::new(128.0, 0.0),
            &mut sector,
            &mut side,
            Some(1),
        );
        let dest = line(
            Vec2::new(128.0, 512.0),
            Vec2::new(0.0, 512.0),
            &mut sector,
            &mut side,
            Some(0),
        );

        let view = ViewPoint::new(
            Vec3::new(64.0, -32.0, 41.0),
            Angle::new(std::f32::consts::FRAC_PI_2),
            Angle::default(),
            90.0,
        );
        let out = portal_viewpoint(&view, &start, &dest);

        // the opposed pair leaves heading unchanged and re-anchors the
        // offset behind the destination line
        assert!((out.pos.x - 64.0).abs() < 0.01);
        assert!((out.pos.y - 480.0).abs() < 0.01);
        assert!((out.pos.z - 41.0).abs() < 0.001);
        assert!(
            out.angle
                .signed_diff(Angle::new(std::f32::consts::FRAC_PI_2))
                .abs()
                < 0.001
        );
    }

    #[test]
    fn viewpoint_carries_floor_height_difference() {
        let mut low = Box::new(Sector::new(0, 0.0, 128.0, 0, 1, 255));
        let mut high = Box::new(Sector::new(1, 256.0, 384.0, 0, 1, 255));
        let mut side_low = Box::new(SideDef {
            textureoffset: 0.0,
            rowoffset: 0.0,
            toptexture: None,
            bottomtexture: None,
            midtexture: None,
            repeat_count: 0,
            sector: unsafe { MapPtr::new(&mut low) },
        });
        let mut side_high = Box::new(SideDef {
            textureoffset: 0.0,
            rowoffset: 0.0,
            toptexture: None,
            bottomtexture: None,
            midtexture: None,
            repeat_count: 0,
            sector: unsafe { MapPtr::new(&mut high) },
        });

        let start = line(
            Vec2::new(0.0, 0.0),
            Vec2::new(128.0, 0.0),
            &mut low,
            &mut side_low,
            Some(1),
        );
        let dest = line(
            Vec2::new(128.0, 512.0),
            Vec2::new(0.0, 512.0),
            &mut high,
            &mut side_high,
            Some(0),
        );

        let view = ViewPoint::new(Vec3::new(64.0, -32.0, 41.0), Angle::default(), Angle::default(), 90.0);
        let out = portal_viewpoint(&view, &start, &dest);
        // eye height above the floor is preserved across the jump
        assert!((out.pos.z - (41.0 + 256.0)).abs() < 0.001);
    }

    #[derive(Default)]
    struct StencilBackend {
        stencils: Vec<(StencilState, u32)>,
        draw_flags: Vec<PolyFlags>,
        sky_domes: usize,
    }

    impl GraphicsBackend for StencilBackend {
        fn draw_polygon(
            &mut self,
            _surf: &SurfaceInfo,
            _verts: &[OutVector],
            flags: PolyFlags,
            _shader: ShaderTarget,
            _horizon: bool,
        ) {
            self.draw_flags.push(flags);
        }
        fn set_texture(&mut self, _s: TextureSource) {}
        fn set_transform(&mut self, _t: &Transform) {}
        fn set_blend(&mut self, _f: PolyFlags) {}
        fn set_stencil(&mut self, state: StencilState, level: u32) {
            self.stencils.push((state, level));
        }
        fn clear_depth(&mut self) {}
        fn clear_view(&mut self, _c: bool) {}
        fn draw_sky_dome(&mut self, _t: usize, _tr: &Transform) {
            self.sky_domes += 1;
        }
        fn create_light_table(&mut self, _c: &level::ExtraColormap) -> u32 {
            0
        }
        fn capture_screen(&mut self) {}
        fn draw_captured_screen(&mut self) {}
    }

    /// One leaf, one east-west two-sided seg between two identical sectors.
    /// The seg enters the walk only when it carries a midtexture.
    fn one_seg_level(midtexture: Option<usize>) -> Level {
        let mut level = Level::new(usize::MAX);
        level.sectors.push(Sector::new(0, 0.0, 128.0, 0, 1, 255));
        level.sectors.push(Sector::new(1, 0.0, 128.0, 0, 1, 255));
        let front_sec = unsafe { MapPtr::new(&mut level.sectors[0]) };
        let back_sec = unsafe { MapPtr::new(&mut level.sectors[1]) };

        level.sides.push(SideDef {
            textureoffset: 0.0,
            rowoffset: 0.0,
            toptexture: None,
            bottomtexture: None,
            midtexture,
            repeat_count: 0,
            sector: front_sec.clone(),
        });
        let side = unsafe { MapPtr::new(&mut level.sides[0]) };

        let v1 = Vec2::new(0.0, 0.0);
        let v2 = Vec2::new(64.0, 0.0);
        level.lines.push(LineDef {
            v1,
            v2,
            delta: v2 - v1,
            flags: LineDefFlags::TwoSided as u32,
            special: 0,
            tag: 0,
            translucency: None,
            blend: 0,
            bbox: level::BBox::new(v1, v2),
            front_sidedef: side.clone(),
            back_sidedef: Some(side.clone()),
            frontsector: front_sec.clone(),
            backsector: Some(back_sec.clone()),
            portal_target: None,
        });
        let linedef = unsafe { MapPtr::new(&mut level.lines[0]) };

        level.segs.push(Segment {
            v1,
            v2,
            offset: 0.0,
            angle: Angle::default(),
            length: 64.0,
            sidedef: side,
            linedef,
            frontsector: front_sec.clone(),
            backsector: Some(back_sec),
            polyobj: None,
        });

        level.subsectors.push(SubSector {
            sector: front_sec,
            seg_count: if midtexture.is_some() { 1 } else { 0 },
            start_seg: 0,
            planepoly: PlanePoly::default(),
            polyobjs: Vec::new(),
        });
        level.root_node = IS_SSECTOR_MASK;
        level
    }

    fn south_view() -> ViewPoint {
        ViewPoint::new(
            Vec3::new(32.0, -32.0, 41.0),
            Angle::new(std::f32::consts::FRAC_PI_2),
            Angle::default(),
            90.0,
        )
    }

    #[test]
    fn nested_portal_restores_parent_window() {
        init_log();
        let level = one_seg_level(None);
        let pics = PicData::default();
        let config = RenderConfig::default();
        let view = south_view();
        let ctx = RenderContext {
            level: &level,
            pics: &pics,
            config: &config,
            view: &view,
        };

        let mut renderer = HardwareRenderer::new();
        renderer.portals[0].push(Portal {
            seg: 0,
            view,
            dest_line: 0,
        });
        renderer.portals[1].push(Portal {
            seg: 0,
            view,
            dest_line: 0,
        });

        let mut backend = StencilBackend::default();
        renderer.render_viewpoint(&ctx, &mut backend, None);

        use StencilState::*;
        // the inner portal at depth 1 must hand the stencil back to its
        // parent's window; its sprite and deferred passes still run inside
        // that window, and only the top level disables the stencil
        assert_eq!(
            backend.stencils,
            vec![
                (Begin, 0),
                (Inside, 1),
                (Begin, 1),
                (Inside, 2),
                (Finish, 2),
                (Inside, 1),
                (Finish, 1),
                (Inactive, 0),
            ]
        );
    }

    #[cfg(feature = "debug_portal")]
    #[test]
    fn isolated_portal_renders_alone_over_a_hidden_main_view() {
        use level::TextureInfo;

        init_log();
        let level = one_seg_level(Some(0));
        let pics = PicData {
            textures: vec![TextureInfo {
                width: 64.0,
                height: 64.0,
                transparent: false,
            }],
            ..PicData::default()
        };
        let config = RenderConfig::default();
        let view = south_view();
        let ctx = RenderContext {
            level: &level,
            pics: &pics,
            config: &config,
            view: &view,
        };

        let mut renderer = HardwareRenderer::new();
        renderer.debug_portal = Some(1);
        renderer.portals[0].push(Portal {
            seg: 0,
            view,
            dest_line: 0,
        });
        renderer.portals[0].push(Portal {
            seg: 0,
            view,
            dest_line: 0,
        });

        let mut backend = StencilBackend::default();
        renderer.render_viewpoint(&ctx, &mut backend, None);

        // only the selected portal stencils a window
        let begins = backend
            .stencils
            .iter()
            .filter(|(s, _)| *s == StencilState::Begin)
            .count();
        assert_eq!(begins, 1);

        // the main view's wall went depth-only, the portal's copy kept its
        // colour output
        assert!(backend
            .draw_flags
            .iter()
            .any(|f| f.contains(PolyFlags::MASKED | PolyFlags::INVISIBLE)));
        assert!(backend
            .draw_flags
            .iter()
            .any(|f| f.contains(PolyFlags::MASKED) && !f.contains(PolyFlags::INVISIBLE)));

        // the sky dome only appears through the portal
        assert_eq!(backend.sky_domes, 1);
    }
}
