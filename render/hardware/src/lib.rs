//! Hardware-accelerated scene renderer. One call to
//! [`HardwareRenderer::render_player_view`] walks the BSP front-to-back,
//! batches opaque world polygons, recurses through stencil portals, then
//! draws sprites and deferred translucent surfaces back-to-front.
//!
//! The renderer owns no pixels; everything is submitted through a
//! [`GraphicsBackend`] implementation.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec3;
use level::{Level, PicData, ViewPoint};
use math::Angle;
use render_backend::{GraphicsBackend, PolyFlags, Transform};
use std::collections::{HashMap, HashSet};

pub mod batching;
mod bsp;
pub mod defs;
mod drawnodes;
mod light;
mod planes;
mod portals;
mod segs;
mod sky;
mod things;
pub mod utilities;

use batching::BatchCollector;
use bsp::{frustum_angle, point_in_subsector, AngleClipper};
use defs::MAX_PORTAL_DEPTH;
use drawnodes::DrawNodeArena;
use portals::Portal;
use things::VisSpriteArena;
use utilities::to_bam;

pub use light::{
    alpha_from_translucency_table, blend_mode_flag, calc_slope_light, calc_wall_light,
    fog_block_alpha, mix_lighting, surface_blend,
};

/// Directional light bias on walls and slopes so axis-aligned geometry
/// doesn't flatten into one shade.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FakeContrast {
    Off,
    #[default]
    Standard,
    /// Grade by wall angle instead of snapping to the axes
    Smooth,
}

/// Feature switches for one render. These mirror what a frontend exposes as
/// video options; everything defaults on.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Per-surface shader selection; off falls back to CPU colour mixing
    pub shaders: bool,
    /// Backend light tables for palette-faithful colour ramps
    pub palette_rendering: bool,
    /// Collect opaque world polygons and sort by state before drawing
    pub batching: bool,
    /// Translucent surface rendering; off draws everything solid
    pub translucency: bool,
    /// Tilt sprites toward the camera pitch
    pub billboarding: bool,
    /// Drop shadows under things that want them
    pub shadows: bool,
    /// Render the skybox viewpoint behind the scene when the map has one
    pub skybox: bool,
    pub fake_contrast: FakeContrast,
    /// Portal recursion limit; hard-capped at [`defs::MAX_PORTAL_DEPTH`]
    pub max_portal_depth: usize,
    /// Things farther than this never project; 0.0 means unlimited
    pub draw_distance: f32,
    /// Separate, tighter limit for precipitation particles
    pub precip_draw_distance: f32,
    /// Viewport width over height, for the view transform
    pub aspect_ratio: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            shaders: true,
            palette_rendering: false,
            batching: true,
            translucency: true,
            billboarding: true,
            shadows: true,
            skybox: true,
            fake_contrast: FakeContrast::default(),
            max_portal_depth: 2,
            draw_distance: 0.0,
            precip_draw_distance: 1024.0,
            aspect_ratio: 4.0 / 3.0,
        }
    }
}

/// Everything a render pass reads, borrowed for the duration of the pass.
/// Portal recursion swaps only the viewpoint.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub level: &'a Level,
    pub pics: &'a PicData,
    pub config: &'a RenderConfig,
    pub view: &'a ViewPoint,
}

/// Per-viewpoint collection state. Portals push a fresh one for the inner
/// view and pop it on the way out, so the parent's sprites and deferred
/// surfaces survive the recursion untouched.
#[derive(Debug, Default)]
pub(crate) struct RenderState {
    pub(crate) vissprites: VisSpriteArena,
    pub(crate) linkdraw: Vec<defs::LinkDrawItem>,
    pub(crate) drawnodes: DrawNodeArena,
    pub(crate) batch: BatchCollector,
}

/// The renderer. Holds only cross-frame caches and in-frame working state;
/// level data and configuration are borrowed per call.
pub struct HardwareRenderer {
    /// One state per active viewpoint, the last being current
    states: Vec<RenderState>,
    /// Backend light-table handles, keyed by colormap id
    pub(crate) light_tables: HashMap<usize, u32>,
    /// Walls are being drawn into the stencil buffer, not the scene
    pub(crate) drawing_stencil: bool,
    pub(crate) clipper: AngleClipper,
    /// Portals found while walking, one list per recursion level
    pub(crate) portals: Vec<Vec<Portal>>,
    pub(crate) portal_depth: usize,
    /// Sectors whose sprites are already projected this viewpoint
    pub(crate) visited_sectors: HashSet<u32>,
    /// Sector index the viewpoint sits in, for cull and heightsec checks
    pub(crate) view_sector: usize,
    /// Queue position of the one top-level portal to render; everything
    /// else draws depth-only so the portal window can be inspected
    #[cfg(feature = "debug_portal")]
    pub debug_portal: Option<usize>,
    /// The current viewpoint's colour output is being withheld
    #[cfg(feature = "debug_portal")]
    pub(crate) suppress_color: bool,
}

impl Default for HardwareRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareRenderer {
    pub fn new() -> Self {
        HardwareRenderer {
            states: vec![RenderState::default()],
            light_tables: HashMap::new(),
            drawing_stencil: false,
            clipper: AngleClipper::default(),
            portals: (0..=MAX_PORTAL_DEPTH).map(|_| Vec::new()).collect(),
            portal_depth: 0,
            visited_sectors: HashSet::new(),
            view_sector: 0,
            #[cfg(feature = "debug_portal")]
            debug_portal: None,
            #[cfg(feature = "debug_portal")]
            suppress_color: false,
        }
    }

    /// World-geometry blend bits, stripped of colour output while a portal
    /// is being isolated.
    #[inline]
    pub(crate) fn world_blend(&self, blend: PolyFlags) -> PolyFlags {
        #[cfg(feature = "debug_portal")]
        if self.suppress_color {
            return blend | PolyFlags::INVISIBLE;
        }
        blend
    }

    #[inline]
    pub(crate) fn state(&self) -> &RenderState {
        self.states.last().expect("render state stack empty")
    }

    #[inline]
    pub(crate) fn state_mut(&mut self) -> &mut RenderState {
        self.states.last_mut().expect("render state stack empty")
    }

    /// Open a fresh collection state for a portal's inner view.
    pub(crate) fn push_state(&mut self) {
        if self.states.len() > MAX_PORTAL_DEPTH {
            panic!("state stack overflow");
        }
        self.states.push(RenderState::default());
    }

    pub(crate) fn pop_state(&mut self) {
        if self.states.len() <= 1 {
            panic!("state stack underflow");
        }
        self.states.pop();
    }

    /// Render one frame from the player's viewpoint. When the map carries a
    /// skybox camera that view renders first and the main scene draws over
    /// it with only the depth buffer cleared.
    pub fn render_player_view<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        level: &Level,
        pics: &PicData,
        config: &RenderConfig,
        view: &ViewPoint,
    ) {
        #[cfg(feature = "hprof")]
        profile!("render_player_view");

        let mut cleared_color = false;
        if config.skybox {
            if let Some(sky) = &level.skybox_viewpoint {
                // the skybox camera supplies position, the player supplies
                // orientation
                let sky_view = ViewPoint {
                    pos: sky.pos,
                    ..*view
                };
                let ctx = RenderContext {
                    level,
                    pics,
                    config,
                    view: &sky_view,
                };
                backend.clear_view(true);
                cleared_color = true;
                self.render_viewpoint(&ctx, backend, None);
            }
        }

        backend.clear_view(!cleared_color);
        let ctx = RenderContext {
            level,
            pics,
            config,
            view,
        };
        self.render_viewpoint(&ctx, backend, None);
    }

    /// One full scene render from a viewpoint. Clearing buffers is the
    /// caller's business: the top level clears the whole view, a portal
    /// clears depth inside its stencil window only. `portal_clip` restricts
    /// the walk to an angular window, given in clipper orientation.
    pub(crate) fn render_viewpoint<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        portal_clip: Option<(u32, u32)>,
    ) {
        #[cfg(feature = "hprof")]
        profile!("render_viewpoint");

        #[cfg(feature = "debug_portal")]
        {
            self.suppress_color = self.portal_depth == 0 && self.debug_portal.is_some();
        }

        self.draw_sky_background(ctx, backend);

        let transform = view_transform(ctx.view, ctx.config.aspect_ratio);
        backend.set_transform(&transform);

        if ctx.level.subsectors.is_empty() {
            return;
        }

        self.state_mut().vissprites.clear();
        self.state_mut().linkdraw.clear();
        self.state_mut().drawnodes.clear();
        self.visited_sectors.clear();
        self.view_sector = {
            let ss = point_in_subsector(ctx.level, ctx.view.xy());
            ctx.level.subsectors[ss].sector.num as usize
        };

        self.clipper.clear();
        let a1 = frustum_angle(ctx.view);
        if a1 < bsp::ANGLE_180 {
            let va = to_bam(ctx.view.angle);
            self.clipper
                .safe_add_clip_range(va.wrapping_add(a1), va.wrapping_sub(a1));
        }
        if let Some((start, end)) = portal_clip {
            // hide everything outside the window
            self.clipper.safe_add_clip_range(end, start);
        }

        if ctx.config.batching {
            self.state_mut().batch.start();
        }
        self.render_bsp_node(ctx, backend, ctx.level.root_node);
        self.state_mut().batch.render(backend);

        #[cfg(feature = "debug_portal")]
        {
            self.suppress_color = false;
        }
        self.render_portals(ctx, backend, &transform);

        #[cfg(feature = "debug_portal")]
        if self.portal_depth == 0 && self.debug_portal.is_some() {
            // isolated inspection keeps the main view's sprites and
            // deferred surfaces off screen entirely
            return;
        }
        self.draw_sprites(ctx, backend);
        self.render_drawnodes(ctx, backend);
    }
}

/// Backend view transform for a viewpoint. Yaw and pitch go over in degrees;
/// the vertical scale carries the viewport aspect.
pub(crate) fn view_transform(view: &ViewPoint, aspect_ratio: f32) -> Transform {
    let roll = if view.roll.rad() != 0.0 {
        Some(view.roll.signed_diff(Angle::default()).to_degrees())
    } else {
        None
    };
    Transform {
        pos: view.pos,
        angle_x: view.aiming.signed_diff(Angle::default()).to_degrees(),
        angle_y: view.angle.rad().to_degrees(),
        scale: Vec3::new(1.0, aspect_ratio, 1.0),
        fov_x: view.fov,
        fov_y: view.fov,
        flip: view.flip,
        roll,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_backend::{
        OutVector, ShaderTarget, StencilState, SurfaceInfo, TextureSource,
    };

    #[derive(Default)]
    struct CountingBackend {
        clears: Vec<bool>,
        transforms: usize,
        sky_domes: usize,
    }

    impl GraphicsBackend for CountingBackend {
        fn draw_polygon(
            &mut self,
            _s: &SurfaceInfo,
            _v: &[OutVector],
            _f: PolyFlags,
            _sh: ShaderTarget,
            _h: bool,
        ) {
        }
        fn set_texture(&mut self, _s: TextureSource) {}
        fn set_transform(&mut self, _t: &Transform) {
            self.transforms += 1;
        }
        fn set_blend(&mut self, _f: PolyFlags) {}
        fn set_stencil(&mut self, _s: StencilState, _l: u32) {}
        fn clear_depth(&mut self) {}
        fn clear_view(&mut self, c: bool) {
            self.clears.push(c);
        }
        fn draw_sky_dome(&mut self, _t: usize, _tr: &Transform) {
            self.sky_domes += 1;
        }
        fn create_light_table(&mut self, _c: &level::ExtraColormap) -> u32 {
            0
        }
        fn capture_screen(&mut self) {}
        fn draw_captured_screen(&mut self) {}
    }

    #[test]
    fn empty_level_still_clears_and_draws_sky() {
        let level = Level::new(1);
        let pics = PicData::default();
        let config = RenderConfig::default();
        let view = ViewPoint::new(Vec3::ZERO, Angle::default(), Angle::default(), 90.0);

        let mut renderer = HardwareRenderer::new();
        let mut backend = CountingBackend::default();
        renderer.render_player_view(&mut backend, &level, &pics, &config, &view);

        assert_eq!(backend.clears, vec![true]);
        assert_eq!(backend.sky_domes, 1);
        assert_eq!(backend.transforms, 1);
    }

    #[test]
    fn state_stack_push_pop() {
        let mut renderer = HardwareRenderer::new();
        renderer.state_mut().linkdraw.push(defs::LinkDrawItem {
            verts: Default::default(),
            patch: 3,
            colormap: None,
        });
        renderer.push_state();
        assert!(renderer.state().linkdraw.is_empty());
        renderer.pop_state();
        assert_eq!(renderer.state().linkdraw[0].patch, 3);
    }

    #[test]
    #[should_panic(expected = "state stack overflow")]
    fn state_stack_overflow_is_fatal() {
        let mut renderer = HardwareRenderer::new();
        for _ in 0..=MAX_PORTAL_DEPTH + 1 {
            renderer.push_state();
        }
    }

    #[test]
    fn transform_carries_view_fields() {
        let mut view = ViewPoint::new(
            Vec3::new(10.0, 20.0, 30.0),
            Angle::new(std::f32::consts::FRAC_PI_2),
            Angle::default(),
            90.0,
        );
        view.flip = true;
        let t = view_transform(&view, 4.0 / 3.0);
        assert_eq!(t.pos, Vec3::new(10.0, 20.0, 30.0));
        assert!((t.angle_y - 90.0).abs() < 0.001);
        assert!(t.flip);
        assert!(t.roll.is_none());
        assert!((t.scale.y - 4.0 / 3.0).abs() < 1e-6);
    }
}
