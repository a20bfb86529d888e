//! Draw-call batching. While collection is on, world polygons accumulate
//! in an arena instead of hitting the backend; a render pass then sorts
//! them by state and submits with far fewer texture and blend changes.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use render_backend::{GraphicsBackend, OutVector, PolyFlags, ShaderTarget, SurfaceInfo, TextureSource};

#[derive(Debug, Clone)]
struct BatchPoly {
    surf: SurfaceInfo,
    flags: PolyFlags,
    shader: ShaderTarget,
    texture: TextureSource,
    horizon: bool,
    first_vert: usize,
    num_verts: usize,
}

/// The per-frame polygon arena. Lives in the per-view render state, so a
/// portal's inner view collects into its own fresh arena.
#[derive(Debug, Default, Clone)]
pub struct BatchCollector {
    collecting: bool,
    polys: Vec<BatchPoly>,
    verts: Vec<OutVector>,
    /// Stable submission order, permuted by the state sort
    order: Vec<usize>,
}

impl BatchCollector {
    /// Begin collecting. Panics if a collection pass is already open since
    /// that would silently interleave two frames' polygons.
    pub fn start(&mut self) {
        assert!(!self.collecting, "batch collection started twice");
        self.collecting = true;
    }

    /// Route one polygon: into the arena while collecting, straight to the
    /// backend otherwise.
    pub fn process_polygon<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        surf: &SurfaceInfo,
        verts: &[OutVector],
        flags: PolyFlags,
        shader: ShaderTarget,
        texture: TextureSource,
        horizon: bool,
    ) {
        if !self.collecting {
            backend.set_texture(texture);
            backend.draw_polygon(surf, verts, flags, shader, horizon);
            return;
        }
        let first_vert = self.verts.len();
        self.verts.extend_from_slice(verts);
        self.polys.push(BatchPoly {
            surf: *surf,
            flags,
            shader,
            texture,
            horizon,
            first_vert,
            num_verts: verts.len(),
        });
    }

    /// Sort the collected polygons by render state and submit them. The sort
    /// is keyed shader, then texture, then poly flags, then surface colour,
    /// so equal-state polygons land adjacent and state changes are minimal.
    /// Ties keep submission order; for opaque geometry order is free anyway
    /// because the depth buffer resolves it.
    pub fn render<B: GraphicsBackend>(&mut self, backend: &mut B) {
        #[cfg(feature = "hprof")]
        profile!("batch_render");
        self.collecting = false;

        self.order.clear();
        self.order.extend(0..self.polys.len());
        let polys = &self.polys;
        self.order.sort_by(|&a, &b| {
            let (pa, pb) = (&polys[a], &polys[b]);
            sort_key(pa).cmp(&sort_key(pb)).then(a.cmp(&b))
        });

        let mut cur_texture = None;
        let mut cur_flags = None;
        for &i in &self.order {
            let poly = &self.polys[i];
            if cur_texture != Some(poly.texture) {
                backend.set_texture(poly.texture);
                cur_texture = Some(poly.texture);
            }
            if cur_flags != Some(poly.flags) {
                backend.set_blend(poly.flags);
                cur_flags = Some(poly.flags);
            }
            let verts = &self.verts[poly.first_vert..poly.first_vert + poly.num_verts];
            backend.draw_polygon(&poly.surf, verts, poly.flags, poly.shader, poly.horizon);
        }

        self.polys.clear();
        self.verts.clear();
        self.order.clear();
    }
}

fn sort_key(p: &BatchPoly) -> (u8, u8, usize, u32) {
    let shader = p.shader as u8;
    let (tclass, tid) = match p.texture {
        TextureSource::None => (0u8, 0usize),
        TextureSource::Texture(t) => (1, t),
        TextureSource::Flat(f) => (2, f),
        TextureSource::Patch { patch, .. } => (3, patch),
    };
    (shader, tclass, tid, p.flags.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        texture_sets: usize,
        draws: Vec<(TextureSource, usize)>,
        current: Option<TextureSource>,
    }

    impl GraphicsBackend for RecordingBackend {
        fn draw_polygon(
            &mut self,
            _surf: &SurfaceInfo,
            verts: &[OutVector],
            _flags: PolyFlags,
            _shader: ShaderTarget,
            _horizon: bool,
        ) {
            self.draws.push((self.current.unwrap(), verts.len()));
        }
        fn set_texture(&mut self, source: TextureSource) {
            self.texture_sets += 1;
            self.current = Some(source);
        }
        fn set_transform(&mut self, _t: &render_backend::Transform) {}
        fn set_blend(&mut self, _f: PolyFlags) {}
        fn set_stencil(&mut self, _s: render_backend::StencilState, _l: u32) {}
        fn clear_depth(&mut self) {}
        fn clear_view(&mut self, _c: bool) {}
        fn draw_sky_dome(&mut self, _t: usize, _tr: &render_backend::Transform) {}
        fn create_light_table(&mut self, _c: &level::ExtraColormap) -> u32 {
            0
        }
        fn capture_screen(&mut self) {}
        fn draw_captured_screen(&mut self) {}
    }

    fn quad() -> [OutVector; 4] {
        [OutVector::default(); 4]
    }

    #[test]
    fn interleaved_textures_batch_together() {
        let mut collector = BatchCollector::default();
        let mut backend = RecordingBackend::default();
        let surf = SurfaceInfo::default();

        collector.start();
        for i in 0..6 {
            let tex = TextureSource::Texture(i % 2);
            collector.process_polygon(
                &mut backend,
                &surf,
                &quad(),
                PolyFlags::MASKED,
                ShaderTarget::Wall,
                tex,
                false,
            );
        }
        assert_eq!(backend.draws.len(), 0);
        collector.render(&mut backend);

        assert_eq!(backend.draws.len(), 6);
        // two textures, interleaved on submission, need only two binds
        assert_eq!(backend.texture_sets, 2);
        assert_eq!(backend.draws[0].0, TextureSource::Texture(0));
        assert_eq!(backend.draws[3].0, TextureSource::Texture(1));
    }

    #[test]
    fn idle_collector_draws_immediately() {
        let mut collector = BatchCollector::default();
        let mut backend = RecordingBackend::default();
        collector.process_polygon(
            &mut backend,
            &SurfaceInfo::default(),
            &quad(),
            PolyFlags::MASKED,
            ShaderTarget::Wall,
            TextureSource::Texture(7),
            false,
        );
        assert_eq!(backend.draws.len(), 1);
    }

}
