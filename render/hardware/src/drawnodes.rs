//! Deferred translucent surfaces. Transparent walls and planes can't go
//! through the depth buffer in submission order, so the frame collects them
//! here and draws them back-to-front after everything opaque.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use render_backend::{GraphicsBackend, PolyFlags, ShaderTarget};

use crate::defs::{DrawNode, PlaneInfo, PolyPlaneInfo, WallInfo};
use crate::{HardwareRenderer, RenderContext};

/// Per-frame arena of deferred surfaces. Submission index doubles as the
/// sort sequence number, so the arena only ever appends within a frame.
#[derive(Debug, Default, Clone)]
pub struct DrawNodeArena {
    nodes: Vec<DrawNode>,
}

impl DrawNodeArena {
    pub fn add_plane(&mut self, plane: PlaneInfo) {
        self.nodes.push(DrawNode::Plane(plane));
    }

    pub fn add_polyplane(&mut self, plane: PolyPlaneInfo) {
        self.nodes.push(DrawNode::PolyPlane(plane));
    }

    pub fn add_wall(&mut self, wall: WallInfo) {
        self.nodes.push(DrawNode::Wall(wall));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &DrawNode {
        &self.nodes[index]
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Produce the draw order. The walk submits near-to-far, so the base
    /// order is simply reversed submission. That is wrong for coplanar-ish
    /// plane stacks submitted out of depth order, so every maximal run of
    /// consecutive sector planes is re-sorted by distance from the view
    /// height, farthest first. Ties keep submission order. Run boundaries
    /// (walls, polyobject planes) stay where the reversal put them.
    ///
    /// Pure function of the arena and `viewz`; resolving twice gives the
    /// same order.
    pub fn resolve(&self, viewz: f32) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.nodes.len()).rev().collect();

        let mut i = 0;
        while i < order.len() {
            if !self.nodes[order[i]].is_plane() {
                i += 1;
                continue;
            }
            let start = i;
            while i < order.len() && self.nodes[order[i]].is_plane() {
                i += 1;
            }
            order[start..i].sort_by(|&a, &b| {
                // unwrap is fine, the run contains only planes
                let da = (self.nodes[a].plane_height().unwrap() - viewz).abs();
                let db = (self.nodes[b].plane_height().unwrap() - viewz).abs();
                db.partial_cmp(&da)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
        }

        order
    }
}

impl HardwareRenderer {
    /// Draw everything deferred this frame, then empty the arena.
    pub(crate) fn render_drawnodes<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
    ) {
        #[cfg(feature = "hprof")]
        profile!("render_drawnodes");

        if self.state().drawnodes.is_empty() {
            return;
        }
        let order = self.state().drawnodes.resolve(ctx.view.pos.z);

        for i in order {
            let node = self.state().drawnodes.node(i).clone();
            match node {
                DrawNode::Plane(plane) => self.draw_deferred_plane(ctx, backend, &plane),
                DrawNode::PolyPlane(plane) => self.draw_deferred_polyplane(ctx, backend, &plane),
                DrawNode::Wall(wall) => self.draw_deferred_wall(ctx, backend, &wall),
            }
        }

        self.state_mut().drawnodes.clear();
    }

    /// Lighting for deferred walls is computed at draw time, not build time,
    /// so sector light changes between submission and resolve don't matter
    /// but the stored alpha does.
    fn draw_deferred_wall<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        wall: &WallInfo,
    ) {
        let mut surf = self.lighting(ctx, backend, wall.lightlevel, wall.colormap);
        surf.poly_color[3] = wall.surf.poly_color[3];

        let shader = if !ctx.config.shaders {
            ShaderTarget::None
        } else if wall.fogwall {
            ShaderTarget::Fog
        } else {
            ShaderTarget::Wall
        };
        let mut blend = if wall.fogwall {
            wall.blend
        } else {
            wall.blend | PolyFlags::MODULATED
        };
        // environment-mapped walls still write depth
        if wall.blend.contains(PolyFlags::ENVIRONMENT) {
            blend |= PolyFlags::OCCLUDE;
        }

        backend.set_texture(wall.texture);
        backend.draw_polygon(&surf, &wall.verts, blend, shader, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_backend::{SurfaceInfo, TextureSource};

    fn plane(height: f32) -> PlaneInfo {
        PlaneInfo {
            subsector: 0,
            is_ceiling: false,
            height,
            lightlevel: 255,
            flat: 0,
            alpha: 128,
            fof_sector: None,
            blend: PolyFlags::TRANSLUCENT,
            fogplane: false,
            colormap: None,
        }
    }

    fn wall() -> WallInfo {
        WallInfo {
            verts: Default::default(),
            surf: SurfaceInfo::default(),
            texture: TextureSource::Texture(0),
            blend: PolyFlags::TRANSLUCENT,
            fogwall: false,
            lightlevel: 255,
            colormap: None,
        }
    }

    #[test]
    fn plane_run_tie_break() {
        let mut arena = DrawNodeArena::default();
        arena.add_plane(plane(64.0));
        arena.add_plane(plane(0.0));
        arena.add_plane(plane(128.0));

        // distances from view height 32: 32, 32, 96. Farthest first, ties
        // keep submission order.
        let order = arena.resolve(32.0);
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut arena = DrawNodeArena::default();
        arena.add_plane(plane(64.0));
        arena.add_wall(wall());
        arena.add_plane(plane(0.0));
        arena.add_plane(plane(128.0));

        let first = arena.resolve(32.0);
        let second = arena.resolve(32.0);
        assert_eq!(first, second);
    }

    #[test]
    fn walls_bound_plane_runs() {
        let mut arena = DrawNodeArena::default();
        arena.add_plane(plane(0.0)); // idx 0
        arena.add_wall(wall()); // idx 1
        arena.add_plane(plane(64.0)); // idx 2
        arena.add_plane(plane(128.0)); // idx 3

        // reversed: 3, 2, 1, 0. The run [3, 2] re-sorts by distance from
        // view height 100 (28 vs 36 -> 2 first); the wall pins index 0 in
        // its own run.
        let order = arena.resolve(100.0);
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    #[test]
    fn reversed_when_no_planes() {
        let mut arena = DrawNodeArena::default();
        arena.add_wall(wall());
        arena.add_wall(wall());
        arena.add_wall(wall());
        assert_eq!(arena.resolve(0.0), vec![2, 1, 0]);
    }
}
