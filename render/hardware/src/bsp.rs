//! Front-to-back BSP traversal with angular occlusion clipping. Solid walls
//! cover their angle span as they are found, so whole subtrees behind them
//! reject on a bounding-box test without touching their geometry.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec2;
use level::{FofFlags, Level, Sector, Segment, IS_SSECTOR_MASK, PORTAL_SPECIAL};
use render_backend::{GraphicsBackend, PolyFlags};

use crate::defs::{PlaneInfo, PolyPlaneInfo, MAX_PORTAL_DEPTH};
use crate::light::{alpha_from_translucency_table, blend_mode_flag, fog_block_alpha};
use crate::utilities::{bam_from_radians, point_view_bam};
use crate::{HardwareRenderer, RenderContext};
use level::{BlendStyle, ViewPoint};

pub(crate) const ANGLE_180: u32 = 0x8000_0000;
const ANGLE_MAX: u32 = 0xffff_ffff;

/// A covered arc `[start, end]` in increasing BAM order. The clipper keeps
/// these sorted and disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClipRange {
    start: u32,
    end: u32,
}

/// Occlusion tracker over the full circle of view angles. Conservative: a
/// span counts as hidden only when one merged range covers all of it, so a
/// span straddling two separate ranges still renders.
#[derive(Debug, Default)]
pub(crate) struct AngleClipper {
    ranges: Vec<ClipRange>,
}

impl AngleClipper {
    pub(crate) fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Is any part of the arc from `start` counterclockwise to `end` still
    /// uncovered? Wrapping spans check both halves.
    pub(crate) fn safe_check_range(&self, start: u32, end: u32) -> bool {
        if start > end {
            self.is_range_visible(start, ANGLE_MAX) || self.is_range_visible(0, end)
        } else {
            self.is_range_visible(start, end)
        }
    }

    fn is_range_visible(&self, start: u32, end: u32) -> bool {
        for r in &self.ranges {
            if r.start > end {
                break;
            }
            if start >= r.start && end <= r.end {
                return false;
            }
        }
        true
    }

    /// Mark the arc from `start` counterclockwise to `end` as covered.
    pub(crate) fn safe_add_clip_range(&mut self, start: u32, end: u32) {
        if start > end {
            self.add_clip_range(start, ANGLE_MAX);
            self.add_clip_range(0, end);
        } else {
            self.add_clip_range(start, end);
        }
    }

    fn add_clip_range(&mut self, start: u32, end: u32) {
        let mut start = start;
        let mut end = end;
        let mut i = 0;
        while i < self.ranges.len() {
            let r = self.ranges[i];
            if r.end < start {
                i += 1;
                continue;
            }
            if r.start > end {
                break;
            }
            // overlap, absorb and keep scanning right
            start = start.min(r.start);
            end = end.max(r.end);
            self.ranges.remove(i);
        }
        self.ranges.insert(i, ClipRange { start, end });
    }
}

/// Half-angle of the view frustum in BAM, widened for pitch so tilted views
/// don't clip walls still on screen. Steep pitches give up and return a
/// half-circle.
pub(crate) fn frustum_angle(view: &ViewPoint) -> u32 {
    let tilt = view
        .aiming
        .signed_diff(math::Angle::default())
        .to_degrees()
        .abs()
        .min(90.0);
    if tilt > 46.0 {
        return ANGLE_180;
    }
    // base viewport ratio folded into one multiplier
    let render_multiplier = 64.0 / 1.6 / 1.2;
    let deg = 2.0 + (45.0 + tilt / 1.9) * view.fov * 48.0 / render_multiplier / 90.0;
    if deg >= 180.0 {
        return ANGLE_180;
    }
    bam_from_radians(deg.to_radians())
}

/// Descend the tree to the leaf containing `point`.
pub(crate) fn point_in_subsector(level: &Level, point: Vec2) -> usize {
    let mut node_id = level.root_node;
    while node_id & IS_SSECTOR_MASK == 0 {
        let node = &level.nodes[node_id as usize];
        node_id = node.children[node.point_on_side(&point)];
    }
    (node_id & !IS_SSECTOR_MASK) as usize
}

/// Both sides of a window already agree on every visible property, so no
/// wall, plane change or light change can come from this line.
fn is_empty_line(seg: &Segment, front: &Sector, back: &Sector) -> bool {
    seg.polyobj.is_none()
        && seg.sidedef.midtexture.is_none()
        && back.ceilingpic == front.ceilingpic
        && back.floorpic == front.floorpic
        && back.lightlevel == front.lightlevel
        && back.ceiling_z_at(seg.v1) == front.ceiling_z_at(seg.v1)
        && back.ceiling_z_at(seg.v2) == front.ceiling_z_at(seg.v2)
        && back.floor_z_at(seg.v1) == front.floor_z_at(seg.v1)
        && back.floor_z_at(seg.v2) == front.floor_z_at(seg.v2)
        && back.extra_colormap == front.extra_colormap
        && front.fofs.is_empty()
        && back.fofs.is_empty()
}

/// Is the opening through this line shut tight at both seg ends? Closed
/// lines occlude like one-sided walls. Transparent-door setups (back sector
/// shut on itself but a side texture missing) stay open, as do sky-backed
/// sectors.
pub(crate) fn check_clip(sky_flat: usize, seg: &Segment, front: &Sector, back: &Sector) -> bool {
    let frontc1 = front.ceiling_z_at(seg.v1);
    let frontc2 = front.ceiling_z_at(seg.v2);
    let frontf1 = front.floor_z_at(seg.v1);
    let frontf2 = front.floor_z_at(seg.v2);
    let backc1 = back.ceiling_z_at(seg.v1);
    let backc2 = back.ceiling_z_at(seg.v2);
    let backf1 = back.floor_z_at(seg.v1);
    let backf2 = back.floor_z_at(seg.v2);

    if backc1 <= frontf1 && backc2 <= frontf2 {
        return true;
    }
    if backf1 >= frontc1 && backf2 >= frontc2 {
        return true;
    }
    if backc1 <= backf1 && backc2 <= backf2 {
        let side = seg.sidedef.as_ref();
        if (backc1 < frontc1 || backc2 < frontc2) && side.toptexture.is_none() {
            return false;
        }
        if (backf1 > frontf1 || backf2 > frontf2) && side.bottomtexture.is_none() {
            return false;
        }
        if back.ceilingpic == sky_flat || back.floorpic == sky_flat {
            return false;
        }
        return true;
    }
    false
}

impl HardwareRenderer {
    /// Recursive tree walk. Near child first, far child only when its box
    /// still shows through the clipper.
    pub(crate) fn render_bsp_node<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        node_id: u32,
    ) {
        if node_id & IS_SSECTOR_MASK != 0 {
            self.draw_subsector(ctx, backend, (node_id & !IS_SSECTOR_MASK) as usize);
            return;
        }

        let node = &ctx.level.nodes[node_id as usize];
        let side = node.point_on_side(&ctx.view.xy());
        self.render_bsp_node(ctx, backend, node.children[side]);
        if self.check_bbox(ctx.view.xy(), &node.bboxes[side ^ 1]) {
            self.render_bsp_node(ctx, backend, node.children[side ^ 1]);
        }
    }

    /// Can any part of the box still be visible? Picks the two silhouette
    /// corners for the viewer's position relative to the box and asks the
    /// clipper about the spanned arc.
    pub(crate) fn check_bbox(&self, view: Vec2, bbox: &[Vec2; 2]) -> bool {
        let (left, top) = (bbox[0].x, bbox[0].y);
        let (right, bottom) = (bbox[1].x, bbox[1].y);

        // 3x3 cell the viewer occupies around the box
        let boxx = if view.x < left {
            0
        } else if view.x <= right {
            1
        } else {
            2
        };
        let boxy = if view.y > top {
            0
        } else if view.y >= bottom {
            1
        } else {
            2
        };
        let boxpos = (boxy << 2) | boxx;
        if boxpos == 5 {
            // inside
            return true;
        }

        let (p1, p2) = match boxpos {
            0 => (Vec2::new(right, top), Vec2::new(left, bottom)),
            1 => (Vec2::new(right, top), Vec2::new(left, top)),
            2 => (Vec2::new(right, bottom), Vec2::new(left, top)),
            4 => (Vec2::new(left, top), Vec2::new(left, bottom)),
            6 => (Vec2::new(right, bottom), Vec2::new(right, top)),
            8 => (Vec2::new(left, top), Vec2::new(right, bottom)),
            9 => (Vec2::new(left, bottom), Vec2::new(right, bottom)),
            10 => (Vec2::new(left, bottom), Vec2::new(right, top)),
            _ => return true,
        };

        let angle1 = point_view_bam(p1, view);
        let angle2 = point_view_bam(p2, view);
        self.clipper.safe_check_range(angle2, angle1)
    }

    /// Classify one seg: cull back-facing and fully occluded segs, mark
    /// solid spans in the clipper, discover portals, and hand everything
    /// still visible to the wall builder.
    pub(crate) fn add_line<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg_idx: usize,
    ) {
        #[cfg(feature = "hprof")]
        profile!("add_line");

        let seg = &ctx.level.segs[seg_idx];
        if let Some(po) = seg.polyobj {
            if !ctx.level.polyobjects[po].render_sides {
                return;
            }
        }

        let view = ctx.view.xy();
        let angle1 = point_view_bam(seg.v1, view);
        let angle2 = point_view_bam(seg.v2, view);
        // back-facing
        if angle2.wrapping_sub(angle1) < ANGLE_180 {
            return;
        }
        if !self.clipper.safe_check_range(angle2, angle1) {
            return;
        }

        let line = seg.linedef.as_ref();
        if !self.drawing_stencil
            && seg.polyobj.is_none()
            && line.special == PORTAL_SPECIAL
            && line.portal_target.is_some()
            && self.portal_depth < ctx.config.max_portal_depth.min(MAX_PORTAL_DEPTH)
        {
            // the portal content overdraws this span later; nothing behind
            // the line renders now
            self.add_portal(ctx, seg_idx);
            self.clipper.safe_add_clip_range(angle2, angle1);
            return;
        }

        let front = seg.frontsector.as_ref();
        let back = match &seg.backsector {
            None => {
                self.clipper.safe_add_clip_range(angle2, angle1);
                self.process_seg(ctx, backend, seg);
                return;
            }
            Some(b) => b.as_ref(),
        };

        let sky = ctx.level.sky_flat;
        if back.ceilingpic == sky
            && front.ceilingpic == sky
            && back.floorpic == sky
            && front.floorpic == sky
            && seg.sidedef.midtexture.is_none()
            && seg.polyobj.is_none()
            && ((front.fofs.is_empty() && back.fofs.is_empty()) || front.tag == back.tag)
        {
            // all-sky both sides with nothing to draw across it
            return;
        }

        if check_clip(sky, seg, front, back) {
            self.clipper.safe_add_clip_range(angle2, angle1);
        } else if is_empty_line(seg, front, back) {
            return;
        }
        self.process_seg(ctx, backend, seg);
    }

    /// Emit everything in one leaf: sector planes, 3D-floor planes,
    /// polyobject sides and planes, the sector's sprites, then the segs.
    pub(crate) fn draw_subsector<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        num: usize,
    ) {
        #[cfg(feature = "hprof")]
        profile!("draw_subsector");

        let ss = &ctx.level.subsectors[num];
        let front = ss.sector.as_ref();
        let view = ctx.view.xy();
        let viewz = ctx.view.pos.z;

        // slope-evaluated heights at the viewpoint decide visibility; the
        // polygon itself is drawn at the heights over the sector reference
        // point
        let center = plane_ref_point(ss.planepoly.points.as_slice(), view);
        let cull_floor = front.floor_z_at(view);
        let cull_ceiling = front.ceiling_z_at(view);
        let loc_floor = front.floor_z_at(center);
        let loc_ceiling = front.ceiling_z_at(center);
        let has_poly = ss.planepoly.points.len() >= 3;

        if has_poly && cull_floor < viewz && front.floorpic != ctx.level.sky_flat {
            let (light, colormap) = plane_light(front, loc_floor, center, false);
            self.render_plane(
                ctx,
                backend,
                Some(num),
                &ss.planepoly.points,
                false,
                loc_floor,
                PolyFlags::OCCLUDE,
                light,
                front.floorpic,
                front,
                front.floor_slope.as_ref(),
                255,
                colormap,
            );
        }

        if has_poly && cull_ceiling > viewz && front.ceilingpic != ctx.level.sky_flat {
            let (light, colormap) = plane_light(front, loc_ceiling, center, false);
            self.render_plane(
                ctx,
                backend,
                Some(num),
                &ss.planepoly.points,
                true,
                loc_ceiling,
                PolyFlags::OCCLUDE,
                light,
                front.ceilingpic,
                front,
                front.ceiling_slope.as_ref(),
                255,
                colormap,
            );
        }

        if has_poly && !front.fofs.is_empty() {
            self.subsector_fof_planes(
                ctx, backend, num, front, center, loc_floor, loc_ceiling,
            );
        }

        for &po in &ss.polyobjs {
            self.add_polyobject(ctx, backend, po, cull_floor, cull_ceiling);
        }

        if self.visited_sectors.insert(front.num) {
            self.add_sprites(ctx, front);
        }

        let ss = &ctx.level.subsectors[num];
        for i in 0..ss.seg_count {
            let idx = (ss.start_seg + i) as usize;
            if ctx.level.segs[idx].polyobj.is_some() {
                continue;
            }
            self.add_line(ctx, backend, idx);
        }
    }

    /// Planes of every 3D floor stacked in the sector. Which side of a band
    /// is visible depends on the viewer being above or below it, flipped by
    /// the invert/both-planes flags; fog and translucent bands defer.
    #[allow(clippy::too_many_arguments)]
    fn subsector_fof_planes<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        num: usize,
        front: &Sector,
        center: Vec2,
        loc_floor: f32,
        loc_ceiling: f32,
    ) {
        let view = ctx.view.xy();
        let viewz = ctx.view.pos.z;

        for fof in &front.fofs {
            if !fof.has(FofFlags::Exists) || !fof.has(FofFlags::RenderPlanes) {
                continue;
            }
            let control = fof.control.as_ref();
            let both = fof.has(FofFlags::BothPlanes);
            let invert = fof.has(FofFlags::InvertPlanes);

            // underside
            let cull = fof.bottom_at(view);
            let center_h = fof.bottom_at(center);
            if center_h <= loc_ceiling
                && center_h >= loc_floor
                && ((viewz < cull && (both || !invert)) || (viewz > cull && (both || invert)))
            {
                let (light, colormap) = plane_light(front, center_h, center, viewz < cull);
                self.fof_plane(
                    ctx,
                    backend,
                    num,
                    fof,
                    false,
                    center_h,
                    control.floorpic,
                    light,
                    colormap,
                );
            }

            // top side
            let cull = fof.top_at(view);
            let center_h = fof.top_at(center);
            if center_h >= loc_floor
                && center_h <= loc_ceiling
                && ((viewz > cull && (both || !invert)) || (viewz < cull && (both || invert)))
            {
                let (light, colormap) = plane_light(front, center_h, center, viewz < cull);
                self.fof_plane(
                    ctx,
                    backend,
                    num,
                    fof,
                    true,
                    center_h,
                    control.ceilingpic,
                    light,
                    colormap,
                );
            }
        }
    }

    /// Route one 3D-floor plane: fog blocks and translucent planes defer,
    /// solid ones draw now with occlusion.
    #[allow(clippy::too_many_arguments)]
    fn fof_plane<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        num: usize,
        fof: &level::Fof,
        is_ceiling: bool,
        height: f32,
        flat: usize,
        light: i32,
        colormap: Option<usize>,
    ) {
        let control = fof.control.as_ref();

        if fof.has(FofFlags::Fog) {
            let master_cmap = ctx.level.lines[fof.master_line]
                .frontsector
                .extra_colormap;
            let alpha =
                fog_block_alpha(light, ctx.level.colormap(master_cmap), ctx.config.shaders);
            self.state_mut().drawnodes.add_plane(PlaneInfo {
                subsector: num,
                is_ceiling,
                height,
                lightlevel: light,
                flat,
                alpha: alpha as i32,
                fof_sector: Some(control.num as usize),
                blend: PolyFlags::FOG | PolyFlags::NO_TEXTURE,
                fogplane: true,
                colormap: master_cmap,
            });
        } else if (fof.has(FofFlags::Translucent) && fof.alpha < 256) || fof.blend != 0 {
            let blend = if fof.blend != 0 {
                blend_mode_flag(BlendStyle::from(fof.blend))
            } else {
                PolyFlags::TRANSLUCENT
            };
            self.state_mut().drawnodes.add_plane(PlaneInfo {
                subsector: num,
                is_ceiling,
                height,
                lightlevel: light,
                flat,
                alpha: (fof.alpha - 1).clamp(0, 255),
                fof_sector: Some(control.num as usize),
                blend,
                fogplane: false,
                colormap,
            });
        } else {
            let slope = if is_ceiling {
                fof.top_slope().copied()
            } else {
                fof.bottom_slope().copied()
            };
            let points = ctx.level.subsectors[num].planepoly.points.clone();
            self.render_plane(
                ctx,
                backend,
                None,
                &points,
                is_ceiling,
                height,
                PolyFlags::OCCLUDE,
                light,
                flat,
                control,
                slope.as_ref(),
                255,
                colormap,
            );
        }
    }

    /// One polyobject sorted into this leaf: its segs go through the normal
    /// line walk, its planes draw over whatever the leaf put down.
    fn add_polyobject<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        po: usize,
        cull_floor: f32,
        cull_ceiling: f32,
    ) {
        let poly = &ctx.level.polyobjects[po];
        for si in 0..poly.segs.len() {
            let seg_idx = ctx.level.polyobjects[po].segs[si];
            self.add_line(ctx, backend, seg_idx);
        }

        let poly = &ctx.level.polyobjects[po];
        let control = poly.control.as_ref();
        let viewz = ctx.view.pos.z;
        // past-opaque translucency levels mean fully invisible planes
        let alpha = match poly.translucency {
            Some(t) if t >= 10 => return,
            Some(t) if t > 0 => Some(alpha_from_translucency_table(t) as i32),
            _ => None,
        };

        if poly.render_bottom
            && control.floorheight <= cull_ceiling
            && control.floorheight >= cull_floor
            && viewz < control.floorheight
        {
            self.polyobj_plane(ctx, backend, po, false, control.floorheight, alpha);
        }
        let poly = &ctx.level.polyobjects[po];
        let control = poly.control.as_ref();
        if poly.render_top
            && control.ceilingheight <= cull_ceiling
            && control.ceilingheight >= cull_floor
            && viewz > control.ceilingheight
        {
            self.polyobj_plane(ctx, backend, po, true, control.ceilingheight, alpha);
        }
    }

    fn polyobj_plane<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        po: usize,
        is_ceiling: bool,
        height: f32,
        alpha: Option<i32>,
    ) {
        let control = ctx.level.polyobjects[po].control.as_ref();
        let flat = if is_ceiling {
            control.ceilingpic
        } else {
            control.floorpic
        };
        let light = control.lightlevel;
        let colormap = control.extra_colormap;

        match alpha {
            Some(a) => self.state_mut().drawnodes.add_polyplane(PolyPlaneInfo {
                polyobj: po,
                is_ceiling,
                height,
                lightlevel: light,
                flat,
                alpha: a,
                fof_sector: None,
                blend: PolyFlags::TRANSLUCENT,
                colormap,
            }),
            None => self.render_polyobj_plane(
                ctx,
                backend,
                po,
                is_ceiling,
                height,
                PolyFlags::OCCLUDE,
                light,
                flat,
                control,
                255,
                colormap,
            ),
        }
    }
}

/// Light level and colormap for a plane at a height, banded sectors reading
/// from their light list.
fn plane_light(sector: &Sector, z: f32, pos: Vec2, underside: bool) -> (i32, Option<usize>) {
    if sector.has_lightlist() {
        let idx = sector.light_index_at(z, pos, underside);
        (
            sector.band_light(idx),
            sector.lightlist[idx].colormap.or(sector.extra_colormap),
        )
    } else {
        (sector.lightlevel, sector.extra_colormap)
    }
}

/// Reference point for plane texturing and band lookups: the outline
/// centroid, or the view position for degenerate outlines.
fn plane_ref_point(points: &[Vec2], fallback: Vec2) -> Vec2 {
    if points.is_empty() {
        return fallback;
    }
    points.iter().copied().sum::<Vec2>() / points.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use level::{LineDef, LineDefFlags, MapPtr, Node, SideDef, SubSector, BBox, PlanePoly};
    use math::Angle;

    #[test]
    fn empty_clipper_sees_everything() {
        let clip = AngleClipper::default();
        assert!(clip.safe_check_range(0x1000_0000, 0x2000_0000));
        assert!(clip.safe_check_range(0xF000_0000, 0x1000_0000));
    }

    #[test]
    fn covered_span_is_hidden() {
        let mut clip = AngleClipper::default();
        clip.safe_add_clip_range(0x1000_0000, 0x5000_0000);
        assert!(!clip.safe_check_range(0x2000_0000, 0x4000_0000));
        // straddling one edge stays visible
        assert!(clip.safe_check_range(0x0800_0000, 0x2000_0000));
        assert!(clip.safe_check_range(0x4000_0000, 0x6000_0000));
    }

    #[test]
    fn adjacent_ranges_merge() {
        let mut clip = AngleClipper::default();
        clip.safe_add_clip_range(0x1000_0000, 0x3000_0000);
        clip.safe_add_clip_range(0x2000_0000, 0x5000_0000);
        // one merged range must cover the union
        assert!(!clip.safe_check_range(0x1800_0000, 0x4800_0000));
    }

    #[test]
    fn disjoint_ranges_leave_gap_visible() {
        let mut clip = AngleClipper::default();
        clip.safe_add_clip_range(0x1000_0000, 0x2000_0000);
        clip.safe_add_clip_range(0x4000_0000, 0x5000_0000);
        assert!(clip.safe_check_range(0x2800_0000, 0x3800_0000));
        // a span across both ranges and the gap stays visible too
        assert!(clip.safe_check_range(0x1800_0000, 0x4800_0000));
    }

    #[test]
    fn wrapping_add_covers_both_halves() {
        let mut clip = AngleClipper::default();
        clip.safe_add_clip_range(0xE000_0000, 0x2000_0000);
        assert!(!clip.safe_check_range(0xF000_0000, 0x1000_0000));
        assert!(clip.safe_check_range(0x3000_0000, 0x4000_0000));
    }

    #[test]
    fn clear_resets_coverage() {
        let mut clip = AngleClipper::default();
        clip.safe_add_clip_range(0, ANGLE_MAX);
        assert!(!clip.safe_check_range(0x1000_0000, 0x2000_0000));
        clip.clear();
        assert!(clip.safe_check_range(0x1000_0000, 0x2000_0000));
    }

    #[test]
    fn frustum_widens_with_pitch() {
        let level_view =
            ViewPoint::new(glam::Vec3::ZERO, Angle::default(), Angle::default(), 90.0);
        let mut tilted = level_view;
        tilted.aiming = Angle::new(30f32.to_radians());
        let a_level = frustum_angle(&level_view);
        let a_tilted = frustum_angle(&tilted);
        assert!(a_tilted > a_level);
        // extreme pitch gives up on culling entirely
        tilted.aiming = Angle::new(80f32.to_radians());
        assert_eq!(frustum_angle(&tilted), ANGLE_180);
    }

    fn leaf(i: u32) -> u32 {
        i | IS_SSECTOR_MASK
    }

    #[test]
    fn point_in_subsector_walks_nodes() {
        let mut level = Level::new(0);
        let mut sector = Sector::new(0, 0.0, 128.0, 0, 0, 255);
        // split line running north at x=0: east leaf 0, west leaf 1
        level.nodes.push(Node {
            xy: Vec2::ZERO,
            delta: Vec2::new(0.0, 64.0),
            bboxes: [[Vec2::ZERO; 2]; 2],
            children: [leaf(0), leaf(1)],
        });
        for _ in 0..2 {
            level.subsectors.push(SubSector {
                sector: unsafe { MapPtr::new(&mut sector) },
                seg_count: 0,
                start_seg: 0,
                planepoly: PlanePoly::default(),
                polyobjs: Vec::new(),
            });
        }
        level.root_node = 0;

        assert_eq!(point_in_subsector(&level, Vec2::new(10.0, 0.0)), 0);
        assert_eq!(point_in_subsector(&level, Vec2::new(-10.0, 0.0)), 1);
    }

    struct DoorSetup {
        front: Box<Sector>,
        back: Box<Sector>,
        side: Box<SideDef>,
        line: Box<LineDef>,
    }

    fn door(back_floor: f32, back_ceiling: f32, top: bool, bottom: bool) -> (DoorSetup, Segment) {
        let mut front = Box::new(Sector::new(0, 0.0, 128.0, 0, 0, 255));
        let mut back = Box::new(Sector::new(1, back_floor, back_ceiling, 0, 0, 255));
        let mut side = Box::new(SideDef {
            textureoffset: 0.0,
            rowoffset: 0.0,
            toptexture: top.then_some(0),
            bottomtexture: bottom.then_some(0),
            midtexture: None,
            repeat_count: 0,
            sector: unsafe { MapPtr::new(&mut front) },
        });
        let v1 = Vec2::new(0.0, 0.0);
        let v2 = Vec2::new(64.0, 0.0);
        let mut line = Box::new(LineDef {
            v1,
            v2,
            delta: v2 - v1,
            flags: LineDefFlags::TwoSided as u32,
            special: 0,
            tag: 0,
            translucency: None,
            blend: 0,
            bbox: BBox::new(v1, v2),
            front_sidedef: unsafe { MapPtr::new(&mut side) },
            back_sidedef: None,
            frontsector: unsafe { MapPtr::new(&mut front) },
            backsector: Some(unsafe { MapPtr::new(&mut back) }),
            portal_target: None,
        });
        let seg = Segment {
            v1,
            v2,
            offset: 0.0,
            angle: Angle::default(),
            length: 64.0,
            sidedef: unsafe { MapPtr::new(&mut side) },
            linedef: unsafe { MapPtr::new(&mut line) },
            frontsector: unsafe { MapPtr::new(&mut front) },
            backsector: Some(unsafe { MapPtr::new(&mut back) }),
            polyobj: None,
        };
        (DoorSetup { front, back, side, line }, seg)
    }

    #[test]
    fn shut_door_clips_solid() {
        // back ceiling at the front floor: fully shut
        let (setup, seg) = door(0.0, 0.0, true, true);
        assert!(check_clip(9999, &seg, &setup.front, &setup.back));
        let _ = &setup.side;
        let _ = &setup.line;
    }

    #[test]
    fn open_window_does_not_clip() {
        let (setup, seg) = door(16.0, 112.0, true, true);
        assert!(!check_clip(9999, &seg, &setup.front, &setup.back));
    }

    #[test]
    fn self_shut_back_without_textures_stays_open() {
        // back sector shut on itself below the front ceiling but the upper
        // texture is missing: the transparent-door trick keeps it open
        let (setup, seg) = door(64.0, 64.0, false, true);
        assert!(!check_clip(9999, &seg, &setup.front, &setup.back));
        // with both textures present it clips
        let (setup, seg) = door(64.0, 64.0, true, true);
        assert!(check_clip(9999, &seg, &setup.front, &setup.back));
    }

    #[test]
    fn sky_backed_shut_sector_stays_open() {
        let (mut setup, seg) = door(64.0, 64.0, true, true);
        setup.back.ceilingpic = 5;
        assert!(!check_clip(5, &seg, &setup.front, &setup.back));
    }
}
