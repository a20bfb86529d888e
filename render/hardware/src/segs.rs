//! Wall quads for one seg: single-sided middles, two-sided top/bottom/middle
//! textures, depth-only sky walls, and 3D-floor sides. Quads crossing a
//! stacked-light sector split into one band per light level.
//!
//! Vertex ordering for every wall quad:
//! ```text
//!  3--2
//!  | /|
//!  |/ |
//!  0--1
//! ```
//! with 0/3 on the seg's first vertex and 1/2 on the second.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec2;
use level::{
    BlendStyle, Fof, FofFlags, LineDefFlags, Sector, Segment, HORIZON_SPECIAL,
};
use math::float_rem;
use render_backend::{
    GraphicsBackend, OutVector, PolyFlags, ShaderTarget, SurfaceInfo, TextureSource,
};

use crate::defs::WallInfo;
use crate::light::{
    alpha_from_translucency_table, blend_mode_flag, calc_wall_light, surface_blend,
};
use crate::{HardwareRenderer, RenderContext};

/// Sky walls stretch to the vertical edges of map space.
const MAP_TOP: f32 = 32768.0;
const MAP_BOTTOM: f32 = -32768.0;

/// Band boundaries that cut ordinary level geometry.
const CUT_LEVEL: u32 = FofFlags::CutSolids as u32 | FofFlags::CutSprites as u32;

/// Blend bits that route a wall to the deferred-translucency list.
const DEFERRED_BLEND: PolyFlags = PolyFlags(
    PolyFlags::TRANSLUCENT.0
        | PolyFlags::ADDITIVE.0
        | PolyFlags::SUBTRACTIVE.0
        | PolyFlags::REVERSE_SUBTRACT.0
        | PolyFlags::MULTIPLICATIVE.0
        | PolyFlags::ENVIRONMENT.0,
);

#[inline]
fn has_flag(flags: u32, flag: LineDefFlags) -> bool {
    flags & flag as u32 != 0
}

/// Front/back sector heights evaluated at both seg endpoints. Slopes make
/// the two ends differ, so every height carries an `_end` twin.
#[derive(Debug, Default, Clone, Copy)]
struct SegBounds {
    front_top: f32,
    front_top_end: f32,
    front_bottom: f32,
    front_bottom_end: f32,
    back_top: f32,
    back_top_end: f32,
    back_bottom: f32,
    back_bottom_end: f32,
}

#[inline]
fn set_heights(verts: &mut [OutVector; 4], top1: f32, top2: f32, bot1: f32, bot2: f32) {
    verts[3].y = top1;
    verts[2].y = top2;
    verts[0].y = bot1;
    verts[1].y = bot2;
}

impl HardwareRenderer {
    /// Emit all wall geometry for one front-facing seg.
    pub(crate) fn process_seg<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
    ) {
        #[cfg(feature = "hprof")]
        profile!("process_seg");

        let vs = seg.v1;
        let ve = seg.v2;
        let front = seg.frontsector.as_ref();

        let mut bounds = SegBounds {
            front_top: front.ceiling_z_at(vs),
            front_top_end: front.ceiling_z_at(ve),
            front_bottom: front.floor_z_at(vs),
            front_bottom_end: front.floor_z_at(ve),
            ..SegBounds::default()
        };

        let mut verts = [OutVector::default(); 4];
        verts[0].x = vs.x;
        verts[0].z = vs.y;
        verts[3].x = vs.x;
        verts[3].z = vs.y;
        verts[1].x = ve.x;
        verts[1].z = ve.y;
        verts[2].x = ve.x;
        verts[2].z = ve.y;

        // horizontal texture range along the seg
        let hpeg = seg.sidedef.textureoffset + seg.offset;
        let cliplow = hpeg;
        let cliphigh = hpeg + seg.length;

        let mut lightnum = front.lightlevel;
        if front.extra_colormap.is_none() {
            lightnum = calc_wall_light(lightnum, vs, ve, ctx.config.fake_contrast);
        }

        if let Some(back) = &seg.backsector {
            let back = back.as_ref();
            bounds.back_top = back.ceiling_z_at(vs);
            bounds.back_top_end = back.ceiling_z_at(ve);
            bounds.back_bottom = back.floor_z_at(vs);
            bounds.back_bottom_end = back.floor_z_at(ve);
            self.two_sided(ctx, backend, seg, &bounds, &mut verts, cliplow, cliphigh, lightnum);

            if !self.drawing_stencil
                && front.tag != back.tag
                && (!front.fofs.is_empty() || !back.fofs.is_empty())
            {
                self.process_seg_fofs(ctx, backend, seg, &bounds, &mut verts, cliplow, cliphigh, lightnum);
            }
        } else {
            self.single_sided(ctx, backend, seg, &bounds, &mut verts, cliplow, cliphigh, lightnum);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn single_sided<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
        b: &SegBounds,
        verts: &mut [OutVector; 4],
        cliplow: f32,
        cliphigh: f32,
        lightnum: i32,
    ) {
        let front = seg.frontsector.as_ref();
        let line = seg.linedef.as_ref();
        let side = seg.sidedef.as_ref();

        if let Some(mid) = side.midtexture {
            // horizon lines keep their floor/ceiling but never a wall
            if line.special != HORIZON_SPECIAL {
                let tex = ctx.pics.texture(mid);
                let (sx, sy) = (tex.scale_x(), tex.scale_y());

                let vpeg = if has_flag(line.flags, LineDefFlags::UnpegBottom)
                    && has_flag(line.flags, LineDefFlags::PegMidSlope)
                {
                    front.floorheight + tex.height - front.ceilingheight + side.rowoffset
                } else if has_flag(line.flags, LineDefFlags::UnpegBottom) {
                    b.front_bottom + tex.height - b.front_top + side.rowoffset
                } else {
                    side.rowoffset
                };

                verts[3].t = vpeg * sy;
                verts[2].t = verts[3].t;
                verts[0].t = (vpeg + front.ceilingheight - front.floorheight) * sy;
                verts[1].t = verts[0].t;
                verts[0].s = cliplow * sx;
                verts[3].s = verts[0].s;
                verts[2].s = cliphigh * sx;
                verts[1].s = verts[2].s;

                // slope corrections keep the texture anchored to the flat
                // reference heights
                if has_flag(line.flags, LineDefFlags::PegMidSlope) {
                    verts[3].t += (front.ceilingheight - b.front_top) * sy;
                    verts[2].t += (front.ceilingheight - b.front_top_end) * sy;
                    verts[0].t += (front.floorheight - b.front_bottom) * sy;
                    verts[1].t += (front.floorheight - b.front_bottom_end) * sy;
                } else if has_flag(line.flags, LineDefFlags::UnpegBottom) {
                    verts[3].t = verts[0].t + (b.front_bottom - b.front_top) * sy;
                    verts[2].t = verts[1].t + (b.front_bottom_end - b.front_top_end) * sy;
                } else {
                    verts[0].t = verts[3].t - (b.front_bottom - b.front_top) * sy;
                    verts[1].t = verts[2].t - (b.front_bottom_end - b.front_top_end) * sy;
                }

                set_heights(verts, b.front_top, b.front_top_end, b.front_bottom, b.front_bottom_end);

                let texture = TextureSource::Texture(mid);
                if !self.drawing_stencil && front.has_lightlist() {
                    self.split_wall(
                        ctx, backend, front, verts, texture, 255, CUT_LEVEL, None,
                        PolyFlags::NONE,
                    );
                } else if !self.drawing_stencil && tex.transparent {
                    self.add_transparent_wall(
                        verts,
                        255,
                        texture,
                        PolyFlags::ENVIRONMENT,
                        false,
                        lightnum,
                        front.extra_colormap,
                    );
                } else {
                    self.project_wall(
                        ctx,
                        backend,
                        verts,
                        texture,
                        PolyFlags::MASKED,
                        lightnum,
                        front.extra_colormap,
                    );
                }
            }
        }

        if seg.polyobj.is_none() {
            if front.ceilingpic == ctx.level.sky_flat {
                set_heights(verts, MAP_TOP, MAP_TOP, b.front_top, b.front_top_end);
                self.draw_sky_wall(ctx, backend, verts);
            }
            if front.floorpic == ctx.level.sky_flat {
                set_heights(verts, b.front_bottom, b.front_bottom_end, MAP_BOTTOM, MAP_BOTTOM);
                self.draw_sky_wall(ctx, backend, verts);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn two_sided<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
        b: &SegBounds,
        verts: &mut [OutVector; 4],
        cliplow: f32,
        cliphigh: f32,
        lightnum: i32,
    ) {
        let front = seg.frontsector.as_ref();
        let back = seg.backsector.as_ref().unwrap().as_ref();
        let side = seg.sidedef.as_ref();

        // shared sky on a side suppresses that side's texture entirely
        let both_ceilings_sky =
            front.ceilingpic == ctx.level.sky_flat && back.ceilingpic == ctx.level.sky_flat;
        let both_floors_sky =
            front.floorpic == ctx.level.sky_flat && back.floorpic == ctx.level.sky_flat;

        if !both_ceilings_sky
            && (b.back_top_end < b.front_top_end || b.back_top < b.front_top)
        {
            if let Some(top) = side.toptexture {
                self.two_sided_top(ctx, backend, seg, b, verts, cliplow, cliphigh, lightnum, top);
            }
        }

        if !both_floors_sky
            && (b.back_bottom_end < b.front_bottom_end || b.back_bottom < b.front_bottom)
        {
            if let Some(bottom) = side.bottomtexture {
                self.two_sided_bottom(ctx, backend, seg, b, verts, cliplow, cliphigh, lightnum, bottom);
            }
        }

        // a two-sided middle goes to the stencil even without a texture;
        // portals need the window quad
        if side.midtexture.is_some() || self.drawing_stencil {
            self.two_sided_middle(
                ctx,
                backend,
                seg,
                b,
                verts,
                cliplow,
                cliphigh,
                lightnum,
                side.midtexture,
            );
        }

        if seg.polyobj.is_none() {
            if front.ceilingpic == ctx.level.sky_flat && back.ceilingpic != ctx.level.sky_flat {
                set_heights(verts, MAP_TOP, MAP_TOP, b.front_top, b.front_top_end);
                self.draw_sky_wall(ctx, backend, verts);
            }
            if front.floorpic == ctx.level.sky_flat && back.floorpic != ctx.level.sky_flat {
                set_heights(verts, b.front_bottom, b.front_bottom_end, MAP_BOTTOM, MAP_BOTTOM);
                self.draw_sky_wall(ctx, backend, verts);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn two_sided_top<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
        b: &SegBounds,
        verts: &mut [OutVector; 4],
        cliplow: f32,
        cliphigh: f32,
        lightnum: i32,
        texture_id: usize,
    ) {
        let front = seg.frontsector.as_ref();
        let back = seg.backsector.as_ref().unwrap().as_ref();
        let line = seg.linedef.as_ref();
        let side = seg.sidedef.as_ref();
        let tex = ctx.pics.texture(texture_id);
        let (sx, sy) = (tex.scale_x(), tex.scale_y());

        let mut vpeg = if has_flag(line.flags, LineDefFlags::UnpegTop) {
            0.0
        } else if has_flag(line.flags, LineDefFlags::SkewTexture) {
            b.back_top + tex.height - b.front_top
        } else {
            back.ceilingheight + tex.height - front.ceilingheight
        };
        vpeg += side.rowoffset;
        // bound the peg on multi-tile textures
        vpeg = float_rem(vpeg, tex.height);

        verts[3].t = vpeg * sy;
        verts[2].t = verts[3].t;
        verts[0].t = (vpeg + front.ceilingheight - back.ceilingheight) * sy;
        verts[1].t = verts[0].t;
        verts[0].s = cliplow * sx;
        verts[3].s = verts[0].s;
        verts[2].s = cliphigh * sx;
        verts[1].s = verts[2].s;

        if !has_flag(line.flags, LineDefFlags::SkewTexture) {
            // unskewed
            verts[3].t -= (b.front_top - front.ceilingheight) * sy;
            verts[2].t -= (b.front_top_end - front.ceilingheight) * sy;
            verts[0].t -= (b.back_top - back.ceilingheight) * sy;
            verts[1].t -= (b.back_top_end - back.ceilingheight) * sy;
        } else if has_flag(line.flags, LineDefFlags::UnpegTop) {
            // skewed by top
            verts[0].t = (vpeg + b.front_top - b.back_top) * sy;
            verts[1].t = (vpeg + b.front_top_end - b.back_top_end) * sy;
        } else {
            // skewed by bottom
            verts[0].t = (vpeg + b.front_top - b.back_top) * sy;
            verts[1].t = verts[0].t;
            verts[3].t = verts[0].t - (b.front_top - b.back_top) * sy;
            verts[2].t = verts[1].t - (b.front_top_end - b.back_top_end) * sy;
        }

        set_heights(verts, b.front_top, b.front_top_end, b.back_top, b.back_top_end);

        let texture = TextureSource::Texture(texture_id);
        if !self.drawing_stencil && front.has_lightlist() {
            self.split_wall(ctx, backend, front, verts, texture, 255, CUT_LEVEL, None, PolyFlags::NONE);
        } else if !self.drawing_stencil && tex.transparent {
            self.add_transparent_wall(
                verts,
                255,
                texture,
                PolyFlags::ENVIRONMENT,
                false,
                lightnum,
                front.extra_colormap,
            );
        } else {
            self.project_wall(
                ctx,
                backend,
                verts,
                texture,
                PolyFlags::MASKED,
                lightnum,
                front.extra_colormap,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn two_sided_bottom<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
        b: &SegBounds,
        verts: &mut [OutVector; 4],
        cliplow: f32,
        cliphigh: f32,
        lightnum: i32,
        texture_id: usize,
    ) {
        let front = seg.frontsector.as_ref();
        let back = seg.backsector.as_ref().unwrap().as_ref();
        let line = seg.linedef.as_ref();
        let side = seg.sidedef.as_ref();
        let tex = ctx.pics.texture(texture_id);
        let (sx, sy) = (tex.scale_x(), tex.scale_y());

        let mut vpeg = if !has_flag(line.flags, LineDefFlags::UnpegBottom) {
            0.0
        } else if has_flag(line.flags, LineDefFlags::SkewTexture) {
            b.front_bottom - b.back_bottom
        } else {
            front.floorheight - back.floorheight
        };
        vpeg += side.rowoffset;
        vpeg = float_rem(vpeg, tex.height);

        verts[3].t = vpeg * sy;
        verts[2].t = verts[3].t;
        verts[0].t = (vpeg + back.floorheight - front.floorheight) * sy;
        verts[1].t = verts[0].t;
        verts[0].s = cliplow * sx;
        verts[3].s = verts[0].s;
        verts[2].s = cliphigh * sx;
        verts[1].s = verts[2].s;

        if !has_flag(line.flags, LineDefFlags::SkewTexture) {
            // unskewed
            verts[0].t -= (b.front_bottom - front.floorheight) * sy;
            verts[1].t -= (b.front_bottom_end - front.floorheight) * sy;
            verts[3].t -= (b.back_bottom - back.floorheight) * sy;
            verts[2].t -= (b.back_bottom_end - back.floorheight) * sy;
        } else if has_flag(line.flags, LineDefFlags::UnpegBottom) {
            // skewed by bottom
            verts[0].t = (vpeg + b.back_bottom - b.front_bottom) * sy;
            verts[1].t = verts[0].t;
            verts[2].t = verts[1].t - (b.back_bottom_end - b.front_bottom_end) * sy;
        } else {
            // skewed by top
            verts[0].t = (vpeg + b.back_bottom - b.front_bottom) * sy;
            verts[1].t = (vpeg + b.back_bottom_end - b.front_bottom_end) * sy;
        }

        set_heights(verts, b.back_bottom, b.back_bottom_end, b.front_bottom, b.front_bottom_end);

        let texture = TextureSource::Texture(texture_id);
        if !self.drawing_stencil && front.has_lightlist() {
            self.split_wall(ctx, backend, front, verts, texture, 255, CUT_LEVEL, None, PolyFlags::NONE);
        } else if !self.drawing_stencil && tex.transparent {
            self.add_transparent_wall(
                verts,
                255,
                texture,
                PolyFlags::ENVIRONMENT,
                false,
                lightnum,
                front.extra_colormap,
            );
        } else {
            self.project_wall(
                ctx,
                backend,
                verts,
                texture,
                PolyFlags::MASKED,
                lightnum,
                front.extra_colormap,
            );
        }
    }

    /// Two-sided middle texture, and the stencil window quad for portal
    /// lines even when no texture is set.
    #[allow(clippy::too_many_arguments)]
    fn two_sided_middle<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
        b: &SegBounds,
        verts: &mut [OutVector; 4],
        cliplow: f32,
        cliphigh: f32,
        lightnum: i32,
        texture_id: Option<usize>,
    ) {
        let line = seg.linedef.as_ref();
        let side = seg.sidedef.as_ref();
        let seg_front = seg.frontsector.as_ref();

        // fake floor/ceiling sectors substitute for height comparisons
        let front: &Sector = match line.frontsector.heightsec {
            Some(hs) => &ctx.level.sectors[hs],
            None => line.frontsector.as_ref(),
        };
        let back: &Sector = match line.backsector.as_ref().and_then(|s| s.heightsec) {
            Some(hs) => &ctx.level.sectors[hs],
            None => line.backsector.as_ref().unwrap().as_ref(),
        };

        let tex = texture_id.map(|id| ctx.pics.texture(id));

        let repeats = match &tex {
            Some(t) => {
                if side.repeat_count > 0 {
                    1.0 + side.repeat_count as f32
                } else if side.repeat_count < 0 {
                    // fill the whole opening, tiling an extra time for any
                    // remainder
                    let high = front.ceilingheight.min(back.ceilingheight);
                    let low = front.floorheight.max(back.floorheight);
                    ((high - low) / t.height).ceil().max(1.0)
                } else {
                    1.0
                }
            }
            None => 1.0,
        };

        // open interval limits; polyobject segs take them from the
        // polyobject's control sector via the line's back side
        let (open_top, open_bottom) = if seg.polyobj.is_some() {
            (back.ceilingheight, back.floorheight)
        } else {
            (
                b.front_top.min(b.back_top),
                b.front_bottom.max(b.back_bottom),
            )
        };

        let peg_to_floor = has_flag(line.flags, LineDefFlags::UnpegBottom)
            ^ has_flag(line.flags, LineDefFlags::PegMiddle);

        let (mut poly_top, mut poly_bottom) = match &tex {
            Some(t) => {
                if has_flag(line.flags, LineDefFlags::PegMidSlope) {
                    if peg_to_floor {
                        let bottom =
                            front.floorheight.max(back.floorheight) + side.rowoffset;
                        (bottom + t.height * repeats, bottom)
                    } else {
                        let top = front.ceilingheight.min(back.ceilingheight) + side.rowoffset;
                        (top, top - t.height * repeats)
                    }
                } else if peg_to_floor {
                    let bottom = open_bottom + side.rowoffset;
                    (bottom + t.height * repeats, bottom)
                } else {
                    let top = open_top + side.rowoffset;
                    (top, top - t.height * repeats)
                }
            }
            // stencil quad fills the whole opening
            None => (open_top, open_bottom),
        };

        let (mut high_cut, mut low_cut) = if seg.polyobj.is_some() {
            (poly_top, poly_bottom)
        } else {
            (open_top, open_bottom)
        };

        let mut h = high_cut.min(poly_top);
        let mut l = poly_bottom.max(low_cut);

        let (sx, sy) = tex
            .as_ref()
            .map(|t| (t.scale_x(), t.scale_y()))
            .unwrap_or((1.0, 1.0));

        if let Some(t) = &tex {
            let vpeg = if peg_to_floor {
                t.height * repeats - h + poly_bottom
            } else {
                poly_top - h
            };
            verts[3].t = vpeg * sy;
            verts[2].t = verts[3].t;
            verts[0].t = (h - l + vpeg) * sy;
            verts[1].t = verts[0].t;
            verts[0].s = cliplow * sx;
            verts[3].s = verts[0].s;
            verts[2].s = cliphigh * sx;
            verts[1].s = verts[2].s;
        }

        verts[3].y = h;
        verts[2].y = h;
        verts[0].y = l;
        verts[1].y = l;

        // second pass slides the far end of the quad along any slopes
        {
            let slant = if has_flag(line.flags, LineDefFlags::PegMidSlope) {
                0.0
            } else if peg_to_floor {
                if b.back_bottom < b.front_bottom {
                    b.front_bottom_end - b.front_bottom
                } else {
                    b.back_bottom_end - b.back_bottom
                }
            } else if b.front_top < b.back_top {
                b.front_top_end - b.front_top
            } else {
                b.back_top_end - b.back_top
            };

            poly_top += slant;
            poly_bottom += slant;

            high_cut += if b.front_top < b.back_top {
                b.front_top_end - b.front_top
            } else {
                b.back_top_end - b.back_top
            };
            low_cut += if b.back_bottom < b.front_bottom {
                b.front_bottom_end - b.front_bottom
            } else {
                b.back_bottom_end - b.back_bottom
            };

            h = high_cut.min(poly_top);
            l = poly_bottom.max(low_cut);

            if let Some(t) = &tex {
                let vpeg = if peg_to_floor {
                    t.height * repeats - h + poly_bottom
                } else {
                    poly_top - h
                };
                verts[2].t = vpeg * sy;
                verts[1].t = (h - l + vpeg) * sy;
            }
            verts[2].y = h;
            verts[1].y = l;
        }

        // alpha and blend come from the line special, with polyobject
        // translucency overriding
        let mut surf = SurfaceInfo::default();
        let mut blend = match line.translucency {
            Some(trans) => surface_blend(BlendStyle::from(line.blend), trans, &mut surf),
            None if line.blend != 0 => blend_mode_flag(BlendStyle::from(line.blend)),
            None => PolyFlags::MASKED,
        };

        if let Some(po) = seg.polyobj {
            if let Some(trans) = ctx.level.polyobjects[po].translucency {
                if trans >= 10 {
                    // not drawn at all
                    surf.poly_color[3] = 0x00;
                    blend = PolyFlags::MASKED;
                } else if trans > 0 {
                    surf.poly_color[3] = alpha_from_translucency_table(trans);
                    blend = PolyFlags::TRANSLUCENT;
                }
            }
        }

        // depth bias so midtextures win against coplanar FOF sides
        blend |= PolyFlags::DECAL;
        if tex.is_none() {
            blend |= PolyFlags::NO_TEXTURE;
        }

        let texture = match texture_id {
            Some(id) => TextureSource::Texture(id),
            None => TextureSource::None,
        };
        let alpha = surf.poly_color[3];

        if !self.drawing_stencil && seg_front.has_lightlist() {
            let cut = if !blend.contains(PolyFlags::MASKED) {
                FofFlags::Translucent as u32
            } else {
                CUT_LEVEL
            };
            self.split_wall(ctx, backend, seg_front, verts, texture, alpha, cut, None, blend);
        } else if !self.drawing_stencil && !blend.contains(PolyFlags::MASKED) {
            self.add_transparent_wall(
                verts,
                alpha,
                texture,
                blend,
                false,
                lightnum,
                seg_front.extra_colormap,
            );
        } else {
            self.project_wall(ctx, backend, verts, texture, blend, lightnum, seg_front.extra_colormap);
        }
    }

    /// Side quads for every 3D-floor straddling a two-sided opening.
    #[allow(clippy::too_many_arguments)]
    fn process_seg_fofs<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
        b: &SegBounds,
        verts: &mut [OutVector; 4],
        cliplow: f32,
        cliphigh: f32,
        lightnum: i32,
    ) {
        let front = seg.frontsector.as_ref();
        let back = seg.backsector.as_ref().unwrap().as_ref();

        // the opening bounds clip FOF sides so they never overlap the top
        // and bottom textures
        let low_cut = b.front_bottom.max(b.back_bottom);
        let high_cut = b.front_top.min(b.back_top);
        let low_cut_end = b.front_bottom_end.max(b.back_bottom_end);
        let high_cut_end = b.front_top_end.min(b.back_top_end);
        let cuts = (low_cut, high_cut, low_cut_end, high_cut_end);

        if !back.fofs.is_empty() {
            self.seg_fofs_for_sector(
                ctx, backend, seg, verts, cliplow, cliphigh, lightnum, cuts, back, front, false,
            );
        }
        if !front.fofs.is_empty() {
            self.seg_fofs_for_sector(
                ctx, backend, seg, verts, cliplow, cliphigh, lightnum, cuts, front, back, true,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn seg_fofs_for_sector<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        seg: &Segment,
        verts: &mut [OutVector; 4],
        cliplow: f32,
        cliphigh: f32,
        mut lightnum: i32,
        cuts: (f32, f32, f32, f32),
        this_sector: &Sector,
        other_sector: &Sector,
        is_front_sector: bool,
    ) {
        let (low_cut, high_cut, low_cut_end, high_cut_end) = cuts;
        let vs = seg.v1;
        let ve = seg.v2;
        let line = seg.linedef.as_ref();
        let mut colormap = seg.frontsector.extra_colormap;

        for rover in &this_sector.fofs {
            // skip FOFs present on both sides, their sides are interior
            if other_sector
                .fofs
                .iter()
                .any(|r2| r2.master_line == rover.master_line)
            {
                continue;
            }
            if !rover.has(FofFlags::Exists) || !rover.has(FofFlags::RenderSides) {
                continue;
            }
            if is_front_sector {
                if !(rover.has(FofFlags::AllSides) || rover.has(FofFlags::InvertSides)) {
                    continue;
                }
            } else if !rover.has(FofFlags::AllSides) && rover.has(FofFlags::InvertSides) {
                continue;
            }

            let top1 = rover.top_at(vs);
            let top2 = rover.top_at(ve);
            let bot1 = rover.bottom_at(vs);
            let bot2 = rover.bottom_at(ve);

            // fully outside the opening
            if (top1 < low_cut && top2 < low_cut_end)
                || (bot1 > high_cut && bot2 > high_cut_end)
            {
                continue;
            }

            let master = &ctx.level.lines[rover.master_line];
            let texture_id = master.front_sidedef.midtexture;

            let (mut h, mut h_end) = (top1, top2);
            let (mut l, mut l_end) = (bot1, bot2);
            if h >= high_cut && h_end >= high_cut_end {
                h = high_cut;
                h_end = high_cut_end;
            }
            if l <= low_cut && l_end <= low_cut_end {
                l = low_cut;
                l_end = low_cut_end;
            }

            set_heights(verts, h, h_end, l, l_end);

            if rover.has(FofFlags::Fog) {
                for v in verts.iter_mut() {
                    v.s = 0.0;
                    v.t = 0.0;
                }
            } else {
                let tex = ctx.pics.texture(texture_id.unwrap_or(0));
                let (sx, sy) = (tex.scale_x(), tex.scale_y());

                let mut vpeg = master.front_sidedef.rowoffset;
                let attach_to_bottom = has_flag(line.flags, LineDefFlags::UnpegBottom);
                let slope_skew = has_flag(master.flags, LineDefFlags::UnpegTop);
                let fof_top = rover.control.ceilingheight;
                let fof_bottom = rover.control.floorheight;

                if !slope_skew {
                    if attach_to_bottom {
                        vpeg -= fof_top - fof_bottom;
                    }
                    verts[3].t = (fof_top - h + vpeg) * sy;
                    verts[2].t = (fof_top - h_end + vpeg) * sy;
                    verts[0].t = (fof_top - l + vpeg) * sy;
                    verts[1].t = (fof_top - l_end + vpeg) * sy;
                } else if !attach_to_bottom {
                    // skew by top
                    verts[3].t = vpeg * sy;
                    verts[2].t = verts[3].t;
                    verts[0].t = (h - l + vpeg) * sy;
                    verts[1].t = (h_end - l_end + vpeg) * sy;
                } else {
                    // skew by bottom
                    verts[0].t = vpeg * sy;
                    verts[1].t = verts[0].t;
                    verts[3].t = verts[0].t - (h - l) * sy;
                    verts[2].t = verts[1].t - (h_end - l_end) * sy;
                }

                verts[0].s = cliplow * sx;
                verts[3].s = verts[0].s;
                verts[2].s = cliphigh * sx;
                verts[1].s = verts[2].s;
            }

            if rover.has(FofFlags::Fog) {
                let master_front = master.frontsector.as_ref();
                let blend = PolyFlags::FOG | PolyFlags::NO_TEXTURE;

                lightnum = master_front.lightlevel;
                colormap = master_front.extra_colormap;
                if colormap.is_none() {
                    lightnum = calc_wall_light(lightnum, vs, ve, ctx.config.fake_contrast);
                }
                let alpha = crate::light::fog_block_alpha(
                    master_front.lightlevel,
                    ctx.level.colormap(master_front.extra_colormap),
                    ctx.config.shaders,
                );

                if other_sector.has_lightlist() {
                    self.split_wall(
                        ctx,
                        backend,
                        other_sector,
                        verts,
                        TextureSource::None,
                        alpha,
                        rover.flags,
                        Some(rover),
                        blend,
                    );
                } else {
                    self.add_transparent_wall(
                        verts,
                        alpha,
                        TextureSource::None,
                        blend,
                        true,
                        lightnum,
                        colormap,
                    );
                }
            } else {
                let texture = match texture_id {
                    Some(id) => TextureSource::Texture(id),
                    None => TextureSource::None,
                };
                let mut blend = PolyFlags::MASKED;
                let mut alpha = 255u8;

                if (rover.has(FofFlags::Translucent) && rover.alpha < 256) || rover.blend != 0 {
                    blend = if rover.blend != 0 {
                        blend_mode_flag(BlendStyle::from(rover.blend))
                    } else {
                        PolyFlags::TRANSLUCENT
                    };
                    alpha = (rover.alpha - 1).clamp(0, 255) as u8;
                }

                if other_sector.has_lightlist() {
                    self.split_wall(
                        ctx,
                        backend,
                        other_sector,
                        verts,
                        texture,
                        alpha,
                        rover.flags,
                        Some(rover),
                        blend,
                    );
                } else if blend != PolyFlags::MASKED {
                    self.add_transparent_wall(verts, alpha, texture, blend, false, lightnum, colormap);
                } else {
                    self.project_wall(ctx, backend, verts, texture, PolyFlags::MASKED, lightnum, colormap);
                }
            }
        }
    }

    /// Slice one wall quad into per-light-band sub-quads, clipping away
    /// bands hidden behind solid 3D-floors. Texture t re-interpolates from
    /// the original quad's peg so bands tile seamlessly.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn split_wall<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        sector: &Sector,
        verts: &mut [OutVector; 4],
        texture: TextureSource,
        alpha: u8,
        cutflag: u32,
        fof: Option<&Fof>,
        polyflags: PolyFlags,
    ) {
        let v1 = Vec2::new(verts[0].x, verts[0].z);
        let v2 = Vec2::new(verts[1].x, verts[1].z);

        let real_top = verts[3].y;
        let real_bot = verts[0].y;
        let peg_t = verts[3].t;
        let peg_b = verts[0].t;
        let peg_mul = (peg_b - peg_t) / (real_top - real_bot);

        let end_real_top = verts[2].y;
        let end_real_bot = verts[1].y;
        let end_peg_t = verts[2].t;
        let end_peg_b = verts[1].t;
        let end_peg_mul = (end_peg_b - end_peg_t) / (end_real_top - end_real_bot);

        let mut top = real_top;
        let mut end_top = end_real_top;

        let mut lightnum =
            calc_wall_light(sector.lightlevel, v1, v2, ctx.config.fake_contrast);
        let mut colormap: Option<usize> = None;

        let extra_cut = cutflag & FofFlags::Extra as u32 != 0;
        let type_mask = FofFlags::Fog as u32 | FofFlags::Swimmable as u32;
        let fog_cut = cutflag & FofFlags::Fog as u32 != 0;

        for i in 0..sector.lightlist.len() {
            if end_top < end_real_bot && top < real_bot {
                return;
            }
            let band = &sector.lightlist[i];

            if !band.has(FofFlags::NoShade) {
                if let Some(f) = fof.filter(|f| f.has(FofFlags::Fog)) {
                    let master_front = ctx.level.lines[f.master_line].frontsector.as_ref();
                    lightnum = master_front.lightlevel;
                    colormap = master_front.extra_colormap;
                } else {
                    lightnum = band.lightlevel;
                    colormap = band.colormap;
                }
                if colormap.is_none() {
                    lightnum = calc_wall_light(lightnum, v1, v2, ctx.config.fake_contrast);
                }
            }

            let solid = if band.has(FofFlags::CutSolids) && !extra_cut {
                true
            } else if band.has(FofFlags::CutExtra) && extra_cut {
                // extra bands only merge with their own kind
                !band.has(FofFlags::Extra)
                    || (band.flags & type_mask) == (cutflag & type_mask)
            } else {
                false
            };

            let height = band.z_at(v1);
            let end_height = band.z_at(v2);
            if height >= top && end_height >= end_top && solid {
                let caster_bot = band.bottom_z_at(v1);
                let caster_bot_end = band.bottom_z_at(v2);
                if top > caster_bot {
                    top = caster_bot;
                }
                if end_top > caster_bot_end {
                    end_top = caster_bot_end;
                }
            }

            let (band_bot, end_band_bot) = match sector.lightlist.get(i + 1) {
                Some(next) => (next.z_at(v1), next.z_at(v2)),
                None => (real_bot, end_real_bot),
            };
            if end_band_bot >= end_top && band_bot >= top {
                continue;
            }

            let bot = band_bot.max(real_bot);
            let end_bot = end_band_bot.max(end_real_bot);

            verts[3].t = peg_t + (real_top - top) * peg_mul;
            verts[2].t = end_peg_t + (end_real_top - end_top) * end_peg_mul;
            verts[0].t = peg_t + (real_top - bot) * peg_mul;
            verts[1].t = end_peg_t + (end_real_top - end_bot) * end_peg_mul;
            set_heights(verts, top, end_top, bot, end_bot);

            if fog_cut {
                self.add_transparent_wall(
                    verts,
                    alpha,
                    texture,
                    PolyFlags::FOG | PolyFlags::NO_TEXTURE | polyflags,
                    true,
                    lightnum,
                    colormap,
                );
            } else if polyflags.intersects(DEFERRED_BLEND) {
                self.add_transparent_wall(verts, alpha, texture, polyflags, false, lightnum, colormap);
            } else {
                self.project_wall(
                    ctx,
                    backend,
                    verts,
                    texture,
                    PolyFlags::MASKED | polyflags,
                    lightnum,
                    colormap,
                );
            }

            top = bot;
            end_top = end_bot;
        }

        // remainder below the last band
        if end_top <= end_real_bot && top <= real_bot {
            return;
        }

        verts[3].t = peg_t + (real_top - top) * peg_mul;
        verts[2].t = end_peg_t + (end_real_top - end_top) * end_peg_mul;
        verts[0].t = peg_t + (real_top - real_bot) * peg_mul;
        verts[1].t = end_peg_t + (end_real_top - end_real_bot) * end_peg_mul;
        set_heights(verts, top, end_top, real_bot, end_real_bot);

        if fog_cut {
            self.add_transparent_wall(
                verts,
                alpha,
                texture,
                PolyFlags::FOG | PolyFlags::NO_TEXTURE | polyflags,
                true,
                lightnum,
                colormap,
            );
        } else if polyflags.intersects(DEFERRED_BLEND) {
            self.add_transparent_wall(verts, alpha, texture, polyflags, false, lightnum, colormap);
        } else {
            self.project_wall(
                ctx,
                backend,
                verts,
                texture,
                PolyFlags::MASKED | polyflags,
                lightnum,
                colormap,
            );
        }
    }

    /// Depth-only wall to sky height, so the dome is occluded correctly.
    fn draw_sky_wall<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        verts: &mut [OutVector; 4],
    ) {
        for v in verts.iter_mut() {
            v.s = 0.0;
            v.t = 0.0;
        }
        self.project_wall(
            ctx,
            backend,
            verts,
            TextureSource::None,
            PolyFlags::INVISIBLE | PolyFlags::NO_TEXTURE,
            255,
            None,
        );
    }

    /// Immediate (batched) wall submission.
    fn project_wall<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        verts: &[OutVector; 4],
        texture: TextureSource,
        mut blend: PolyFlags,
        lightlevel: i32,
        colormap: Option<usize>,
    ) {
        let surf = self.lighting(ctx, backend, lightlevel, colormap);
        let shader = if ctx.config.shaders {
            ShaderTarget::Wall
        } else {
            ShaderTarget::None
        };

        // stencil passes mark the window without touching colour
        if self.drawing_stencil {
            blend |= PolyFlags::INVISIBLE | PolyFlags::NO_ALPHA_TEST;
            blend = blend & !PolyFlags::MASKED;
        }

        let blend = self.world_blend(blend | PolyFlags::MODULATED | PolyFlags::OCCLUDE);
        self.state_mut().batch.process_polygon(
            backend,
            &surf,
            verts,
            blend,
            shader,
            texture,
            false,
        );
    }

    /// Queue a wall for the deferred-translucency resolver.
    #[allow(clippy::too_many_arguments)]
    fn add_transparent_wall(
        &mut self,
        verts: &[OutVector; 4],
        alpha: u8,
        texture: TextureSource,
        blend: PolyFlags,
        fogwall: bool,
        lightlevel: i32,
        colormap: Option<usize>,
    ) {
        let mut surf = SurfaceInfo::default();
        surf.poly_color[3] = alpha;
        self.state_mut().drawnodes.add_wall(WallInfo {
            verts: *verts,
            surf,
            texture,
            blend,
            fogwall,
            lightlevel,
            colormap,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HardwareRenderer, RenderConfig, RenderContext};
    use level::{
        Level, LightBand, LineDef, MapPtr, BBox, PicData, Sector, SideDef, TextureInfo, ViewPoint,
    };

    #[derive(Default)]
    struct QuadBackend {
        quads: Vec<([OutVector; 4], PolyFlags)>,
    }

    impl GraphicsBackend for QuadBackend {
        fn draw_polygon(
            &mut self,
            _surf: &SurfaceInfo,
            verts: &[OutVector],
            flags: PolyFlags,
            _shader: ShaderTarget,
            _horizon: bool,
        ) {
            let mut q = [OutVector::default(); 4];
            q.copy_from_slice(verts);
            self.quads.push((q, flags));
        }
        fn set_texture(&mut self, _s: TextureSource) {}
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

    fn side(sector: MapPtr<Sector>, mid: Option<usize>, top: Option<usize>) -> SideDef {
        SideDef {
            textureoffset: 0.0,
            rowoffset: 0.0,
            toptexture: top,
            bottomtexture: None,
            midtexture: mid,
            repeat_count: 0,
            sector,
        }
    }

    fn pics() -> PicData {
        PicData {
            textures: vec![TextureInfo {
                width: 64.0,
                height: 64.0,
                transparent: false,
            }],
            ..PicData::default()
        }
    }

    /// Level with one seg. Two sectors when `back` heights are given.
    fn wall_level(front_ceiling: f32, back: Option<(f32, f32)>) -> Level {
        let mut level = Level::new(usize::MAX);
        level
            .sectors
            .push(Sector::new(0, 0.0, front_ceiling, 0, 0, 200));
        if let Some((bf, bc)) = back {
            level.sectors.push(Sector::new(1, bf, bc, 0, 0, 200));
        }

        let front_sec = unsafe { MapPtr::new(&mut level.sectors[0]) };
        let back_sec = back.map(|_| unsafe { MapPtr::new(&mut level.sectors[1]) });

        let front_mid = if back.is_some() { None } else { Some(0) };
        let front_top = if back.is_some() { Some(0) } else { None };
        level
            .sides
            .push(side(front_sec.clone(), front_mid, front_top));
        let front_side = unsafe { MapPtr::new(&mut level.sides[0]) };

        let v1 = glam::Vec2::new(0.0, 0.0);
        let v2 = glam::Vec2::new(64.0, 0.0);
        level.lines.push(LineDef {
            v1,
            v2,
            delta: v2 - v1,
            flags: 0,
            special: 0,
            tag: 0,
            translucency: None,
            blend: 0,
            bbox: BBox::new(v1, v2),
            front_sidedef: front_side.clone(),
            back_sidedef: None,
            frontsector: front_sec.clone(),
            backsector: back_sec.clone(),
            portal_target: None,
        });
        let line = unsafe { MapPtr::new(&mut level.lines[0]) };

        level.segs.push(Segment {
            v1,
            v2,
            offset: 0.0,
            angle: math::Angle::default(),
            length: 64.0,
            sidedef: front_side,
            linedef: line,
            frontsector: front_sec,
            backsector: back_sec,
            polyobj: None,
        });
        level
    }

    fn run_seg(level: &Level) -> Vec<([OutVector; 4], PolyFlags)> {
        let pics = pics();
        let config = RenderConfig::default();
        let view = ViewPoint::new(
            glam::Vec3::ZERO,
            math::Angle::default(),
            math::Angle::default(),
            90.0,
        );
        let ctx = RenderContext {
            level,
            pics: &pics,
            config: &config,
            view: &view,
        };
        let mut renderer = HardwareRenderer::new();
        let mut backend = QuadBackend::default();
        let seg = level.segs[0].clone();
        renderer.process_seg(&ctx, &mut backend, &seg);
        backend.quads
    }

    #[test]
    fn single_sided_wall_quad() {
        let level = wall_level(128.0, None);
        let quads = run_seg(&level);
        assert_eq!(quads.len(), 1);

        let (q, flags) = &quads[0];
        assert!(flags.contains(PolyFlags::MASKED));
        // world heights: 0 at the floor, 128 at the ceiling
        assert_eq!(q[3].y, 128.0);
        assert_eq!(q[2].y, 128.0);
        assert_eq!(q[0].y, 0.0);
        assert_eq!(q[1].y, 0.0);
        // 128 units of wall over a 64-tall texture tiles twice
        assert_eq!(q[3].t, 0.0);
        assert_eq!(q[0].t, 2.0);
        // s spans the seg length in texture widths
        assert_eq!(q[0].s, 0.0);
        assert_eq!(q[1].s, 1.0);
    }

    #[test]
    fn two_sided_top_quad_spans_ceiling_step() {
        let level = wall_level(256.0, Some((0.0, 128.0)));
        let quads = run_seg(&level);
        assert_eq!(quads.len(), 1);

        let (q, _) = &quads[0];
        assert_eq!(q[3].y, 256.0);
        assert_eq!(q[0].y, 128.0);
    }

    #[test]
    fn equal_ceilings_emit_nothing() {
        // both sectors 0..128, no step, no textures apply
        let level = wall_level(128.0, Some((0.0, 128.0)));
        let quads = run_seg(&level);
        assert!(quads.is_empty());
    }

    #[test]
    fn light_bands_reconstruct_wall_interval() {
        let mut level = wall_level(128.0, None);
        level.sectors[0].lightlist = vec![
            LightBand {
                height: 128.0,
                slope: None,
                lightlevel: 200,
                colormap: None,
                flags: 0,
                caster_bottom: 0.0,
                caster_bottom_slope: None,
            },
            LightBand {
                height: 96.0,
                slope: None,
                lightlevel: 120,
                colormap: None,
                flags: 0,
                caster_bottom: 0.0,
                caster_bottom_slope: None,
            },
            LightBand {
                height: 32.0,
                slope: None,
                lightlevel: 60,
                colormap: None,
                flags: 0,
                caster_bottom: 0.0,
                caster_bottom_slope: None,
            },
        ];
        let quads = run_seg(&level);
        assert_eq!(quads.len(), 3);

        // bands tile the full [0,128] interval with no gaps or overlaps
        let mut tops: Vec<(f32, f32)> = quads.iter().map(|(q, _)| (q[3].y, q[0].y)).collect();
        tops.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        assert_eq!(tops[0], (128.0, 96.0));
        assert_eq!(tops[1], (96.0, 32.0));
        assert_eq!(tops[2], (32.0, 0.0));

        // texture t stays continuous across the cuts
        let t_at_96_above = quads[0].0[0].t;
        let t_at_96_below = quads[1].0[3].t;
        assert!((t_at_96_above - t_at_96_below).abs() < 1e-6);
    }
}
