//! Sprite projection and drawing. Things project into screen-facing quads
//! during the BSP walk, get depth-sorted once the walk is done, and draw
//! after all world geometry so translucency blends against the scene.

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec2;
use log::error;
use level::{
    frame_flags, render_flags, thing_flags2, Sector, Slope, SpriteRotation, Thing, ViewPoint,
};
use render_backend::{
    GraphicsBackend, OutVector, PolyFlags, ShaderTarget, SurfaceInfo, TextureSource,
};
use std::cmp::Ordering;
use std::f32::consts::FRAC_PI_2;

use crate::defs::{
    LinkDrawItem, VisSprite, MAX_VISSPRITES, VISSPRITES_PER_CHUNK, VISSPRITE_CHUNK_BITS,
};
use crate::light::{blend_mode_flag, surface_blend};
use crate::utilities::{clamp_light, point_view_bam, to_bam};
use crate::{HardwareRenderer, RenderContext};

/// Things nearer than this project behind the near plane and are dropped.
const ZCLIP_PLANE: f32 = 4.0;

const ANGLE_180: u32 = 0x8000_0000;
/// 202.5 degrees, the eight-slot rotation bias
const ANGLE_202H: u32 = 0x9000_0000;
/// 11.25 degrees, the sixteen-slot rotation bias
const ANGLE_11H: u32 = 0x0800_0000;

/// Chunked arena of projected sprites. Chunks allocate lazily as a frame
/// fills; once the cap is hit every further projection aliases one shared
/// overflow slot rather than growing without bound.
#[derive(Debug, Default)]
pub(crate) struct VisSpriteArena {
    chunks: Vec<Vec<VisSprite>>,
    count: usize,
    overflow: VisSprite,
}

impl VisSpriteArena {
    pub(crate) fn clear(&mut self) {
        self.count = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Next free slot, reset to defaults.
    pub(crate) fn alloc(&mut self) -> &mut VisSprite {
        if self.count >= MAX_VISSPRITES {
            self.overflow = VisSprite::default();
            return &mut self.overflow;
        }
        let chunk = self.count >> VISSPRITE_CHUNK_BITS;
        if chunk == self.chunks.len() {
            self.chunks
                .push(vec![VisSprite::default(); VISSPRITES_PER_CHUNK]);
        }
        let slot = &mut self.chunks[chunk][self.count & (VISSPRITES_PER_CHUNK - 1)];
        self.count += 1;
        *slot = VisSprite::default();
        slot
    }

    pub(crate) fn get(&self, i: usize) -> &VisSprite {
        &self.chunks[i >> VISSPRITE_CHUNK_BITS][i & (VISSPRITES_PER_CHUNK - 1)]
    }
}

/// Map a view-relative angle to a rotation patch slot.
pub(crate) fn rotation_slot(rotate: SpriteRotation, ang: u32) -> usize {
    match rotate {
        SpriteRotation::Single => 0,
        SpriteRotation::LockedRight if ang < ANGLE_180 => 6,
        SpriteRotation::LockedRight => 0,
        SpriteRotation::LockedLeft if ang >= ANGLE_180 => 2,
        SpriteRotation::LockedLeft => 0,
        SpriteRotation::Sixteen => {
            let rot = (ang.wrapping_add(ANGLE_180).wrapping_add(ANGLE_11H) >> 28) as usize;
            ((rot & 1) << 3) | (rot >> 1)
        }
        SpriteRotation::Eight => (ang.wrapping_add(ANGLE_202H) >> 29) as usize,
    }
}

/// Depth-sort comparator. Opaque sprites draw before transparent ones so
/// blending reads finished colour; within a class, farther first. Link-draw
/// sprites borrow their tracer's depth and transparency so the pair stays
/// adjacent, then dispoffset breaks exact depth ties.
pub(crate) fn compare_vissprites(things: &[Thing], sp1: &VisSprite, sp2: &VisSprite) -> Ordering {
    let thing1 = &things[sp1.thing];
    let thing2 = &things[sp2.thing];
    let l1 = thing1.is_linkdraw();
    let l2 = thing2.is_linkdraw();
    let same_chain = l1
        && l2
        && match (&thing1.tracer, &thing2.tracer) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };

    let (tz1, trans1) = if l1 && !same_chain {
        let tracer = thing1.tracer.as_ref().map(|t| t.as_ref());
        (
            sp1.tracer_tz,
            tracer.map(|t| t.is_blended()).unwrap_or(false),
        )
    } else {
        (sp1.tz, thing1.is_blended())
    };
    let (tz2, trans2) = if l2 && !same_chain {
        let tracer = thing2.tracer.as_ref().map(|t| t.as_ref());
        (
            sp2.tracer_tz,
            tracer.map(|t| t.is_blended()).unwrap_or(false),
        )
    } else {
        (sp2.tz, thing2.is_blended())
    };

    match trans1.cmp(&trans2) {
        Ordering::Equal => {}
        other => return other,
    }

    let fdiff = tz2 - tz1;
    if fdiff.abs() < 1.0e-36 {
        sp1.dispoffset.cmp(&sp2.dispoffset)
    } else if fdiff > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Height of whatever the thing's shadow lands on: the sector floor raised
/// by any 3D floor top below the thing.
pub(crate) fn shadow_z(ctx: &RenderContext, thing: &Thing) -> (f32, Option<Slope>) {
    let sector = ctx.level.subsectors[thing.subsector].sector.as_ref();
    let pos = Vec2::new(thing.pos.x, thing.pos.y);
    let mut groundz = sector.floor_z_at(pos);
    let mut slope = sector.floor_slope;

    for fof in &sector.fofs {
        if !fof.has(level::FofFlags::Exists) || !fof.has(level::FofFlags::RenderPlanes) {
            continue;
        }
        let top = fof.top_at(pos);
        if top <= thing.pos.z && top > groundz {
            groundz = top;
            slope = fof.top_slope().copied();
        }
    }
    (groundz, slope)
}

/// Sprite-in-special-sector culling against a cull-height line. Group
/// culling (a climb-blocked cull line) only applies when the viewer's own
/// sector belongs to the same group.
fn do_culling(
    ctx: &RenderContext,
    cull_line: usize,
    view_cull: Option<usize>,
    viewz: f32,
    bottomh: f32,
    toph: f32,
) -> bool {
    let line = &ctx.level.lines[cull_line];
    let cullplane = line.frontsector.floorheight;

    if line.flags & level::LineDefFlags::NoClimb as u32 != 0 {
        let Some(vc) = view_cull else {
            return false;
        };
        if ctx.level.lines[vc].frontsector.num != line.frontsector.num {
            return false;
        }
    }
    if viewz > cullplane && toph < cullplane {
        return true;
    }
    if bottomh > cullplane && viewz <= cullplane {
        return true;
    }
    false
}

/// Tilt the quad toward the camera pitch, pivoting about the feet (or head
/// when flipped). Precipitation only squashes vertically, never shifting in
/// the map plane.
fn rotate_sprite_to_aim(view: &ViewPoint, verts: &mut [OutVector; 4], basey: f32, precip: bool) {
    let (aimsin, aimcos) = view.aim_sin_cos();
    let (viewsin, viewcos) = view.sin_cos();
    let ludsin = aimcos;
    let ludcos = -aimsin;
    for v in verts.iter_mut() {
        let dy = v.y - basey;
        if !precip {
            v.x += ludcos * dy * viewcos;
            v.z += ludcos * dy * viewsin;
        }
        v.y = ludsin * dy + basey;
    }
}

impl HardwareRenderer {
    /// Project every thing standing in a sector. Called once per sector per
    /// viewpoint; the caller dedupes.
    pub(crate) fn add_sprites(&mut self, ctx: &RenderContext, sector: &Sector) {
        #[cfg(feature = "hprof")]
        profile!("add_sprites");

        for &ti in &sector.things {
            if ctx.level.things[ti].precip {
                self.project_precipitation(ctx, ti);
            } else {
                self.project_sprite(ctx, ti);
            }
        }
    }

    /// Project one thing into a vissprite. Rejections here are final: a
    /// thing dropped by projection never reaches sorting or drawing.
    fn project_sprite(&mut self, ctx: &RenderContext, ti: usize) {
        let thing = &ctx.level.things[ti];
        let view = ctx.view;

        if thing.scale <= 0.0 || thing.spritexscale <= 0.0 || thing.spriteyscale <= 0.0 {
            return;
        }
        // level 10+ of plain translucency is fully invisible
        if thing.trans_level() >= 10 && thing.blend_style() == level::BlendStyle::Translucent {
            return;
        }

        let (viewsin, viewcos) = view.sin_cos();
        let pos = Vec2::new(thing.pos.x, thing.pos.y);
        let tr = pos - view.xy();
        if ctx.config.draw_distance > 0.0 && tr.length() > ctx.config.draw_distance {
            return;
        }
        let tz = tr.x * viewcos + tr.y * viewsin;

        let papersprite = thing.is_paper_sprite();
        let splat = thing.is_floor_sprite();
        if !papersprite && !splat && tz < ZCLIP_PLANE {
            return;
        }

        // frame and rotation patch
        let frame_idx = thing.frame_index() as usize;
        let frame = ctx
            .pics
            .sprite_def(thing.sprite)
            .and_then(|d| d.frames.get(frame_idx));
        let (patch, mut flip, rotate) = match frame {
            Some(frame) => {
                let mut ang = point_view_bam(pos, view.xy()).wrapping_sub(to_bam(thing.angle));
                if thing.mirrored {
                    ang = 0u32.wrapping_sub(ang);
                }
                let rot = rotation_slot(frame.rotate, ang);
                let mut flip = frame.flipped(rot);
                if papersprite && ang < ANGLE_180 {
                    flip = !flip;
                }
                (frame.patches[rot], flip, frame.rotate)
            }
            None => {
                error!(
                    "thing {ti}: sprite {} has no frame {frame_idx}",
                    thing.sprite
                );
                (ctx.pics.unknown_sprite, false, SpriteRotation::Single)
            }
        };
        flip ^= thing.mirrored;

        let pinfo = ctx.pics.patch(patch);
        let flipoffset =
            if thing.has_render_flag(render_flags::FLIP_OFFSETS) && flip {
                -1.0
            } else {
                1.0
            };
        let (spr_offset, topoffset) = if thing.has_render_flag(render_flags::ABSOLUTE_OFFSETS) {
            (thing.spritexoffset * flipoffset, thing.spriteyoffset)
        } else {
            (
                pinfo.left_offset + thing.spritexoffset * flipoffset,
                pinfo.top_offset + thing.spriteyoffset,
            )
        };

        // ground-fade scaling
        let mut spritexscale = thing.spritexscale;
        let mut spriteyscale = thing.spriteyscale;
        let mut shadowheight = 1.0;
        if thing.has_render_flag(render_flags::SHADOW_EFFECTS) {
            let (groundz, _) = shadow_z(ctx, thing);
            let floordiff = (thing.pos.z - groundz).abs();
            shadowheight = floordiff;
            let fade = (1.0 - floordiff / 640.0).max(0.0);
            spriteyscale *= fade;
            if splat {
                spritexscale *= fade;
            }
        }
        let xscale = thing.scale * spritexscale;
        let yscale = thing.scale * spriteyscale;

        let (off1, off2) = if flip {
            (pinfo.width - spr_offset, spr_offset)
        } else {
            (spr_offset, pinfo.width - spr_offset)
        };
        let (rightsin, rightcos) = if papersprite {
            thing.angle.sin_cos()
        } else {
            (view.angle + FRAC_PI_2).sin_cos()
        };
        let x1 = pos.x + off1 * xscale * rightcos;
        let x2 = pos.x - off2 * xscale * rightcos;
        let z1 = pos.y + off1 * xscale * rightsin;
        let z2 = pos.y - off2 * xscale * rightsin;

        let vflip = thing.flags2 & thing_flags2::OBJECT_FLIP != 0;
        let (gz, gzt) = if vflip {
            let gz = thing.pos.z + thing.height - topoffset * yscale;
            (gz, gz + pinfo.height * yscale)
        } else {
            let gzt = thing.pos.z + topoffset * yscale;
            (gzt - pinfo.height * yscale, gzt)
        };

        let sector = ctx.level.subsectors[thing.subsector].sector.as_ref();
        if let Some(cull) = sector.cullheight {
            let view_cull = ctx.level.sectors[self.view_sector].cullheight;
            if do_culling(ctx, cull, view_cull, view.pos.z, gz, gzt) {
                return;
            }
        }

        // fake floor/ceiling water clipping needs the viewer in a heightsec
        // too
        if let (Some(hs), Some(phs)) = (
            sector.heightsec,
            ctx.level.sectors[self.view_sector].heightsec,
        ) {
            let hsec = &ctx.level.sectors[hs];
            let psec = &ctx.level.sectors[phs];
            let viewz = view.pos.z;
            if viewz < psec.floorheight {
                if thing.pos.z >= hsec.floorheight {
                    return;
                }
            } else if gzt < hsec.floorheight {
                return;
            }
            if viewz > psec.ceilingheight {
                if gzt < hsec.ceilingheight && viewz >= hsec.ceilingheight {
                    return;
                }
            } else if thing.pos.z >= hsec.ceilingheight {
                return;
            }
        }

        let mut dispoffset = thing.dispoffset;
        let mut tracer_tz = 0.0;
        if thing.is_linkdraw() {
            if let Some(tracer) = &thing.tracer {
                let tracer = tracer.as_ref();
                // an invisible tracer takes the whole chain with it
                if tracer.trans_level() >= 10
                    && tracer.blend_style() == level::BlendStyle::Translucent
                {
                    return;
                }
                let trr = Vec2::new(tracer.pos.x, tracer.pos.y) - view.xy();
                tracer_tz = trr.x * viewcos + trr.y * viewsin;
                if tracer_tz < ZCLIP_PLANE {
                    return;
                }
                if tz > tracer_tz {
                    dispoffset = -dispoffset;
                }
            }
        }

        let vis = self.state_mut().vissprites.alloc();
        *vis = VisSprite {
            x1,
            x2,
            z1,
            z2,
            gz,
            gzt,
            tz,
            tracer_tz,
            patch,
            colormap: thing.colormap,
            thing: ti,
            flip,
            vflip,
            precip: false,
            dispoffset,
            scale: thing.scale,
            spritexscale,
            spriteyscale,
            spritexoffset: spr_offset,
            spriteyoffset: topoffset,
            shadowheight,
            shadowscale: thing.shadowscale,
            renderflags: thing.renderflags,
            rotate,
        };
    }

    /// Weather particles: always slot zero, no flips, no tracers, and a
    /// hard near-plane reject.
    fn project_precipitation(&mut self, ctx: &RenderContext, ti: usize) {
        let thing = &ctx.level.things[ti];
        let view = ctx.view;

        let (viewsin, viewcos) = view.sin_cos();
        let pos = Vec2::new(thing.pos.x, thing.pos.y);
        let tr = pos - view.xy();
        if ctx.config.precip_draw_distance > 0.0 && tr.length() > ctx.config.precip_draw_distance {
            return;
        }
        let tz = tr.x * viewcos + tr.y * viewsin;
        if tz < ZCLIP_PLANE {
            return;
        }

        let frame_idx = thing.frame_index() as usize;
        let patch = match ctx
            .pics
            .sprite_def(thing.sprite)
            .and_then(|d| d.frames.get(frame_idx))
        {
            Some(frame) => frame.patches[0],
            None => {
                error!(
                    "precipitation {ti}: sprite {} has no frame {frame_idx}",
                    thing.sprite
                );
                ctx.pics.unknown_sprite
            }
        };

        let pinfo = ctx.pics.patch(patch);
        let (rightsin, rightcos) = (view.angle + FRAC_PI_2).sin_cos();
        let off1 = pinfo.left_offset;
        let off2 = pinfo.width - pinfo.left_offset;
        let x1 = pos.x + off1 * rightcos;
        let x2 = pos.x - off2 * rightcos;
        let z1 = pos.y + off1 * rightsin;
        let z2 = pos.y - off2 * rightsin;
        let gzt = thing.pos.z + pinfo.top_offset;
        let gz = gzt - pinfo.height;

        let vis = self.state_mut().vissprites.alloc();
        *vis = VisSprite {
            x1,
            x2,
            z1,
            z2,
            gz,
            gzt,
            tz,
            patch,
            thing: ti,
            precip: true,
            ..VisSprite::default()
        };
    }

    fn sort_vissprites(&self, ctx: &RenderContext) -> Vec<usize> {
        let sprites = &self.state().vissprites;
        let mut order: Vec<usize> = (0..sprites.len()).collect();
        order.sort_by(|&a, &b| {
            compare_vissprites(&ctx.level.things, sprites.get(a), sprites.get(b))
                .then(a.cmp(&b))
        });
        order
    }

    /// Draw this viewpoint's sprites in resolved order, drop shadows woven
    /// in, then replay link-draw quads into the depth buffer.
    pub(crate) fn draw_sprites<B: GraphicsBackend>(&mut self, ctx: &RenderContext, backend: &mut B) {
        #[cfg(feature = "hprof")]
        profile!("draw_sprites");

        let order = self.sort_vissprites(ctx);
        let mut skip_shadow = false;
        for i in order {
            let vis = self.state().vissprites.get(i).clone();
            if vis.precip {
                self.draw_precipitation_sprite(ctx, backend, &vis);
                continue;
            }

            let thing = &ctx.level.things[vis.thing];
            if ctx.config.shadows {
                if thing.shadowscale > 0.0 && !skip_shadow {
                    self.draw_drop_shadow(ctx, backend, thing, thing.shadowscale);
                }
                skip_shadow = false;
                // a linkdraw part under its tracer writes no depth, so the
                // tracer's shadow has to land first and only once
                if thing.is_linkdraw() && vis.dispoffset < 0 {
                    if let Some(tracer) = &thing.tracer {
                        if tracer.shadowscale > 0.0 {
                            self.draw_drop_shadow(
                                ctx,
                                backend,
                                tracer.as_ref(),
                                tracer.shadowscale,
                            );
                            skip_shadow = true;
                        }
                    }
                }
            }
            self.draw_sprite(ctx, backend, &vis);
        }

        self.link_draw_finish(backend);
        // leave blending in a state translucent surfaces expect
        backend.set_blend(PolyFlags::TRANSLUCENT | PolyFlags::OCCLUDE | PolyFlags::MASKED);
    }

    /// Blend flags, surface alpha and the link-draw marker for one sprite.
    /// `None` means the sprite faded out entirely.
    fn sprite_surf_blend<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        thing: &Thing,
        vis: &VisSprite,
        lightlevel: i32,
        colormap: Option<usize>,
    ) -> Option<(SurfaceInfo, PolyFlags, bool)> {
        let mut surf = self.lighting(ctx, backend, lightlevel, colormap);
        let occlusion = if thing.is_linkdraw() {
            PolyFlags::NONE
        } else {
            PolyFlags::OCCLUDE
        };
        let mut use_hack = false;

        let mut blend;
        if !ctx.config.translucency {
            surf.poly_color[3] = 0xff;
            blend = PolyFlags::TRANSLUCENT | occlusion;
            use_hack = occlusion.is_empty();
        } else if !thing.precip && thing.flags2 & thing_flags2::SHADOW != 0 {
            surf.poly_color[3] = 0x40;
            blend = blend_mode_flag(thing.blend_style());
        } else if thing.frame & frame_flags::TRANSMASK != 0 {
            blend = surface_blend(thing.blend_style(), thing.trans_level() as i32, &mut surf);
        } else {
            surf.poly_color[3] = 0xff;
            blend = blend_mode_flag(thing.blend_style()) | occlusion;
            use_hack = occlusion.is_empty();
        }

        if vis.renderflags & render_flags::SHADOW_EFFECTS != 0 {
            let alpha = surf.poly_color[3] as i32 - (vis.shadowheight / 4.0 + 75.0) as i32;
            if alpha < 1 {
                return None;
            }
            surf.poly_color[3] = alpha as u8;
            blend = PolyFlags::TRANSLUCENT | occlusion;
        }

        Some((surf, blend, use_hack))
    }

    fn sprite_shader(&self, ctx: &RenderContext) -> ShaderTarget {
        if ctx.config.shaders {
            ShaderTarget::Sprite
        } else {
            ShaderTarget::None
        }
    }

    /// Light level and colormap at the top of a thing, reading the sector's
    /// light bands when present. Brightness render flags override.
    fn sprite_light(&self, ctx: &RenderContext, thing: &Thing) -> (i32, Option<usize>) {
        let sector = ctx.level.subsectors[thing.subsector].sector.as_ref();
        let pos = Vec2::new(thing.pos.x, thing.pos.y);

        let (mut light, mut colormap) = if sector.has_lightlist() {
            let idx = sector.light_index_at(thing.pos.z + thing.height, pos, false);
            (
                clamp_light(sector.band_light(idx)),
                sector.lightlist[idx].colormap.or(sector.extra_colormap),
            )
        } else {
            (clamp_light(sector.lightlevel), sector.extra_colormap)
        };

        if thing.has_render_flag(render_flags::FULLBRIGHT) {
            light = 255;
        } else if thing.has_render_flag(render_flags::FULLDARK) {
            light = 0;
        } else if thing.has_render_flag(render_flags::SEMIBRIGHT) {
            light = 128 + (light >> 1);
        }
        if thing.has_render_flag(render_flags::NO_COLORMAPS) {
            colormap = None;
        }
        (light, colormap)
    }

    fn draw_sprite<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        vis: &VisSprite,
    ) {
        let thing = &ctx.level.things[vis.thing];

        if vis.renderflags & render_flags::FLOOR_SPRITE != 0 {
            self.draw_floor_splat(ctx, backend, vis);
            return;
        }

        let sector = ctx.level.subsectors[thing.subsector].sector.as_ref();
        if sector.has_lightlist() {
            self.split_sprite(ctx, backend, vis);
            return;
        }

        let mut verts = self.sprite_quad(ctx, vis);
        if ctx.config.billboarding && !thing.is_paper_sprite() {
            let basey = if vis.vflip {
                thing.pos.z + thing.height
            } else {
                thing.pos.z
            };
            rotate_sprite_to_aim(ctx.view, &mut verts, basey, false);
        }

        let (light, colormap) = self.sprite_light(ctx, thing);
        let Some((surf, blend, use_hack)) =
            self.sprite_surf_blend(ctx, backend, thing, vis, light, colormap)
        else {
            return;
        };

        let shader = self.sprite_shader(ctx);
        self.state_mut().batch.process_polygon(
            backend,
            &surf,
            &verts,
            blend | PolyFlags::MODULATED,
            shader,
            TextureSource::Patch {
                patch: vis.patch,
                colormap: vis.colormap,
            },
            false,
        );
        if use_hack {
            self.link_draw_add(&verts, vis);
        }
    }

    /// Base quad for a billboarded sprite: corners, near-plane nudge from
    /// dispoffset, and texture coordinates.
    fn sprite_quad(&self, ctx: &RenderContext, vis: &VisSprite) -> [OutVector; 4] {
        let mut verts = [
            OutVector::new(vis.x1, vis.gz, vis.z1, 0.0, 0.0),
            OutVector::new(vis.x2, vis.gz, vis.z2, 0.0, 0.0),
            OutVector::new(vis.x2, vis.gzt, vis.z2, 0.0, 0.0),
            OutVector::new(vis.x1, vis.gzt, vis.z1, 0.0, 0.0),
        ];

        if vis.dispoffset != 0 {
            // pull coincident sprites apart along the view axis
            let (viewsin, viewcos) = ctx.view.sin_cos();
            let co = -viewcos * (0.05 * vis.dispoffset as f32);
            let si = -viewsin * (0.05 * vis.dispoffset as f32);
            for v in verts.iter_mut() {
                v.x += co;
                v.z += si;
            }
        }

        let (s0, s1) = if vis.flip { (1.0, 0.0) } else { (0.0, 1.0) };
        let (t_top, t_bot) = if vis.vflip { (1.0, 0.0) } else { (0.0, 1.0) };
        verts[0].s = s0;
        verts[3].s = s0;
        verts[1].s = s1;
        verts[2].s = s1;
        verts[3].t = t_top;
        verts[2].t = t_top;
        verts[0].t = t_bot;
        verts[1].t = t_bot;
        verts
    }

    /// A sprite inside a banded sector: slice the quad at each light band
    /// boundary so every piece takes its band's light and colormap. The
    /// billboarded corner positions re-interpolate per slice.
    fn split_sprite<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        vis: &VisSprite,
    ) {
        let thing = &ctx.level.things[vis.thing];
        let sector = ctx.level.subsectors[thing.subsector].sector.as_ref();
        let pos = Vec2::new(thing.pos.x, thing.pos.y);

        let mut base = self.sprite_quad(ctx, vis);
        if ctx.config.billboarding && !thing.is_paper_sprite() {
            let basey = if vis.vflip {
                thing.pos.z + thing.height
            } else {
                thing.pos.z
            };
            rotate_sprite_to_aim(ctx.view, &mut base, basey, false);
        }

        // slicing happens in unrotated sprite heights, the billboarded
        // corners follow proportionally
        let realtop = vis.gzt;
        let realbot = vis.gz;
        let realheight = realtop - realbot;
        if realheight <= 0.0 {
            return;
        }
        let ttop = base[3].t;
        let tbot = base[0].t;
        let tmult = (tbot - ttop) / realheight;

        let start = sector.light_index_at(realtop, pos, false);
        let list = &sector.lightlist;
        let (mut light, mut colormap) = {
            let band = &list[start];
            (
                clamp_light(band.lightlevel),
                band.colormap.or(sector.extra_colormap),
            )
        };

        let fullbright = thing.has_render_flag(render_flags::FULLBRIGHT);
        let fulldark = thing.has_render_flag(render_flags::FULLDARK);
        let semibright = thing.has_render_flag(render_flags::SEMIBRIGHT);
        let adjust = |l: i32| {
            if fullbright {
                255
            } else if fulldark {
                0
            } else if semibright {
                128 + (l >> 1)
            } else {
                l
            }
        };
        let no_cmaps = thing.has_render_flag(render_flags::NO_COLORMAPS);

        let Some((surf0, blend, use_hack)) = self.sprite_surf_blend(
            ctx,
            backend,
            thing,
            vis,
            adjust(light),
            if no_cmaps { None } else { colormap },
        ) else {
            return;
        };
        let alpha = surf0.poly_color[3];
        let shader = self.sprite_shader(ctx);

        let corner = |h: f32, end: usize| -> OutVector {
            // end 0 is the first seg vertex column, 1 the second
            let hm = (realtop - h) / realheight;
            let (topv, botv) = if end == 0 {
                (base[3], base[0])
            } else {
                (base[2], base[1])
            };
            let mut v = topv;
            v.x += (botv.x - topv.x) * hm;
            v.y += (botv.y - topv.y) * hm;
            v.z += (botv.z - topv.z) * hm;
            v.s = topv.s;
            v.t = ttop + tmult * (realtop - h);
            v
        };

        let mut top = realtop;
        for i in start..list.len() {
            if i > start && !list[i].has(level::FofFlags::NoShade) {
                light = clamp_light(list[i].lightlevel);
                colormap = list[i].colormap.or(sector.extra_colormap);
            }
            let bot = if i + 1 < list.len() {
                list[i + 1].z_at(pos).max(realbot)
            } else {
                realbot
            };
            if bot >= top {
                continue;
            }

            let verts = [
                corner(bot, 0),
                corner(bot, 1),
                corner(top, 1),
                corner(top, 0),
            ];
            let mut surf = self.lighting(
                ctx,
                backend,
                adjust(light),
                if no_cmaps { None } else { colormap },
            );
            surf.poly_color[3] = alpha;
            self.state_mut().batch.process_polygon(
                backend,
                &surf,
                &verts,
                blend | PolyFlags::MODULATED,
                shader,
                TextureSource::Patch {
                    patch: vis.patch,
                    colormap: vis.colormap,
                },
                false,
            );
            if use_hack {
                self.link_draw_add(&verts, vis);
            }

            top = bot;
            if top <= realbot {
                break;
            }
        }
    }

    /// A sprite lying in the floor plane, rotated in the map rather than
    /// facing the camera.
    fn draw_floor_splat<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        vis: &VisSprite,
    ) {
        let thing = &ctx.level.things[vis.thing];
        let pinfo = ctx.pics.patch(vis.patch);
        let pos = Vec2::new(thing.pos.x, thing.pos.y);

        let xscale = vis.scale * vis.spritexscale;
        let yscale = vis.scale * vis.spriteyscale;
        let w = pinfo.width * xscale;
        let h = pinfo.height * yscale;
        let ox = vis.spritexoffset * xscale;
        let oy = vis.spriteyoffset * yscale;

        // splats keep their own angle when sixteen-slotted or told to;
        // otherwise they spin with the camera like a billboard in the floor
        let keep_own = vis.rotate == SpriteRotation::Sixteen
            || vis.renderflags & render_flags::NO_SPLAT_BILLBOARD != 0;
        let mut angle = if keep_own { thing.angle } else { ctx.view.angle };
        angle += thing.rollangle;
        let spin = math::Angle::new(FRAC_PI_2) - angle;
        let (sa, ca) = spin.sin_cos();

        let slope = if vis.renderflags & render_flags::SLOPE_SPLAT != 0 {
            thing.floorsprite_slope
        } else if vis.renderflags & render_flags::OBJECT_SLOPE_SPLAT != 0 {
            thing.standing_slope
        } else {
            None
        };
        let flat_z = thing.pos.z + if vis.vflip { -0.05 } else { 0.05 };

        let local = [
            Vec2::new(-ox, oy - h),
            Vec2::new(w - ox, oy - h),
            Vec2::new(w - ox, oy),
            Vec2::new(-ox, oy),
        ];
        let (s0, s1) = if vis.flip { (1.0, 0.0) } else { (0.0, 1.0) };
        let (t_near, t_far) = if vis.vflip { (0.0, 1.0) } else { (1.0, 0.0) };
        let st = [(s0, t_near), (s1, t_near), (s1, t_far), (s0, t_far)];

        let mut verts = [OutVector::default(); 4];
        for (i, p) in local.iter().enumerate() {
            let world = pos + Vec2::new(p.x * ca - p.y * sa, p.x * sa + p.y * ca);
            let y = match &slope {
                Some(sl) => sl.z_at(world),
                None => flat_z,
            };
            verts[i] = OutVector::new(world.x, y, world.y, st[i].0, st[i].1);
        }

        let (light, colormap) = self.sprite_light(ctx, thing);
        let Some((surf, blend, use_hack)) =
            self.sprite_surf_blend(ctx, backend, thing, vis, light, colormap)
        else {
            return;
        };
        let shader = self.sprite_shader(ctx);
        self.state_mut().batch.process_polygon(
            backend,
            &surf,
            &verts,
            blend | PolyFlags::MODULATED,
            shader,
            TextureSource::Patch {
                patch: vis.patch,
                colormap: vis.colormap,
            },
            false,
        );
        if use_hack {
            self.link_draw_add(&verts, vis);
        }
    }

    fn draw_precipitation_sprite<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        vis: &VisSprite,
    ) {
        let thing = &ctx.level.things[vis.thing];
        let mut verts = self.sprite_quad(ctx, vis);
        rotate_sprite_to_aim(ctx.view, &mut verts, vis.gz, true);

        let sector = ctx.level.subsectors[thing.subsector].sector.as_ref();
        let pos = Vec2::new(thing.pos.x, thing.pos.y);
        let (light, colormap) = if sector.has_lightlist() {
            let idx = sector.light_index_at(vis.gzt, pos, false);
            (
                clamp_light(sector.band_light(idx)),
                sector.lightlist[idx].colormap.or(sector.extra_colormap),
            )
        } else {
            (clamp_light(sector.lightlevel), sector.extra_colormap)
        };

        let mut surf = self.lighting(ctx, backend, light, colormap);
        let blend = if thing.frame & frame_flags::TRANSMASK != 0 {
            surface_blend(
                level::BlendStyle::Translucent,
                thing.trans_level() as i32,
                &mut surf,
            )
        } else {
            surf.poly_color[3] = 0xff;
            PolyFlags::TRANSLUCENT | PolyFlags::OCCLUDE
        };

        let shader = self.sprite_shader(ctx);
        self.state_mut().batch.process_polygon(
            backend,
            &surf,
            &verts,
            blend | PolyFlags::MODULATED,
            shader,
            TextureSource::Patch {
                patch: vis.patch,
                colormap: None,
            },
            false,
        );
    }

    /// Soft blob under a thing, scaled and faded by its height off the
    /// ground, conforming to whatever slope it lands on.
    pub(crate) fn draw_drop_shadow<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        thing: &Thing,
        scale: f32,
    ) {
        let (groundz, slope) = shadow_z(ctx, thing);
        let vflip = thing.flags2 & thing_flags2::OBJECT_FLIP != 0;
        let zref = thing.pos.z + if vflip { thing.height } else { 0.0 };
        let floordiff = (zref - groundz).abs();

        let alpha = floordiff / 4.0 + 75.0;
        if alpha >= 255.0 {
            return;
        }
        let alpha = (255.0 - alpha) as u8;

        let patch = ctx.pics.drop_shadow;
        let pinfo = ctx.pics.patch(patch);
        if pinfo.height <= 0.0 {
            return;
        }
        let scalemul = (1.0 - floordiff / 640.0).max(0.0) * scale * (thing.radius * 2.0)
            / pinfo.height;
        let hw = pinfo.width * 0.5 * scalemul;
        let hh = pinfo.height * 0.5 * scalemul;

        let (viewsin, viewcos) = ctx.view.sin_cos();
        let pos = Vec2::new(thing.pos.x, thing.pos.y);
        let local = [
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ];
        let st = [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)];

        let lift = if vflip { -0.05 } else { 0.05 };
        let mut verts = [OutVector::default(); 4];
        for (i, p) in local.iter().enumerate() {
            let world = pos
                + Vec2::new(
                    p.x * viewcos - p.y * viewsin,
                    p.x * viewsin + p.y * viewcos,
                );
            let y = match &slope {
                Some(sl) => sl.z_at(world),
                None => groundz,
            } + lift;
            verts[i] = OutVector::new(world.x, y, world.y, st[i].0, st[i].1);
        }

        let sector = ctx.level.subsectors[thing.subsector].sector.as_ref();
        let colormap = if sector.has_lightlist() {
            let idx = sector.light_index_at(groundz, pos, false);
            sector.lightlist[idx].colormap.or(sector.extra_colormap)
        } else {
            sector.extra_colormap
        };

        let mut surf = self.lighting(ctx, backend, 0, colormap);
        surf.poly_color[3] = alpha;
        let shader = self.sprite_shader(ctx);
        self.state_mut().batch.process_polygon(
            backend,
            &surf,
            &verts,
            PolyFlags::TRANSLUCENT | PolyFlags::MODULATED,
            shader,
            TextureSource::Patch {
                patch,
                colormap: None,
            },
            false,
        );
    }

    fn link_draw_add(&mut self, verts: &[OutVector; 4], vis: &VisSprite) {
        self.state_mut().linkdraw.push(LinkDrawItem {
            verts: *verts,
            patch: vis.patch,
            colormap: vis.colormap,
        });
    }

    /// Replay link-draw quads into the depth buffer only, so translucent
    /// surfaces drawn later can't cut through the already-drawn sprites.
    fn link_draw_finish<B: GraphicsBackend>(&mut self, backend: &mut B) {
        let items = std::mem::take(&mut self.state_mut().linkdraw);
        if items.is_empty() {
            return;
        }
        let surf = SurfaceInfo::default();
        for item in items {
            backend.set_texture(TextureSource::Patch {
                patch: item.patch,
                colormap: item.colormap,
            });
            backend.draw_polygon(
                &surf,
                &item.verts,
                PolyFlags::TRANSLUCENT | PolyFlags::OCCLUDE | PolyFlags::INVISIBLE,
                ShaderTarget::None,
                false,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use level::MapPtr;

    #[test]
    fn eight_slot_rotation() {
        // facing the viewer head-on lands in the front slot
        assert_eq!(rotation_slot(SpriteRotation::Eight, 0), 4);
        // seen from behind
        assert_eq!(rotation_slot(SpriteRotation::Eight, ANGLE_180), 0);
        // quarter views land on the side slots
        assert_eq!(rotation_slot(SpriteRotation::Eight, 0x4000_0000), 6);
        assert_eq!(rotation_slot(SpriteRotation::Eight, 0xC000_0000), 2);
    }

    #[test]
    fn sixteen_slot_interleave() {
        assert_eq!(rotation_slot(SpriteRotation::Sixteen, 0), 4);
        // stepping 22.5 degrees alternates between base and interleaved
        // slots
        let step = 0x1000_0000u32;
        let a = rotation_slot(SpriteRotation::Sixteen, step);
        let b = rotation_slot(SpriteRotation::Sixteen, step * 2);
        assert_ne!(a, 4);
        assert_ne!(a, b);
    }

    #[test]
    fn locked_slots_pick_side() {
        assert_eq!(rotation_slot(SpriteRotation::LockedRight, 0x1000_0000), 6);
        assert_eq!(rotation_slot(SpriteRotation::LockedRight, 0x9000_0000), 0);
        assert_eq!(rotation_slot(SpriteRotation::LockedLeft, 0x9000_0000), 2);
        assert_eq!(rotation_slot(SpriteRotation::LockedLeft, 0x1000_0000), 0);
    }

    #[test]
    fn arena_chunks_and_overflow() {
        let mut arena = VisSpriteArena::default();
        for i in 0..MAX_VISSPRITES {
            let v = arena.alloc();
            v.thing = i;
        }
        assert_eq!(arena.len(), MAX_VISSPRITES);
        // cap reached: further allocations alias the overflow slot and the
        // count stops
        arena.alloc().thing = 9999;
        assert_eq!(arena.len(), MAX_VISSPRITES);
        assert_eq!(arena.get(0).thing, 0);
        assert_eq!(arena.get(MAX_VISSPRITES - 1).thing, MAX_VISSPRITES - 1);

        arena.clear();
        assert_eq!(arena.len(), 0);
    }

    fn vis(thing: usize, tz: f32, dispoffset: i32) -> VisSprite {
        VisSprite {
            thing,
            tz,
            dispoffset,
            ..VisSprite::default()
        }
    }

    #[test]
    fn farther_sprites_sort_first() {
        let things = vec![
            Thing::new(Vec3::ZERO, 0, 0, 0),
            Thing::new(Vec3::ZERO, 0, 0, 0),
        ];
        let near = vis(0, 10.0, 0);
        let far = vis(1, 200.0, 0);
        assert_eq!(compare_vissprites(&things, &far, &near), Ordering::Less);
        assert_eq!(compare_vissprites(&things, &near, &far), Ordering::Greater);
    }

    #[test]
    fn opaque_sorts_before_translucent_regardless_of_depth() {
        let mut things = vec![
            Thing::new(Vec3::ZERO, 0, 0, 0),
            Thing::new(Vec3::ZERO, 0, 0, 0),
        ];
        things[1].frame |= 3 << frame_flags::TRANS_SHIFT;
        // translucent sprite is much farther but still sorts after
        let opaque = vis(0, 10.0, 0);
        let translucent = vis(1, 500.0, 0);
        assert_eq!(
            compare_vissprites(&things, &opaque, &translucent),
            Ordering::Less
        );
    }

    #[test]
    fn dispoffset_breaks_exact_depth_ties() {
        let things = vec![
            Thing::new(Vec3::ZERO, 0, 0, 0),
            Thing::new(Vec3::ZERO, 0, 0, 0),
        ];
        let under = vis(0, 64.0, 0);
        let over = vis(1, 64.0, 1);
        assert_eq!(compare_vissprites(&things, &under, &over), Ordering::Less);
    }

    #[test]
    fn linkdraw_borrows_tracer_depth() {
        let mut things = vec![
            Thing::new(Vec3::ZERO, 0, 0, 0), // tracer
            Thing::new(Vec3::ZERO, 0, 0, 0), // linked part
            Thing::new(Vec3::ZERO, 0, 0, 0), // bystander
        ];
        let tracer_ptr = unsafe { MapPtr::new(&mut things[0]) };
        things[1].flags2 |= thing_flags2::LINKDRAW;
        things[1].tracer = Some(tracer_ptr);

        // the linked part is physically nearest but its tracer sits behind
        // the bystander, so the part sorts behind too
        let link = vis(1, 5.0, 0);
        let link = VisSprite {
            tracer_tz: 300.0,
            ..link
        };
        let bystander = vis(2, 100.0, 0);
        assert_eq!(
            compare_vissprites(&things, &link, &bystander),
            Ordering::Less
        );
    }

    #[test]
    fn billboard_tilts_about_base() {
        let view = ViewPoint::new(
            Vec3::ZERO,
            math::Angle::default(),
            math::Angle::new(std::f32::consts::FRAC_PI_4),
            90.0,
        );
        let mut verts = [
            OutVector::new(0.0, 0.0, 10.0, 0.0, 1.0),
            OutVector::new(1.0, 0.0, 10.0, 1.0, 1.0),
            OutVector::new(1.0, 16.0, 10.0, 1.0, 0.0),
            OutVector::new(0.0, 16.0, 10.0, 0.0, 0.0),
        ];
        rotate_sprite_to_aim(&view, &mut verts, 0.0, false);
        // the base edge stays put
        assert_eq!(verts[0].y, 0.0);
        assert_eq!(verts[0].x, 0.0);
        // the top edge leans toward the camera pitch and shortens
        assert!(verts[3].y < 16.0);
        assert!(verts[3].x < 0.0);

        // precipitation only squashes
        let mut pverts = [
            OutVector::new(0.0, 0.0, 10.0, 0.0, 1.0),
            OutVector::new(1.0, 0.0, 10.0, 1.0, 1.0),
            OutVector::new(1.0, 16.0, 10.0, 1.0, 0.0),
            OutVector::new(0.0, 16.0, 10.0, 0.0, 0.0),
        ];
        rotate_sprite_to_aim(&view, &mut pverts, 0.0, true);
        assert_eq!(pverts[3].x, 0.0);
        assert!(pverts[3].y < 16.0);
    }
}
