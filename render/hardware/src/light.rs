//! Surface colour, translucency and fake-contrast computation. Everything
//! in here is a pure function of its inputs apart from the light-table
//! memo, which lazily creates one backend resource per distinct colormap.

use crate::utilities::clamp_light;
use crate::{FakeContrast, HardwareRenderer, RenderContext};
use glam::Vec2;
use level::{BlendStyle, ExtraColormap};
use math::Angle;
use render_backend::{GraphicsBackend, PolyFlags, SurfaceInfo};
use std::f32::consts::PI;

/// Tint colour used when a sector has no colormap.
const DEFAULT_MIX: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
/// Fade target when a sector has no colormap: opaque black.
const DEFAULT_FOG: [u8; 4] = [0x00, 0x00, 0x00, 0xff];

/// The ten discrete translucency levels, opaque to barely-there.
const TRANSTABLE: [u8; 10] = [
    0xff, 0xe6, 0xcc, 0xb3, 0x99, 0x80, 0x66, 0x4c, 0x33, 0x19,
];

/// Map a translucency table index to byte alpha. Out-of-range indices clamp
/// rather than error.
#[inline]
pub fn alpha_from_translucency_table(index: i32) -> u8 {
    TRANSTABLE[index.clamp(0, 9) as usize]
}

/// Blend-equation flag for a style. Total over the closed style set; the
/// default style is an opaque masked draw.
pub fn blend_mode_flag(style: BlendStyle) -> PolyFlags {
    match style {
        BlendStyle::Translucent => PolyFlags::TRANSLUCENT,
        BlendStyle::Add => PolyFlags::ADDITIVE,
        BlendStyle::Subtract => PolyFlags::SUBTRACTIVE,
        BlendStyle::ReverseSubtract => PolyFlags::REVERSE_SUBTRACT,
        BlendStyle::Modulate => PolyFlags::MULTIPLICATIVE,
        BlendStyle::Opaque => PolyFlags::MASKED,
    }
}

/// Combined blend flag + surface alpha for a translucency level. Level 0 or
/// an opaque style short-circuits to a solid masked surface.
pub fn surface_blend(style: BlendStyle, trans_level: i32, surf: &mut SurfaceInfo) -> PolyFlags {
    if trans_level == 0 || style == BlendStyle::Opaque {
        surf.poly_color[3] = 0xff;
        return PolyFlags::MASKED;
    }
    surf.poly_color[3] = alpha_from_translucency_table(trans_level);
    blend_mode_flag(style)
}

/// Fill a surface from a light level and optional sector colormap. With
/// shaders the tint/fade mix happens on the GPU; without, the poly colour
/// gets a rough CPU approximation of the same mix.
pub fn mix_lighting(
    light_level: i32,
    colormap: Option<&ExtraColormap>,
    use_shaders: bool,
) -> SurfaceInfo {
    let mut poly = [0xffu8; 4];
    let tint = colormap.map(|c| c.rgba).unwrap_or(DEFAULT_MIX);
    let fade = colormap.map(|c| c.fade_rgba).unwrap_or(DEFAULT_FOG);

    if !use_shaders {
        // Crappy backup colouring when shaders are unavailable. The
        // constants trade accuracy for looking passable everywhere.
        let tint_alpha = ((tint[3] as f32).sqrt() * 48.0 / 255.0).clamp(0.0, 1.0);
        let fade_alpha = (((255 - clamp_light(light_level)) as f32).sqrt() * 12.0 / 255.0)
            .clamp(0.0, 1.0);

        for i in 0..3 {
            let mut c = poly[i] as f32;
            c = tint[i] as f32 * tint_alpha + c * (1.0 - tint_alpha);
            c = fade[i] as f32 * fade_alpha + c * (1.0 - fade_alpha);
            poly[i] = c as u8;
        }
    }

    SurfaceInfo {
        poly_color: poly,
        tint_color: tint,
        fade_color: fade,
        // Animations can push the level out of byte range
        light_level: clamp_light(light_level),
        fade_start: colormap.map(|c| c.fade_start).unwrap_or(0),
        fade_end: colormap.map(|c| c.fade_end).unwrap_or(31),
        light_table: None,
    }
}

/// Alpha for a fog-block surface. With shaders it is a plain inverse of the
/// light level; otherwise the colormap density folds in.
pub fn fog_block_alpha(light: i32, colormap: Option<&ExtraColormap>, use_shaders: bool) -> u8 {
    let real = colormap.map(|c| c.rgba).unwrap_or(DEFAULT_MIX);

    if use_shaders {
        return (255 - clamp_light(light)) as u8;
    }

    let light = clamp_light(light - (255 - light));
    let alpha = (real[3] as i32 * 255) / 25;
    // at 255 brightness alpha sits below 128, at 0 brightness it is 255
    ((alpha * light) / (2 * 256) + 255 - light) as u8
}

const CONTRAST: i32 = 8;

/// Fake contrast for a wall by its map direction. Axis-aligned walls get a
/// fixed +/- bump; smooth mode grades by angle instead.
pub fn calc_wall_light(light: i32, v1: Vec2, v2: Vec2, mode: FakeContrast) -> i32 {
    let extralight = match mode {
        FakeContrast::Off => 0,
        FakeContrast::Standard => {
            if v1.y == v2.y {
                -CONTRAST
            } else if v1.x == v2.x {
                CONTRAST
            } else {
                0
            }
        }
        FakeContrast::Smooth => {
            let deg = (v1.y - v2.y).abs().atan2((v1.x - v2.x).abs()).to_degrees();
            (-CONTRAST as f32 + deg / 90.0 * (CONTRAST * 2) as f32) as i32
        }
    };

    if extralight != 0 {
        clamp_light(light + extralight)
    } else {
        light
    }
}

/// Fake contrast for a sloped plane from its facing direction and rise.
/// Steep slopes double up in standard mode; smooth mode scales linearly.
pub fn calc_slope_light(light: i32, dir: Angle, zdelta: f32, mode: FakeContrast) -> i32 {
    let extralight = match mode {
        FakeContrast::Off => 0,
        FakeContrast::Standard => {
            let quarter = ((dir.rad() + PI / 4.0) / (PI / 2.0)).floor() * (PI / 2.0);
            let mut e = if (quarter - PI).abs() < 0.001 {
                -CONTRAST
            } else if quarter.abs() < 0.001 || (quarter - 2.0 * PI).abs() < 0.001 {
                CONTRAST
            } else {
                0
            };
            if zdelta.abs() >= 0.5 {
                e *= 2;
            }
            e
        }
        FakeContrast::Smooth => {
            let dirmul = ((dir.rad().to_degrees() - 180.0) / 180.0).abs();
            let e = -CONTRAST as f32 + dirmul * (CONTRAST * 2) as f32;
            (e * zdelta.abs() * 4.0) as i32
        }
    };

    if extralight != 0 {
        clamp_light(light + extralight)
    } else {
        light
    }
}

impl HardwareRenderer {
    /// Surface lighting with the palette-rendering light-table memo. The
    /// table is created once per distinct colormap and reused.
    pub(crate) fn lighting<B: GraphicsBackend>(
        &mut self,
        ctx: &RenderContext,
        backend: &mut B,
        light_level: i32,
        colormap: Option<usize>,
    ) -> SurfaceInfo {
        let cmap = ctx.level.colormap(colormap);
        let mut surf = mix_lighting(light_level, cmap, ctx.config.shaders);

        if ctx.config.palette_rendering {
            let key = colormap.unwrap_or(usize::MAX);
            let table = match self.light_tables.get(&key) {
                Some(t) => *t,
                None => {
                    let default = ExtraColormap::default();
                    let t = backend.create_light_table(cmap.unwrap_or(&default));
                    self.light_tables.insert(key, t);
                    t
                }
            };
            surf.light_table = Some(table);
        }

        surf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transtable_clamps() {
        assert_eq!(alpha_from_translucency_table(0), 0xff);
        assert_eq!(alpha_from_translucency_table(9), 0x19);
        assert_eq!(alpha_from_translucency_table(-3), 0xff);
        assert_eq!(alpha_from_translucency_table(40), 0x19);
        // monotonic
        for w in TRANSTABLE.windows(2) {
            assert!(w[0] > w[1]);
        }
    }

    #[test]
    fn blend_flags_total() {
        assert_eq!(
            blend_mode_flag(BlendStyle::Translucent),
            PolyFlags::TRANSLUCENT
        );
        assert_eq!(blend_mode_flag(BlendStyle::Add), PolyFlags::ADDITIVE);
        assert_eq!(blend_mode_flag(BlendStyle::Opaque), PolyFlags::MASKED);
    }

    #[test]
    fn surface_blend_opaque_shortcut() {
        let mut surf = SurfaceInfo::default();
        assert_eq!(
            surface_blend(BlendStyle::Translucent, 0, &mut surf),
            PolyFlags::MASKED
        );
        assert_eq!(surf.poly_color[3], 0xff);

        let flags = surface_blend(BlendStyle::Add, 5, &mut surf);
        assert_eq!(flags, PolyFlags::ADDITIVE);
        assert_eq!(surf.poly_color[3], 0x80);
    }

    #[test]
    fn lighting_clamps_level() {
        let s = mix_lighting(400, None, true);
        assert_eq!(s.light_level, 255);
        let s = mix_lighting(-20, None, true);
        assert_eq!(s.light_level, 0);
        // shader path leaves poly colour untouched
        assert_eq!(s.poly_color, [0xff; 4]);
    }

    #[test]
    fn wall_contrast_axes() {
        let l = 128;
        let ew = calc_wall_light(l, Vec2::new(0.0, 0.0), Vec2::new(64.0, 0.0), FakeContrast::Standard);
        let ns = calc_wall_light(l, Vec2::new(0.0, 0.0), Vec2::new(0.0, 64.0), FakeContrast::Standard);
        assert_eq!(ew, 120);
        assert_eq!(ns, 136);
        let diag = calc_wall_light(
            l,
            Vec2::new(0.0, 0.0),
            Vec2::new(64.0, 64.0),
            FakeContrast::Standard,
        );
        assert_eq!(diag, 128);
        assert_eq!(
            calc_wall_light(0, Vec2::ZERO, Vec2::new(64.0, 0.0), FakeContrast::Standard),
            0
        );
    }

    #[test]
    fn slope_contrast_steepness_doubles() {
        let shallow = calc_slope_light(128, Angle::new(PI), 0.25, FakeContrast::Standard);
        let steep = calc_slope_light(128, Angle::new(PI), 0.75, FakeContrast::Standard);
        assert_eq!(shallow, 120);
        assert_eq!(steep, 112);
    }

    #[test]
    fn fog_alpha_shader_path() {
        assert_eq!(fog_block_alpha(255, None, true), 0);
        assert_eq!(fog_block_alpha(0, None, true), 255);
    }
}
