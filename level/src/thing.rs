use crate::slope::Slope;
use crate::MapPtr;
use glam::Vec3;
use math::Angle;

/// Bit layout of `Thing::frame`.
pub mod frame_flags {
    /// Animation frame index
    pub const FRAMEMASK: u32 = 0xff;
    pub const TRANS_SHIFT: u32 = 16;
    /// Translucency table index 1..=9, 0 for opaque
    pub const TRANSMASK: u32 = 0xf << TRANS_SHIFT;
    pub const BLEND_SHIFT: u32 = 20;
    /// Blend style override; 0 means use the thing's own mode
    pub const BLENDMASK: u32 = 0x7 << BLEND_SHIFT;
}

/// `Thing::renderflags` bits.
pub mod render_flags {
    /// Billboard along the object's own angle, not the view
    pub const PAPER_SPRITE: u32 = 1;
    /// Lie flat in the floor plane
    pub const FLOOR_SPRITE: u32 = 1 << 1;
    pub const FULLBRIGHT: u32 = 1 << 2;
    pub const FULLDARK: u32 = 1 << 3;
    pub const SEMIBRIGHT: u32 = 1 << 4;
    /// Ignore sector colormaps entirely
    pub const NO_COLORMAPS: u32 = 1 << 5;
    /// Fade alpha and scale with height above the ground
    pub const SHADOW_EFFECTS: u32 = 1 << 6;
    /// Splat conforms to its defined slope
    pub const SLOPE_SPLAT: u32 = 1 << 7;
    /// Splat conforms to the slope the object stands on
    pub const OBJECT_SLOPE_SPLAT: u32 = 1 << 8;
    /// Splat keeps the object angle even when billboarding is on
    pub const NO_SPLAT_BILLBOARD: u32 = 1 << 9;
    /// Sprite offsets replace the patch offsets instead of adding
    pub const ABSOLUTE_OFFSETS: u32 = 1 << 10;
    /// Sprite x offset mirrors with a flipped patch
    pub const FLIP_OFFSETS: u32 = 1 << 11;
}

/// `Thing::flags2` bits.
pub mod thing_flags2 {
    /// Depth-sort against the tracer object, draw without depth write
    pub const LINKDRAW: u32 = 1;
    /// Fixed 25% alpha "fuzzy" rendering
    pub const SHADOW: u32 = 1 << 1;
    /// Hangs from the ceiling; sprite is vertically flipped
    pub const OBJECT_FLIP: u32 = 1 << 2;
}

/// How a surface or sprite mixes with what is behind it. Closed set; lines
/// and things carry one of these as a small integer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BlendStyle {
    #[default]
    Translucent,
    Add,
    Subtract,
    ReverseSubtract,
    Modulate,
    /// Fully opaque copy
    Opaque,
}

impl From<i32> for BlendStyle {
    fn from(raw: i32) -> Self {
        match raw {
            2 => BlendStyle::Add,
            3 => BlendStyle::Subtract,
            4 => BlendStyle::ReverseSubtract,
            5 => BlendStyle::Modulate,
            6 => BlendStyle::Opaque,
            _ => BlendStyle::Translucent,
        }
    }
}

/// A renderable map object snapshot. Gameplay mutates these between frames;
/// the renderer only reads.
#[derive(Debug)]
pub struct Thing {
    pub pos: Vec3,
    pub angle: Angle,
    pub rollangle: Angle,
    pub sprite: usize,
    pub frame: u32,
    pub scale: f32,
    pub spritexscale: f32,
    pub spriteyscale: f32,
    pub spritexoffset: f32,
    pub spriteyoffset: f32,
    pub radius: f32,
    pub height: f32,
    pub renderflags: u32,
    pub flags2: u32,
    pub blendmode: i32,
    /// Draw-order bias for coincident sprites
    pub dispoffset: i32,
    pub tracer: Option<MapPtr<Thing>>,
    pub mirrored: bool,
    /// Shadow quad scale factor; 0.0 disables the drop shadow
    pub shadowscale: f32,
    pub standing_slope: Option<Slope>,
    pub floorsprite_slope: Option<Slope>,
    /// Index into `Level::subsectors`
    pub subsector: usize,
    /// Translation colormap id, e.g. team colours
    pub colormap: Option<usize>,
    /// Precipitation particle: simplified projection, no flips or tracers
    pub precip: bool,
}

impl Thing {
    pub fn new(pos: Vec3, sprite: usize, frame: u32, subsector: usize) -> Self {
        Thing {
            pos,
            angle: Angle::default(),
            rollangle: Angle::default(),
            sprite,
            frame,
            scale: 1.0,
            spritexscale: 1.0,
            spriteyscale: 1.0,
            spritexoffset: 0.0,
            spriteyoffset: 0.0,
            radius: 16.0,
            height: 32.0,
            renderflags: 0,
            flags2: 0,
            blendmode: 0,
            dispoffset: 0,
            tracer: None,
            mirrored: false,
            shadowscale: 0.0,
            standing_slope: None,
            floorsprite_slope: None,
            subsector,
            colormap: None,
            precip: false,
        }
    }

    #[inline]
    pub fn frame_index(&self) -> u32 {
        self.frame & frame_flags::FRAMEMASK
    }

    /// Translucency table index from the frame field, 0 when opaque
    #[inline]
    pub fn trans_level(&self) -> u32 {
        (self.frame & frame_flags::TRANSMASK) >> frame_flags::TRANS_SHIFT
    }

    /// Effective blend style: frame override beats the thing's own mode
    pub fn blend_style(&self) -> BlendStyle {
        let in_frame = (self.frame & frame_flags::BLENDMASK) >> frame_flags::BLEND_SHIFT;
        if in_frame != 0 {
            BlendStyle::from(in_frame as i32 + 1)
        } else {
            BlendStyle::from(self.blendmode)
        }
    }

    #[inline]
    pub fn has_render_flag(&self, flag: u32) -> bool {
        self.renderflags & flag != 0
    }

    #[inline]
    pub fn is_linkdraw(&self) -> bool {
        !self.precip && self.flags2 & thing_flags2::LINKDRAW != 0 && self.tracer.is_some()
    }

    #[inline]
    pub fn is_paper_sprite(&self) -> bool {
        self.has_render_flag(render_flags::PAPER_SPRITE)
            && !self.has_render_flag(render_flags::FLOOR_SPRITE)
    }

    #[inline]
    pub fn is_floor_sprite(&self) -> bool {
        self.has_render_flag(render_flags::FLOOR_SPRITE)
    }

    /// Blended in any way: a fuzzy shadow or a frame translucency level
    pub fn is_blended(&self) -> bool {
        (!self.precip && self.flags2 & thing_flags2::SHADOW != 0)
            || self.frame & frame_flags::TRANSMASK != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_field_unpacking() {
        let t = Thing::new(
            Vec3::ZERO,
            0,
            7 | (3 << frame_flags::TRANS_SHIFT) | (1 << frame_flags::BLEND_SHIFT),
            0,
        );
        assert_eq!(t.frame_index(), 7);
        assert_eq!(t.trans_level(), 3);
        // frame blend field of 1 encodes the style after Translucent
        assert_eq!(t.blend_style(), BlendStyle::Add);
        assert!(t.is_blended());
    }

    #[test]
    fn blend_style_fallback() {
        let mut t = Thing::new(Vec3::ZERO, 0, 0, 0);
        t.blendmode = 3;
        assert_eq!(t.blend_style(), BlendStyle::Subtract);
        assert!(!t.is_blended());
    }
}
