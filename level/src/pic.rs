//! Texture, flat, patch and colormap metadata the renderer needs for
//! coordinate generation. Pixel payloads live with the backend; only the
//! dimensions and offsets matter here.

use crate::sprite::SpriteDef;
use log::warn;

/// A wall texture: id plus dimensions.
#[derive(Debug, Clone, Copy)]
pub struct TextureInfo {
    pub width: f32,
    pub height: f32,
    /// Texture has holes, so walls using it go through the sorted path
    pub transparent: bool,
}

impl TextureInfo {
    /// World units to texture-s multiplier
    #[inline]
    pub fn scale_x(&self) -> f32 {
        1.0 / self.width
    }

    #[inline]
    pub fn scale_y(&self) -> f32 {
        1.0 / self.height
    }
}

/// A floor/ceiling flat. Tiling snap comes from the size: power-of-two flats
/// snap to their own dimension, anything else tiles at its real size.
#[derive(Debug, Clone, Copy)]
pub struct FlatInfo {
    pub width: f32,
    pub height: f32,
    /// Flat is water-style rippled
    pub ripple: bool,
}

/// A sprite patch: dimensions and drawing offsets in map units.
#[derive(Debug, Clone, Copy)]
pub struct PatchInfo {
    pub width: f32,
    pub height: f32,
    pub left_offset: f32,
    pub top_offset: f32,
}

/// A sector colour modifier. `rgba` tints, `fade_rgba` is the fog/darkness
/// target colour.
#[derive(Debug, Clone, Copy)]
pub struct ExtraColormap {
    pub rgba: [u8; 4],
    pub fade_rgba: [u8; 4],
    pub fade_start: u8,
    pub fade_end: u8,
    pub fog: bool,
}

impl Default for ExtraColormap {
    fn default() -> Self {
        ExtraColormap {
            rgba: [0x00, 0x00, 0x00, 0x00],
            fade_rgba: [0x00, 0x00, 0x00, 0xff],
            fade_start: 0,
            fade_end: 31,
            fog: false,
        }
    }
}

/// Lookup tables for everything picture-shaped.
#[derive(Debug, Default)]
pub struct PicData {
    pub textures: Vec<TextureInfo>,
    pub flats: Vec<FlatInfo>,
    pub patches: Vec<PatchInfo>,
    pub sprites: Vec<SpriteDef>,
    /// Texture id the sky dome is built from
    pub sky_texture: usize,
    /// Substituted when a thing asks for a frame that does not exist
    pub unknown_sprite: usize,
    /// Patch the soft drop-shadow blob is drawn with
    pub drop_shadow: usize,
}

impl PicData {
    /// Texture dimensions, with a safe 1x1 fallback for bad ids so polygon
    /// maths never divides by zero.
    pub fn texture(&self, id: usize) -> TextureInfo {
        match self.textures.get(id) {
            Some(t) => *t,
            None => {
                warn!("texture id {id} out of range");
                TextureInfo {
                    width: 1.0,
                    height: 1.0,
                    transparent: false,
                }
            }
        }
    }

    pub fn flat(&self, id: usize) -> FlatInfo {
        match self.flats.get(id) {
            Some(f) => *f,
            None => {
                warn!("flat id {id} out of range");
                FlatInfo {
                    width: 64.0,
                    height: 64.0,
                    ripple: false,
                }
            }
        }
    }

    pub fn patch(&self, id: usize) -> PatchInfo {
        match self.patches.get(id) {
            Some(p) => *p,
            None => {
                warn!("patch id {id} out of range");
                PatchInfo {
                    width: 1.0,
                    height: 1.0,
                    left_offset: 0.0,
                    top_offset: 0.0,
                }
            }
        }
    }

    pub fn sprite_def(&self, sprite: usize) -> Option<&SpriteDef> {
        self.sprites.get(sprite)
    }
}
