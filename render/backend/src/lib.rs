//! The contract between the polygon pipeline and whatever actually draws.
//! The renderer produces surfaces, vertices and state changes; a backend
//! implementation maps them onto a graphics API. Nothing here owns pixels.

use glam::Vec3;
use level::ExtraColormap;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// One output vertex: world position plus texture coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct OutVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub s: f32,
    pub t: f32,
}

impl OutVector {
    pub const fn new(x: f32, y: f32, z: f32, s: f32, t: f32) -> Self {
        OutVector { x, y, z, s, t }
    }
}

/// Per-polygon colour state: modulation colour, tint and fade targets, and
/// the light info a palette-rendering backend needs to pick a light table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInfo {
    pub poly_color: [u8; 4],
    pub tint_color: [u8; 4],
    pub fade_color: [u8; 4],
    pub light_level: i32,
    pub fade_start: u8,
    pub fade_end: u8,
    /// Backend light-table handle when palette rendering is on
    pub light_table: Option<u32>,
}

impl Default for SurfaceInfo {
    fn default() -> Self {
        SurfaceInfo {
            poly_color: [0xff; 4],
            tint_color: [0xff; 4],
            fade_color: [0xff; 4],
            light_level: 255,
            fade_start: 0,
            fade_end: 31,
            light_table: None,
        }
    }
}

/// A view transform handed to the backend before drawing a batch of world
/// polygons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pos: Vec3,
    /// Pitch in degrees
    pub angle_x: f32,
    /// Yaw in degrees
    pub angle_y: f32,
    pub scale: Vec3,
    pub fov_x: f32,
    pub fov_y: f32,
    pub flip: bool,
    /// Roll in degrees when Some
    pub roll: Option<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            pos: Vec3::ZERO,
            angle_x: 0.0,
            angle_y: 0.0,
            scale: Vec3::ONE,
            fov_x: 90.0,
            fov_y: 90.0,
            flip: false,
            roll: None,
        }
    }
}

/// Polygon state bits. Multiple bits are routinely active at once, so this
/// stays a mask rather than an enum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PolyFlags(pub u32);

impl PolyFlags {
    pub const NONE: PolyFlags = PolyFlags(0);
    /// Alpha-tested cutout, depth written
    pub const MASKED: PolyFlags = PolyFlags(1);
    pub const TRANSLUCENT: PolyFlags = PolyFlags(1 << 1);
    pub const ADDITIVE: PolyFlags = PolyFlags(1 << 2);
    pub const SUBTRACTIVE: PolyFlags = PolyFlags(1 << 3);
    pub const REVERSE_SUBTRACT: PolyFlags = PolyFlags(1 << 4);
    pub const MULTIPLICATIVE: PolyFlags = PolyFlags(1 << 5);
    /// Fog-block surface; implies no texture sampling
    pub const FOG: PolyFlags = PolyFlags(1 << 6);
    /// Alpha-tested and blended, for textures with holes
    pub const ENVIRONMENT: PolyFlags = PolyFlags(1 << 7);
    /// All bits that pick a blend equation
    pub const BLEND_MASK: PolyFlags = PolyFlags(
        Self::MASKED.0
            | Self::TRANSLUCENT.0
            | Self::ADDITIVE.0
            | Self::SUBTRACTIVE.0
            | Self::REVERSE_SUBTRACT.0
            | Self::MULTIPLICATIVE.0
            | Self::FOG.0
            | Self::ENVIRONMENT.0,
    );
    /// Draw with no texture bound
    pub const NO_TEXTURE: PolyFlags = PolyFlags(1 << 8);
    /// Depth/stencil only, no colour output
    pub const INVISIBLE: PolyFlags = PolyFlags(1 << 9);
    /// Write the depth buffer even when blended
    pub const OCCLUDE: PolyFlags = PolyFlags(1 << 10);
    pub const NO_DEPTH_TEST: PolyFlags = PolyFlags(1 << 11);
    /// Modulate texture by the surface polygon colour
    pub const MODULATED: PolyFlags = PolyFlags(1 << 12);
    pub const NO_ALPHA_TEST: PolyFlags = PolyFlags(1 << 13);
    /// Water-style distortion wanted for this surface
    pub const RIPPLE: PolyFlags = PolyFlags(1 << 14);
    /// Small depth bias toward the viewer, for midtextures against FOFs
    pub const DECAL: PolyFlags = PolyFlags(1 << 15);

    #[inline]
    pub const fn contains(self, other: PolyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: PolyFlags) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PolyFlags {
    type Output = PolyFlags;
    #[inline]
    fn bitor(self, rhs: PolyFlags) -> PolyFlags {
        PolyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for PolyFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: PolyFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PolyFlags {
    type Output = PolyFlags;
    #[inline]
    fn bitand(self, rhs: PolyFlags) -> PolyFlags {
        PolyFlags(self.0 & rhs.0)
    }
}

impl Not for PolyFlags {
    type Output = PolyFlags;
    #[inline]
    fn not(self) -> PolyFlags {
        PolyFlags(!self.0)
    }
}

/// What the next textured draw samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    None,
    /// Wall texture by id
    Texture(usize),
    /// Floor/ceiling flat by id
    Flat(usize),
    /// Sprite patch, optionally remapped through a translation colormap
    Patch {
        patch: usize,
        colormap: Option<usize>,
    },
}

/// Stencil-window phases for portal rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilState {
    /// Normal rendering, stencil test off
    Inactive,
    /// Increment stencil where the portal seg lands
    Begin,
    /// Test-equal against the given recursion level
    Inside,
    /// Decrement back out of the window
    Finish,
}

/// Which shader family a surface wants; backends free to ignore.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ShaderTarget {
    #[default]
    None,
    Floor,
    Wall,
    Sprite,
    Sky,
    Fog,
    WaterRipple,
}

/// Everything the pipeline needs from a graphics API. One implementation
/// per backend; the renderer is generic over this.
pub trait GraphicsBackend {
    /// Draw or buffer one convex polygon. `horizon` marks horizon-fan
    /// geometry that wants the far-plane depth trick.
    fn draw_polygon(
        &mut self,
        surf: &SurfaceInfo,
        verts: &[OutVector],
        flags: PolyFlags,
        shader: ShaderTarget,
        horizon: bool,
    );

    fn set_texture(&mut self, source: TextureSource);

    fn set_transform(&mut self, transform: &Transform);

    /// Raw blend-state change outside of polygon submission
    fn set_blend(&mut self, flags: PolyFlags);

    fn set_stencil(&mut self, state: StencilState, level: u32);

    /// Erase the depth buffer, honouring any active stencil mask
    fn clear_depth(&mut self);

    /// Clear colour and depth at viewpoint start
    fn clear_view(&mut self, clear_color: bool);

    fn draw_sky_dome(&mut self, texture: usize, transform: &Transform);

    /// Create (or return the existing) light table for a colormap. Keyed by
    /// id on the caller side; backends just allocate.
    fn create_light_table(&mut self, colormap: &ExtraColormap) -> u32;

    /// Grab the current framebuffer for later redraw
    fn capture_screen(&mut self);

    /// Paint the captured framebuffer back
    fn draw_captured_screen(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_mask_ops() {
        let f = PolyFlags::TRANSLUCENT | PolyFlags::OCCLUDE;
        assert!(f.contains(PolyFlags::TRANSLUCENT));
        assert!(f.intersects(PolyFlags::BLEND_MASK));
        assert!(!(f & PolyFlags::FOG).intersects(PolyFlags::FOG));
        // stripping the blend bits leaves only occlude
        let stripped = f & !PolyFlags::BLEND_MASK;
        assert_eq!(stripped, PolyFlags::OCCLUDE);
    }
}
