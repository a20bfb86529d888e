//! Shared per-frame data carried between pipeline stages.

use level::SpriteRotation;
use render_backend::{OutVector, PolyFlags, SurfaceInfo, TextureSource};

/// Hard cap on portal recursion and so on the state stack depth.
pub const MAX_PORTAL_DEPTH: usize = 8;

/// Vissprite arena chunking; sprites past the cap alias the overflow slot.
pub const MAX_VISSPRITES: usize = 2048;
pub const VISSPRITE_CHUNK_BITS: usize = 6;
pub const VISSPRITES_PER_CHUNK: usize = 1 << VISSPRITE_CHUNK_BITS;

/// Sprites are drawn after all walls and planes so translucency blends with
/// the rendered view and not the background. This is the per-object snapshot
/// made at projection time.
#[derive(Debug, Clone)]
pub struct VisSprite {
    /// World-space quad ends
    pub x1: f32,
    pub x2: f32,
    pub z1: f32,
    pub z2: f32,
    /// Bottom and top world heights
    pub gz: f32,
    pub gzt: f32,
    /// View-space depth, the main sort key
    pub tz: f32,
    /// Depth of the tracer for link-draw sprites
    pub tracer_tz: f32,
    pub patch: usize,
    pub colormap: Option<usize>,
    /// Index into `Level::things`
    pub thing: usize,
    pub flip: bool,
    pub vflip: bool,
    pub precip: bool,
    pub dispoffset: i32,
    pub scale: f32,
    pub spritexscale: f32,
    pub spriteyscale: f32,
    pub spritexoffset: f32,
    pub spriteyoffset: f32,
    pub shadowheight: f32,
    pub shadowscale: f32,
    pub renderflags: u32,
    pub rotate: SpriteRotation,
}

impl Default for VisSprite {
    fn default() -> Self {
        VisSprite {
            x1: 0.0,
            x2: 0.0,
            z1: 0.0,
            z2: 0.0,
            gz: 0.0,
            gzt: 0.0,
            tz: 0.0,
            tracer_tz: 0.0,
            patch: 0,
            colormap: None,
            thing: 0,
            flip: false,
            vflip: false,
            precip: false,
            dispoffset: 0,
            scale: 1.0,
            spritexscale: 1.0,
            spriteyscale: 1.0,
            spritexoffset: 0.0,
            spriteyoffset: 0.0,
            shadowheight: 1.0,
            shadowscale: 1.0,
            renderflags: 0,
            rotate: SpriteRotation::Single,
        }
    }
}

/// A deferred transparent wall, ready to draw once ordering is resolved.
#[derive(Debug, Clone)]
pub struct WallInfo {
    pub verts: [OutVector; 4],
    pub surf: SurfaceInfo,
    pub texture: TextureSource,
    pub blend: PolyFlags,
    pub fogwall: bool,
    pub lightlevel: i32,
    /// Lighting is applied at draw time so fog follows the sorted order
    pub colormap: Option<usize>,
}

/// A deferred transparent subsector plane.
#[derive(Debug, Clone)]
pub struct PlaneInfo {
    pub subsector: usize,
    pub is_ceiling: bool,
    pub height: f32,
    pub lightlevel: i32,
    pub flat: usize,
    pub alpha: i32,
    /// FOF control sector when this is a 3D-floor plane
    pub fof_sector: Option<usize>,
    pub blend: PolyFlags,
    pub fogplane: bool,
    pub colormap: Option<usize>,
}

/// A deferred transparent polyobject plane.
#[derive(Debug, Clone)]
pub struct PolyPlaneInfo {
    pub polyobj: usize,
    pub is_ceiling: bool,
    pub height: f32,
    pub lightlevel: i32,
    pub flat: usize,
    pub alpha: i32,
    pub fof_sector: Option<usize>,
    pub blend: PolyFlags,
    pub colormap: Option<usize>,
}

/// A drawnode points at one translucent wall or plane. Tag order matters
/// nowhere; the submission index (position in the arena) is the sort key.
#[derive(Debug, Clone)]
pub enum DrawNode {
    Plane(PlaneInfo),
    PolyPlane(PolyPlaneInfo),
    Wall(WallInfo),
}

impl DrawNode {
    #[inline]
    pub fn is_plane(&self) -> bool {
        matches!(self, DrawNode::Plane(_))
    }

    /// Height used by the coplanar-run tie-break
    pub fn plane_height(&self) -> Option<f32> {
        match self {
            DrawNode::Plane(p) => Some(p.height),
            _ => None,
        }
    }
}

/// Link-draw sprites skip the depth buffer at draw time; their quads get
/// replayed depth-only after sprite drawing so transparent surfaces can't
/// overwrite them.
#[derive(Debug, Clone)]
pub struct LinkDrawItem {
    pub verts: [OutVector; 4],
    pub patch: usize,
    pub colormap: Option<usize>,
}
