use crate::map_defs::Sector;
use crate::slope::{slope_z_at, Slope};
use crate::MapPtr;
use glam::Vec2;

/// 3D-floor behaviour bits. Combined freely; tested with `Fof::has`.
#[derive(Debug, Clone, Copy)]
pub enum FofFlags {
    Exists = 1,
    RenderPlanes = 1 << 1,
    RenderSides = 1 << 2,
    /// Solid block: cuts walls and other solid FOF planes around it
    CutSolids = 1 << 3,
    Translucent = 1 << 4,
    Fog = 1 << 5,
    /// Band does not change light below it
    NoShade = 1 << 6,
    /// Band boundary also slices sprites
    CutSprites = 1 << 7,
    /// Draw the underside even when viewed from above, and vice versa
    BothPlanes = 1 << 8,
    InvertPlanes = 1 << 9,
    InvertSides = 1 << 10,
    AllSides = 1 << 11,
    /// Light-only band, no geometry of its own
    Extra = 1 << 12,
    DoubleShadow = 1 << 13,
    /// Band boundary cuts other Extra bands
    CutExtra = 1 << 14,
    Swimmable = 1 << 15,
}

/// A 3D-floor ("fake floor") inside a sector. Geometry comes from a control
/// sector: its ceiling is the FOF top, its floor the FOF bottom.
#[derive(Debug, Clone)]
pub struct Fof {
    pub flags: u32,
    /// Control sector holding heights, slopes, flats and light
    pub control: MapPtr<Sector>,
    /// Line whose front side supplies the side texture
    pub master_line: usize,
    /// 0..=255, meaningful when translucent
    pub alpha: i32,
    /// Additive/subtractive/etc override, 0 for plain translucency
    pub blend: i32,
}

impl Fof {
    #[inline]
    pub fn has(&self, flag: FofFlags) -> bool {
        self.flags & flag as u32 != 0
    }

    #[inline]
    pub fn top_at(&self, pos: Vec2) -> f32 {
        let c = self.control.as_ref();
        slope_z_at(c.ceiling_slope.as_ref(), pos, c.ceilingheight)
    }

    #[inline]
    pub fn bottom_at(&self, pos: Vec2) -> f32 {
        let c = self.control.as_ref();
        slope_z_at(c.floor_slope.as_ref(), pos, c.floorheight)
    }

    pub fn top_slope(&self) -> Option<&Slope> {
        self.control.as_ref().ceiling_slope.as_ref()
    }

    pub fn bottom_slope(&self) -> Option<&Slope> {
        self.control.as_ref().floor_slope.as_ref()
    }
}

/// One entry of a sector's stacked light list. The first band always covers
/// from the ceiling; later bands start at FOF tops, walking downward.
#[derive(Debug, Clone)]
pub struct LightBand {
    /// Flat band top height, used when `slope` is None
    pub height: f32,
    pub slope: Option<Slope>,
    pub lightlevel: i32,
    pub colormap: Option<usize>,
    /// FOF flag bits of the band source (NoShade/CutSprites/CutSolids)
    pub flags: u32,
    /// Bottom of the FOF that cast this band, for solid wall cutting. The
    /// ceiling band has no caster; the fields stay at their defaults.
    pub caster_bottom: f32,
    pub caster_bottom_slope: Option<Slope>,
}

impl LightBand {
    #[inline]
    pub fn z_at(&self, pos: Vec2) -> f32 {
        slope_z_at(self.slope.as_ref(), pos, self.height)
    }

    /// Caster FOF underside at a point
    #[inline]
    pub fn bottom_z_at(&self, pos: Vec2) -> f32 {
        slope_z_at(self.caster_bottom_slope.as_ref(), pos, self.caster_bottom)
    }

    #[inline]
    pub fn has(&self, flag: FofFlags) -> bool {
        self.flags & flag as u32 != 0
    }
}
