use crate::fof::{Fof, LightBand};
use crate::slope::{slope_z_at, Slope};
use crate::MapPtr;
use glam::Vec2;
use math::Angle;

/// The SECTORS record, at runtime. Carries everything the hardware renderer
/// reads: heights and slopes, flats and their scroll/rotation, the 3D-floor
/// list and the light list derived from it.
#[derive(Default)]
pub struct Sector {
    /// An incremented "ID" of sorts.
    pub num: u32,
    pub floorheight: f32,
    pub ceilingheight: f32,
    pub floor_slope: Option<Slope>,
    pub ceiling_slope: Option<Slope>,
    /// Is a tag or index to flat
    pub floorpic: usize,
    /// Is a tag or index to flat
    pub ceilingpic: usize,
    pub lightlevel: i32,
    pub special: i16,
    pub tag: i16,

    /// Flat scroll offsets, world units
    pub floor_xoffs: f32,
    pub floor_yoffs: f32,
    pub ceiling_xoffs: f32,
    pub ceiling_yoffs: f32,
    /// Flat rotation
    pub floorpic_angle: Angle,
    pub ceilingpic_angle: Angle,

    pub extra_colormap: Option<usize>,
    pub fofs: Vec<Fof>,
    /// Stacked lighting from FOFs, top-down; empty when unbanded
    pub lightlist: Vec<LightBand>,

    /// Line acting as a vertical cull plane for sprites, if any
    pub cullheight: Option<usize>,
    /// Fake floor/ceiling sector for deep-water style clipping
    pub heightsec: Option<usize>,
    /// Indices of things standing in this sector
    pub things: Vec<usize>,
}

impl std::fmt::Debug for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sector")
            .field("num", &self.num)
            .field("floorheight", &self.floorheight)
            .field("ceilingheight", &self.ceilingheight)
            .field("floorpic", &self.floorpic)
            .field("ceilingpic", &self.ceilingpic)
            .field("lightlevel", &self.lightlevel)
            .finish_non_exhaustive()
    }
}

impl Sector {
    pub fn new(
        num: u32,
        floorheight: f32,
        ceilingheight: f32,
        floorpic: usize,
        ceilingpic: usize,
        lightlevel: i32,
    ) -> Self {
        Self {
            num,
            floorheight,
            ceilingheight,
            floorpic,
            ceilingpic,
            lightlevel,
            ..Self::default()
        }
    }

    /// Floor height under a point, slope-evaluated
    #[inline]
    pub fn floor_z_at(&self, pos: Vec2) -> f32 {
        slope_z_at(self.floor_slope.as_ref(), pos, self.floorheight)
    }

    /// Ceiling height over a point, slope-evaluated
    #[inline]
    pub fn ceiling_z_at(&self, pos: Vec2) -> f32 {
        slope_z_at(self.ceiling_slope.as_ref(), pos, self.ceilingheight)
    }

    #[inline]
    pub fn has_lightlist(&self) -> bool {
        !self.lightlist.is_empty()
    }

    /// Index of the light band governing height `z` at `pos`. Walks the list
    /// top-down, so the first band whose top is at or above `z` wins.
    /// `underside` selects the band below an exact boundary hit.
    pub fn light_index_at(&self, z: f32, pos: Vec2, underside: bool) -> usize {
        if self.lightlist.is_empty() {
            return 0;
        }
        let mut idx = 0;
        for (i, band) in self.lightlist.iter().enumerate().skip(1) {
            let h = band.z_at(pos);
            if h <= z {
                if underside && (h - z).abs() < f32::EPSILON {
                    idx = i;
                }
                break;
            }
            idx = i;
        }
        idx
    }

    /// Per-band light level with the sector level as band zero fallback
    pub fn band_light(&self, idx: usize) -> i32 {
        self.lightlist
            .get(idx)
            .map(|b| b.lightlevel)
            .unwrap_or(self.lightlevel)
    }

}

#[derive(Debug)]
pub struct SideDef {
    // add this to the calculated texture column
    pub textureoffset: f32,

    // add this to the calculated texture top
    pub rowoffset: f32,

    pub toptexture: Option<usize>,
    pub bottomtexture: Option<usize>,
    pub midtexture: Option<usize>,

    /// How many times a two-sided midtexture tiles downward; 0 means a
    /// single quad, negative means fill the whole opening
    pub repeat_count: i16,

    // Sector the SideDef is facing.
    pub sector: MapPtr<Sector>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BBox {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl BBox {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        let mut bbox = BBox::default();

        if v1.x < v2.x {
            bbox.left = v1.x;
            bbox.right = v2.x;
        } else {
            bbox.left = v2.x;
            bbox.right = v1.x;
        }

        if v1.y < v2.y {
            bbox.bottom = v1.y;
            bbox.top = v2.y;
        } else {
            bbox.bottom = v2.y;
            bbox.top = v1.y;
        }

        bbox
    }
}

pub struct LineDef {
    // Vertices, from v1 to v2.
    pub v1: Vec2,
    pub v2: Vec2,
    // Precalculated v2 - v1 for side checking.
    pub delta: Vec2,
    pub flags: u32,
    pub special: i16,
    pub tag: i16,
    /// Translucency level 0..=9 for midtextures on blend-special lines
    pub translucency: Option<i32>,
    /// Blend style override carried by the line special
    pub blend: i32,

    pub bbox: BBox,

    /// Helper to prevent having to look the sidedef up during drawing
    pub front_sidedef: MapPtr<SideDef>,
    pub back_sidedef: Option<MapPtr<SideDef>>,

    // Front and back sector.
    pub frontsector: MapPtr<Sector>,
    pub backsector: Option<MapPtr<Sector>>,

    /// Destination line for portal specials
    pub portal_target: Option<usize>,
}

impl std::fmt::Debug for LineDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linedef")
            .field("v1", &self.v1)
            .field("v2", &self.v2)
            .field("flags", &self.flags)
            .field("special", &self.special)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

impl LineDef {
    pub fn point_on_side(&self, v: Vec2) -> usize {
        let dx = v.x - self.v1.x;
        let dy = v.y - self.v1.y;

        if (dy * self.delta.x) <= (self.delta.y * dx) {
            // Front side
            return 0;
        }
        // Backside
        1
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    // Vertices, from v1 to v2.
    pub v1: Vec2,
    pub v2: Vec2,

    /// Offset distance along the linedef (from its first vertex) to the
    /// start of this `Segment`
    pub offset: f32,
    pub angle: Angle,
    /// World length of v1..v2
    pub length: f32,

    pub sidedef: MapPtr<SideDef>,
    /// The Linedef this segment travels along. Used for flags and specials
    /// during drawing.
    pub linedef: MapPtr<LineDef>,

    pub frontsector: MapPtr<Sector>,
    pub backsector: Option<MapPtr<Sector>>,

    /// Present when this seg belongs to a polyobject instead of the static
    /// map
    pub polyobj: Option<usize>,
}

impl Segment {
    pub fn point_on_side(&self, v: Vec2) -> usize {
        let dx = v.x - self.v1.x;
        let dy = v.y - self.v1.y;
        let delta = self.v2 - self.v1;

        if (dy * delta.x) <= (delta.y * dx) {
            return 0;
        }
        1
    }
}

/// Convex polygon covering a subsector, pre-triangulatable as a fan. The
/// plane builder walks the ring in order.
#[derive(Debug, Clone, Default)]
pub struct PlanePoly {
    pub points: Vec<Vec2>,
}

#[derive(Debug)]
pub struct SubSector {
    pub sector: MapPtr<Sector>,
    /// How many `Segment`s line this `SubSector`
    pub seg_count: u32,
    /// The `Segment` to start with
    pub start_seg: u32,
    /// Convex floor/ceiling outline; empty polys are never rendered
    pub planepoly: PlanePoly,
    /// Polyobjects currently sorted into this leaf
    pub polyobjs: Vec<usize>,
}

#[derive(Debug, PartialEq)]
pub struct Node {
    /// Where the line used for splitting the level starts
    pub xy: Vec2,
    /// Where the line used for splitting the level ends
    pub delta: Vec2,
    /// Coordinates of the bounding boxes:
    /// - [0][0] == right box, top-left
    /// - [0][1] == right box, bottom-right
    /// - [1][0] == left box, top-left
    /// - [1][1] == left box, bottom-right
    pub bboxes: [[Vec2; 2]; 2],
    /// The node children. The final 'leaf' is bitmasked to find the index
    /// into the subsector array.
    pub children: [u32; 2],
}

impl Node {
    /// 0 if `v` is on the right of the splitting line, 1 on the left
    pub fn point_on_side(&self, v: &Vec2) -> usize {
        let dx = v.x - self.xy.x;
        let dy = v.y - self.xy.y;

        if (dy * self.delta.x) <= (self.delta.y * dx) {
            return 0;
        }
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn node_point_sides() {
        let node = Node {
            xy: Vec2::new(0.0, 0.0),
            delta: Vec2::new(0.0, 64.0),
            bboxes: [[Vec2::ZERO; 2]; 2],
            children: [0, 1],
        };
        // split line runs north; east is the right side
        assert_eq!(node.point_on_side(&Vec2::new(10.0, 10.0)), 0);
        assert_eq!(node.point_on_side(&Vec2::new(-10.0, 10.0)), 1);
    }

    #[test]
    fn light_index_walks_top_down() {
        let mut sec = Sector::new(0, 0.0, 256.0, 0, 0, 200);
        sec.lightlist = vec![
            LightBand {
                height: 256.0,
                slope: None,
                lightlevel: 200,
                colormap: None,
                flags: 0,
                caster_bottom: 0.0,
                caster_bottom_slope: None,
            },
            LightBand {
                height: 128.0,
                slope: None,
                lightlevel: 120,
                colormap: None,
                flags: 0,
                caster_bottom: 0.0,
                caster_bottom_slope: None,
            },
            LightBand {
                height: 64.0,
                slope: None,
                lightlevel: 60,
                colormap: None,
                flags: 0,
                caster_bottom: 0.0,
                caster_bottom_slope: None,
            },
        ];
        let p = Vec2::ZERO;
        assert_eq!(sec.light_index_at(200.0, p, false), 0);
        assert_eq!(sec.light_index_at(100.0, p, false), 1);
        assert_eq!(sec.light_index_at(10.0, p, false), 2);
        assert_eq!(sec.band_light(1), 120);
    }
}
