use crate::map_defs::Sector;
use crate::MapPtr;
use glam::Vec2;

/// A movable polygon with its own vertex ring, rendered with the heights and
/// surfaces of a control sector. Vertices are re-sorted into subsectors by a
/// mover thinker outside the renderer.
#[derive(Debug)]
pub struct PolyObject {
    /// Ring of vertices in draw order
    pub vertices: Vec<Vec2>,
    /// Segs making up the ring, indices into `Level::segs`
    pub segs: Vec<usize>,
    /// Supplies floor/ceiling heights, flats and translucency
    pub control: MapPtr<Sector>,
    pub render_top: bool,
    pub render_bottom: bool,
    pub render_sides: bool,
    /// 0..=9 translucency table index when see-through
    pub translucency: Option<i32>,
    pub center: Vec2,
}

impl PolyObject {
    pub fn is_translucent(&self) -> bool {
        self.translucency.is_some()
    }
}
