//! Read-only level geometry as consumed by the renderer: sectors, segs,
//! subsectors, BSP nodes, 3D-floors, polyobjects and the things standing in
//! them. Nothing in here draws; it answers geometric queries.
#![allow(clippy::new_without_default)]

use std::fmt::{self, Debug};
use std::ops::{Deref, DerefMut};

mod fof;
mod flags;
mod map_defs;
mod pic;
mod polyobj;
mod slope;
mod sprite;
mod thing;
mod view;

pub use fof::{Fof, FofFlags, LightBand};
pub use flags::LineDefFlags;
pub use glam;
pub use log;
pub use map_defs::{BBox, LineDef, Node, PlanePoly, Sector, Segment, SideDef, SubSector};
pub use pic::{ExtraColormap, FlatInfo, PatchInfo, PicData, TextureInfo};
pub use polyobj::PolyObject;
pub use slope::Slope;
pub use sprite::{SpriteDef, SpriteFrame, SpriteRotation};
pub use thing::{frame_flags, render_flags, thing_flags2, BlendStyle, Thing};
pub use view::ViewPoint;

/// Leaf marker bit in BSP node child ids.
pub const IS_SSECTOR_MASK: u32 = 0x8000_0000;

/// Linedef special that marks a seg as a world-edge horizon line.
pub const HORIZON_SPECIAL: i16 = 41;

/// Linedef special that carries a see-through portal to another line.
pub const PORTAL_SPECIAL: i16 = 40;

/// Functions purely as a safe fn wrapper around a `NonNull` because we know
/// that the map structure is not going to change under us
pub struct MapPtr<T: Debug> {
    inner: *mut T,
}

impl<T: Debug> MapPtr<T> {
    /// # Safety
    /// The pointee must live at a stable address for the life of the level.
    pub unsafe fn new(t: &mut T) -> MapPtr<T> {
        MapPtr { inner: t as *mut _ }
    }
}

impl<T: Debug> PartialEq for MapPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        #[cfg(feature = "null_check")]
        if self.inner.is_null() {
            std::panic!("NULL");
        }
        self.inner == other.inner
    }
}

impl<T: Debug> Clone for MapPtr<T> {
    fn clone(&self) -> MapPtr<T> {
        #[cfg(feature = "null_check")]
        if self.inner.is_null() {
            std::panic!("NULL");
        }
        MapPtr { inner: self.inner }
    }
}

impl<T: Debug> Deref for MapPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        #[cfg(feature = "null_check")]
        if self.inner.is_null() {
            std::panic!("NULL");
        }
        unsafe { &*self.inner }
    }
}

impl<T: Debug> DerefMut for MapPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        #[cfg(feature = "null_check")]
        if self.inner.is_null() {
            std::panic!("NULL");
        }
        unsafe { &mut *self.inner }
    }
}

impl<T: Debug> AsRef<T> for MapPtr<T> {
    fn as_ref(&self) -> &T {
        #[cfg(feature = "null_check")]
        if self.inner.is_null() {
            std::panic!("NULL");
        }
        unsafe { &*self.inner }
    }
}

impl<T: fmt::Debug> fmt::Debug for MapPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ptr->{:?}->{:#?}", self.inner, unsafe {
            self.inner.as_ref()
        })
    }
}

/// The world as the renderer sees it for one frame. All `MapPtr` links in
/// here point back into the owned vectors; the vectors must not be resized
/// after the cross-links are made.
pub struct Level {
    pub sectors: Vec<Sector>,
    pub sides: Vec<SideDef>,
    pub lines: Vec<LineDef>,
    pub segs: Vec<Segment>,
    pub subsectors: Vec<SubSector>,
    pub nodes: Vec<Node>,
    pub polyobjects: Vec<PolyObject>,
    pub things: Vec<Thing>,
    pub colormaps: Vec<ExtraColormap>,
    /// Flat id that means "draw sky here"
    pub sky_flat: usize,
    /// Root node to start BSP traversal from
    pub root_node: u32,
    /// Synthetic camera for skybox rendering, if the map defines one
    pub skybox_viewpoint: Option<ViewPoint>,
}

impl Level {
    pub fn new(sky_flat: usize) -> Self {
        Level {
            sectors: Vec::new(),
            sides: Vec::new(),
            lines: Vec::new(),
            segs: Vec::new(),
            subsectors: Vec::new(),
            nodes: Vec::new(),
            polyobjects: Vec::new(),
            things: Vec::new(),
            colormaps: Vec::new(),
            sky_flat,
            root_node: 0,
            skybox_viewpoint: None,
        }
    }

    pub fn colormap(&self, id: Option<usize>) -> Option<&ExtraColormap> {
        id.and_then(|i| self.colormaps.get(i))
    }
}
