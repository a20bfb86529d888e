/// Rotation layout of one sprite animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteRotation {
    /// One patch used for every view angle
    Single,
    /// Eight 45° rotation slots
    Eight,
    /// Sixteen 22.5° rotation slots
    Sixteen,
    /// Single patch plus a dedicated right-side patch
    LockedRight,
    /// Single patch plus a dedicated left-side patch
    LockedLeft,
}

/// One animation frame of a sprite: up to sixteen rotation patches plus
/// per-rotation mirror bits.
#[derive(Debug, Clone)]
pub struct SpriteFrame {
    pub rotate: SpriteRotation,
    /// Patch handles per rotation slot; `Single` uses slot 0 only
    pub patches: [usize; 16],
    /// Mirror bit per rotation slot
    pub flip: u16,
}

impl SpriteFrame {
    pub fn single(patch: usize, flipped: bool) -> Self {
        SpriteFrame {
            rotate: SpriteRotation::Single,
            patches: [patch; 16],
            flip: if flipped { 1 } else { 0 },
        }
    }

    #[inline]
    pub fn flipped(&self, rot: usize) -> bool {
        self.flip & (1 << rot) != 0
    }
}

/// All frames of one sprite.
#[derive(Debug, Clone, Default)]
pub struct SpriteDef {
    pub frames: Vec<SpriteFrame>,
}
