/// Linedef flags the renderer cares about. Used as `flags & Flag as u32`.
#[derive(Debug, Clone, Copy)]
pub enum LineDefFlags {
    /// Ends of segs on this line block movement (unused by rendering but
    /// kept for parity with map data)
    Blocking = 1,
    /// Has a back side
    TwoSided = 1 << 2,
    /// Upper texture drawn from its top edge down instead of from the
    /// opening
    UnpegTop = 1 << 3,
    /// Lower/middle texture drawn from the floor up
    UnpegBottom = 1 << 4,
    /// Climb-blocker; doubles as the "group cull" marker on cull-height
    /// lines
    NoClimb = 1 << 6,
    /// Skew the top/bottom texture along a sloped ceiling/floor
    SkewTexture = 1 << 8,
    /// Alternate pegging origin for sloped walls
    PegMidSlope = 1 << 9,
    /// Peg the two-sided middle texture to the taller opening edge
    PegMiddle = 1 << 10,
}

#[cfg(test)]
mod tests {
    use super::LineDefFlags;

    #[test]
    fn distinct_bits() {
        let all = [
            LineDefFlags::Blocking as u32,
            LineDefFlags::TwoSided as u32,
            LineDefFlags::UnpegTop as u32,
            LineDefFlags::UnpegBottom as u32,
            LineDefFlags::NoClimb as u32,
            LineDefFlags::SkewTexture as u32,
            LineDefFlags::PegMidSlope as u32,
            LineDefFlags::PegMiddle as u32,
        ];
        let mut acc = 0u32;
        for f in all {
            assert_eq!(acc & f, 0);
            acc |= f;
        }
    }
}
