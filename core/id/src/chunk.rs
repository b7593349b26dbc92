use crate::error::IdError;
use crate::layout::GraphLayout;

/// A spatial tile at a given layer, identified by `(layer, x, y, z)`.
///
/// Layer 1 chunks hold supervoxels; coordinates above layer 1 are allocated
/// by folding `fanout` children into one parent along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChunkCoord {
    pub layer: u8,
    pub x: u64,
    pub y: u64,
    pub z: u64,
}

impl ChunkCoord {
    pub fn new(layer: u8, x: u64, y: u64, z: u64) -> Self {
        Self { layer, x, y, z }
    }

    /// The chunk that directly contains this one, one layer up.
    ///
    /// `parent_chunk((l, x, y, z)) = (l+1, x/F, y/F, z/F)`. Skip connections
    /// (a node's stored parent living more than one layer above it) are a
    /// property of the hierarchy, not of this pure chunk arithmetic: callers
    /// that need to jump straight to a higher ancestor chunk should use
    /// [`ChunkCoord::ancestor_chunk`].
    pub fn parent(&self, layout: &GraphLayout) -> Self {
        self.ancestor_chunk(layout, self.layer + 1)
    }

    /// The ancestor chunk at `target_layer`, folding coordinates by
    /// `fanout^(target_layer - layer)` along each axis.
    pub fn ancestor_chunk(&self, layout: &GraphLayout, target_layer: u8) -> Self {
        debug_assert!(target_layer >= self.layer);
        let steps = (target_layer - self.layer) as u32;
        let divisor = layout.fanout.saturating_pow(steps).max(1);
        Self {
            layer: target_layer,
            x: self.x / divisor,
            y: self.y / divisor,
            z: self.z / divisor,
        }
    }

    /// All chunks at `target_layer` (a layer below this one) that fold into
    /// this chunk under `layout.fanout`.
    pub fn descendant_chunks(&self, layout: &GraphLayout, target_layer: u8) -> Vec<ChunkCoord> {
        debug_assert!(target_layer <= self.layer);
        let steps = (self.layer - target_layer) as u32;
        let span = layout.fanout.saturating_pow(steps).max(1);
        let mut out = Vec::with_capacity((span * span * span) as usize);
        for dx in 0..span {
            for dy in 0..span {
                for dz in 0..span {
                    out.push(ChunkCoord {
                        layer: target_layer,
                        x: self.x * span + dx,
                        y: self.y * span + dy,
                        z: self.z * span + dz,
                    });
                }
            }
        }
        out
    }

    /// Whether `descendant`'s chunk lies within this chunk's subtree, i.e.
    /// `descendant.ancestor_chunk(layout, self.layer) == self`.
    pub fn contains(&self, layout: &GraphLayout, descendant: &ChunkCoord) -> bool {
        if descendant.layer > self.layer {
            return false;
        }
        descendant.ancestor_chunk(layout, self.layer) == *self
    }

    pub(crate) fn validate(&self, layout: &GraphLayout) -> Result<(), IdError> {
        if (self.layer as u64) > layout.layer_max() {
            return Err(IdError::LayerOutOfRange { layer: self.layer as u64, bits: layout.layer_bits });
        }
        if self.x > layout.cx_max() {
            return Err(IdError::ChunkCoordOutOfRange {
                axis: crate::error::Axis::X,
                value: self.x,
                bits: layout.cx_bits,
            });
        }
        if self.y > layout.cy_max() {
            return Err(IdError::ChunkCoordOutOfRange {
                axis: crate::error::Axis::Y,
                value: self.y,
                bits: layout.cy_bits,
            });
        }
        if self.z > layout.cz_max() {
            return Err(IdError::ChunkCoordOutOfRange {
                axis: crate::error::Axis::Z,
                value: self.z,
                bits: layout.cz_bits,
            });
        }
        Ok(())
    }
}

/// The first ancestor layer at which `a` and `b`'s chunks coincide, i.e. the
/// layer above which the two nodes are guaranteed to share an ancestor
/// chunk. Computed by repeatedly folding both chunks' coordinates by
/// `fanout` until they match.
///
/// - Both chunks equal at layer `l` (same chunk): returns `l`, the
///   in-chunk case.
/// - Otherwise returns the smallest `k > l` at which the folded
///   coordinates agree.
pub fn crossing_layer(layout: &GraphLayout, a: ChunkCoord, b: ChunkCoord) -> u8 {
    debug_assert_eq!(a.layer, b.layer);
    if a == b {
        return a.layer;
    }
    let mut layer = a.layer;
    let (mut ax, mut ay, mut az) = (a.x, a.y, a.z);
    let (mut bx, mut by, mut bz) = (b.x, b.y, b.z);
    loop {
        layer += 1;
        ax /= layout.fanout;
        ay /= layout.fanout;
        az /= layout.fanout;
        bx /= layout.fanout;
        by /= layout.fanout;
        bz /= layout.fanout;
        if (ax, ay, az) == (bx, by, bz) {
            return layer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_chunk_round_trips_codec_example() {
        let layout = GraphLayout::for_test();
        let chunk = ChunkCoord::new(1, 3, 5, 7);
        assert_eq!(chunk.parent(&layout), ChunkCoord::new(2, 1, 2, 3));
    }

    #[test]
    fn descendant_chunks_are_inverse_of_ancestor_chunk() {
        let layout = GraphLayout::for_test();
        let parent = ChunkCoord::new(2, 1, 2, 3);
        let children = parent.descendant_chunks(&layout, 1);
        assert_eq!(children.len(), 8);
        for child in &children {
            assert_eq!(child.ancestor_chunk(&layout, 2), parent);
            assert!(parent.contains(&layout, child));
        }
    }

    #[test]
    fn crossing_layer_adjacent_chunks() {
        let layout = GraphLayout::for_test();
        let a = ChunkCoord::new(1, 0, 0, 0);
        let b = ChunkCoord::new(1, 0, 0, 1);
        assert_eq!(crossing_layer(&layout, a, b), 2);
    }

    #[test]
    fn crossing_layer_distant_chunks_needs_two_folds() {
        let layout = GraphLayout::for_test();
        let a = ChunkCoord::new(1, 0, 0, 0);
        let b = ChunkCoord::new(1, 0, 3, 1);
        // y: 0 vs 3 only agree once folded twice (0 vs 3/4=0 at layer 3,
        // but first fold at layer 2 gives 0 vs 1 which still differ).
        assert_eq!(crossing_layer(&layout, a, b), 3);
    }

    #[test]
    fn same_chunk_has_crossing_layer_equal_to_own_layer() {
        let layout = GraphLayout::for_test();
        let a = ChunkCoord::new(1, 2, 2, 2);
        assert_eq!(crossing_layer(&layout, a, a), 1);
    }
}
