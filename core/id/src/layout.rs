use crate::error::IdError;

/// Bit-field widths used to pack a [`crate::NodeId`].
///
/// Computed once from dataset dimensions and chunk size when a graph is
/// created, then persisted alongside the rest of the graph metadata
/// (see `chunkedgraph-store`'s chunk-global meta row). The layout never
/// changes for the lifetime of a graph: widening it would silently
/// reinterpret every previously encoded ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphLayout {
    pub layer_bits: u32,
    pub cx_bits: u32,
    pub cy_bits: u32,
    pub cz_bits: u32,
    pub seg_bits: u32,
    /// Per-dimension factor between a chunk and its parent chunk.
    pub fanout: u64,
    /// Highest layer in the hierarchy; root IDs live here.
    pub top_layer: u8,
}

impl GraphLayout {
    pub fn new(
        layer_bits: u32,
        cx_bits: u32,
        cy_bits: u32,
        cz_bits: u32,
        seg_bits: u32,
        fanout: u64,
        top_layer: u8,
    ) -> Result<Self, IdError> {
        let sum = layer_bits + cx_bits + cy_bits + cz_bits + seg_bits;
        if sum != 64 {
            return Err(IdError::BadFieldWidths {
                layer_bits,
                cx_bits,
                cy_bits,
                cz_bits,
                seg_bits,
            });
        }
        if fanout < 1 {
            return Err(IdError::InvalidFanout(fanout));
        }
        Ok(Self { layer_bits, cx_bits, cy_bits, cz_bits, seg_bits, fanout, top_layer })
    }

    /// The layout used throughout this crate's doc examples and unit tests:
    /// fanout 2, chunk coordinates 8 bits wide, 32-bit segment ids.
    pub fn for_test() -> Self {
        Self::new(8, 8, 8, 8, 32, 2, 6).unwrap()
    }

    pub(crate) fn layer_max(&self) -> u64 {
        max_for_bits(self.layer_bits)
    }

    pub(crate) fn cx_max(&self) -> u64 {
        max_for_bits(self.cx_bits)
    }

    pub(crate) fn cy_max(&self) -> u64 {
        max_for_bits(self.cy_bits)
    }

    pub(crate) fn cz_max(&self) -> u64 {
        max_for_bits(self.cz_bits)
    }

    pub(crate) fn seg_max(&self) -> u64 {
        max_for_bits(self.seg_bits)
    }
}

fn max_for_bits(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_widths_not_summing_to_64() {
        let err = GraphLayout::new(8, 8, 8, 8, 8, 2, 6).unwrap_err();
        assert_eq!(
            err,
            IdError::BadFieldWidths { layer_bits: 8, cx_bits: 8, cy_bits: 8, cz_bits: 8, seg_bits: 8 }
        );
    }

    #[test]
    fn rejects_zero_fanout() {
        let err = GraphLayout::new(8, 8, 8, 8, 32, 0, 6).unwrap_err();
        assert_eq!(err, IdError::InvalidFanout(0));
    }
}
