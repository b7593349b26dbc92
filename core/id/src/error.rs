use thiserror::Error;

/// Errors raised by the ID codec and chunk geometry.
///
/// These are caller-input errors: they are never retried and never wrapped
/// in a transient-failure type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("field widths {layer_bits}+{cx_bits}+{cy_bits}+{cz_bits}+{seg_bits} must sum to 64")]
    BadFieldWidths { layer_bits: u32, cx_bits: u32, cy_bits: u32, cz_bits: u32, seg_bits: u32 },

    #[error("layer {layer} does not fit in {bits} bits")]
    LayerOutOfRange { layer: u64, bits: u32 },

    #[error("chunk coordinate {value} on axis {axis:?} does not fit in {bits} bits")]
    ChunkCoordOutOfRange { axis: Axis, value: u64, bits: u32 },

    #[error("segment {segment} does not fit in {bits} bits")]
    SegmentOutOfRange { segment: u64, bits: u32 },

    #[error("fanout must be >= 1, got {0}")]
    InvalidFanout(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}
