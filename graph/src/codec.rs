//! Wire encodings for the packed-array cell values described in §6: plain
//! concatenated big-endian `NodeId`s, no framing, since every element is a
//! fixed 8 bytes.

use chunkedgraph_id::NodeId;

pub fn pack_ids(ids: &[NodeId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ids.len() * 8);
    for id in ids {
        out.extend_from_slice(&id.to_be_bytes());
    }
    out
}

pub fn unpack_ids(bytes: &[u8]) -> Vec<NodeId> {
    bytes.chunks_exact(8).map(|c| NodeId::from_be_bytes(c.try_into().unwrap())).collect()
}

pub fn pack_edge_pairs(pairs: &[(NodeId, NodeId)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pairs.len() * 16);
    for (u, v) in pairs {
        out.extend_from_slice(&u.to_be_bytes());
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

pub fn unpack_edge_pairs(bytes: &[u8]) -> Vec<(NodeId, NodeId)> {
    bytes
        .chunks_exact(16)
        .map(|c| {
            let u = NodeId::from_be_bytes(c[0..8].try_into().unwrap());
            let v = NodeId::from_be_bytes(c[8..16].try_into().unwrap());
            (u, v)
        })
        .collect()
}

/// Parallel encoding for the `ConnectivityAtomicAffinities` column (§6).
pub fn pack_f32s(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

pub fn unpack_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_be_bytes(c.try_into().unwrap())).collect()
}

/// Parallel encoding for the `ConnectivityAtomicAreas` column (§6).
pub fn pack_u32s(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

pub fn unpack_u32s(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|c| u32::from_be_bytes(c.try_into().unwrap())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkedgraph_id::GraphLayout;

    #[test]
    fn ids_round_trip() {
        let layout = GraphLayout::for_test();
        let ids = vec![
            NodeId::encode(&layout, 1, 0, 0, 0, 1).unwrap(),
            NodeId::encode(&layout, 1, 0, 0, 0, 2).unwrap(),
        ];
        assert_eq!(unpack_ids(&pack_ids(&ids)), ids);
    }

    #[test]
    fn f32s_round_trip() {
        let values = vec![0.0, 1.5, -2.25];
        assert_eq!(unpack_f32s(&pack_f32s(&values)), values);
    }

    #[test]
    fn u32s_round_trip() {
        let values = vec![0, 10, u32::MAX];
        assert_eq!(unpack_u32s(&pack_u32s(&values)), values);
    }
}
