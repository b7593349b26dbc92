//! Wire encodings for the atomic-edge parallel arrays (§6:
//! `connectivity.atomic_affinities`/`.atomic_areas`), kept local to this
//! crate since nothing outside ingest ever reads these columns back in bulk
//! -- the edit path reads individual atomic partners, not the whole array.

pub fn pack_f32s(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

pub fn pack_u32s(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}
