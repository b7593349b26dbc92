//! A concrete [`RawChunkDataSource`] reading one JSON file per layer-2
//! chunk from a directory, in the spirit of §6's chunk-edge files: the
//! upstream segmentation pipeline's export format is out of scope, so this
//! is the simplest file-based stand-in a deployment can point at real
//! exported data with a thin reformatting step.

use std::path::{Path, PathBuf};

use chunkedgraph_graph::{Edge, EdgeSet, RawChunkDataSource};
use chunkedgraph_id::{ChunkCoord, NodeId};
use serde::Deserialize;

pub struct DirRawChunkDataSource {
    root: PathBuf,
}

impl DirRawChunkDataSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn chunk_path(&self, chunk: ChunkCoord) -> PathBuf {
        self.root.join(format!("{}_{}_{}.json", chunk.x, chunk.y, chunk.z))
    }

    fn load(&self, chunk: ChunkCoord) -> std::io::Result<ChunkFile> {
        let text = std::fs::read_to_string(self.chunk_path(chunk))?;
        serde_json::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[derive(Deserialize)]
struct ChunkFile {
    supervoxels: Vec<u64>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Deserialize)]
struct RawEdge {
    a: u64,
    b: u64,
    #[serde(default)]
    affinity: Option<f32>,
    #[serde(default)]
    area: Option<u32>,
}

impl RawChunkDataSource for DirRawChunkDataSource {
    fn atomic_edges(&self, chunk: ChunkCoord) -> std::io::Result<EdgeSet> {
        if !self.chunk_path(chunk).exists() {
            return Ok(EdgeSet::new());
        }
        let file = self.load(chunk)?;
        Ok(EdgeSet::from_edges(
            file.edges
                .into_iter()
                .map(|e| Edge::new(NodeId::from_raw(e.a), NodeId::from_raw(e.b), e.affinity, e.area))
                .collect(),
        ))
    }

    fn supervoxels(&self, chunk: ChunkCoord) -> std::io::Result<Vec<NodeId>> {
        if !self.chunk_path(chunk).exists() {
            return Ok(Vec::new());
        }
        let file = self.load(chunk)?;
        Ok(file.supervoxels.into_iter().map(NodeId::from_raw).collect())
    }
}

/// Validate the directory exists before a run starts, so a missing raw-data
/// path fails as a configuration error (exit `2`) rather than surfacing as
/// a flood of per-chunk task failures (exit `4`).
pub fn validate_raw_dir(path: &Path) -> Result<(), String> {
    if !path.is_dir() {
        return Err(format!("raw data directory {} does not exist", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_chunk_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirRawChunkDataSource::new(dir.path().to_path_buf());
        let chunk = ChunkCoord::new(2, 0, 0, 0);
        assert!(source.supervoxels(chunk).unwrap().is_empty());
        assert!(source.atomic_edges(chunk).unwrap().is_empty());
    }

    #[test]
    fn chunk_file_is_parsed_into_supervoxels_and_edges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("0_0_0.json"),
            r#"{"supervoxels": [1, 2], "edges": [{"a": 1, "b": 2, "affinity": 0.5}]}"#,
        )
        .unwrap();
        let source = DirRawChunkDataSource::new(dir.path().to_path_buf());
        let chunk = ChunkCoord::new(2, 0, 0, 0);

        let supervoxels = source.supervoxels(chunk).unwrap();
        assert_eq!(supervoxels, vec![NodeId::from_raw(1), NodeId::from_raw(2)]);

        let edges = source.atomic_edges(chunk).unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn validate_raw_dir_rejects_a_missing_path() {
        assert!(validate_raw_dir(Path::new("/does/not/exist/anywhere")).is_err());
    }
}
