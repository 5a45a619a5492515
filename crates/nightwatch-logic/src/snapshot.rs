//! Level export and save/load.
//!
//! JSON carries the plain graph record (`regions`, `nodes`, `edges`, `meta`,
//! `params`) for tools and viewers. The binary form wraps the graph in a
//! versioned bincode envelope for fast reloads. Both loaders re-check the
//! structural invariants before handing a graph back.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GraphError;
use crate::graph::Graph;

/// Version number for the binary snapshot format (increment when it changes)
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotData {
    version: u32,
    graph: Graph,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("snapshot holds an invalid graph: {0}")]
    Invalid(#[from] GraphError),
}

pub fn to_json(graph: &Graph) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string_pretty(graph)?)
}

pub fn write_json<W: Write>(writer: W, graph: &Graph) -> Result<(), SnapshotError> {
    serde_json::to_writer_pretty(writer, graph)?;
    Ok(())
}

pub fn from_json(json: &str) -> Result<Graph, SnapshotError> {
    let graph: Graph = serde_json::from_str(json)?;
    graph.check_invariants()?;
    Ok(graph)
}

pub fn read_json<R: Read>(reader: R) -> Result<Graph, SnapshotError> {
    let graph: Graph = serde_json::from_reader(reader)?;
    graph.check_invariants()?;
    Ok(graph)
}

/// Save a graph to a writer as a versioned binary snapshot
pub fn save<W: Write>(writer: W, graph: &Graph) -> Result<(), SnapshotError> {
    let data = SnapshotData {
        version: SNAPSHOT_VERSION,
        graph: graph.clone(),
    };
    bincode::serialize_into(writer, &data)?;
    Ok(())
}

/// Load a graph from a binary snapshot
pub fn load<R: Read>(reader: R) -> Result<Graph, SnapshotError> {
    let data: SnapshotData = bincode::deserialize_from(reader)?;
    if data.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found: data.version,
        });
    }
    data.graph.check_invariants()?;
    Ok(data.graph)
}
