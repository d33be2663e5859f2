//! tbv-graph-stores - Graph storage sessions for tbv.
//!
//! Sessions submit the statements produced by `tbv-core` to a graph
//! database, one auto-commit statement per operation.
//!
//! # Supported Backends
//!
//! - **Neo4j** (feature: `neo4j`) - Neo4j graph database
//! - **Memgraph** (feature: `memgraph`) - Memgraph (Neo4j-compatible)
//! - **Recording** (always available) - records statements in memory

mod factory;
mod recording;

#[cfg(any(feature = "neo4j", feature = "memgraph"))]
mod bolt;

#[cfg(feature = "neo4j")]
mod neo4j;

#[cfg(feature = "memgraph")]
mod memgraph;

pub use factory::SessionFactory;
pub use recording::RecordingSession;

#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jSession;

#[cfg(feature = "memgraph")]
pub use memgraph::MemgraphSession;

// Re-export core types
pub use tbv_core::traits::{GraphSession, GraphStoreConfig, GraphStoreProvider};
