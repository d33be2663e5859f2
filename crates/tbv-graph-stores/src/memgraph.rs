//! Memgraph session.
//! Memgraph speaks the Neo4j Bolt protocol.

use async_trait::async_trait;
use neo4rs::Graph;

use tbv_core::error::TbvResult;
use tbv_core::traits::{GraphSession, GraphStoreConfig};
use tbv_core::types::{Cypher, Row};

use crate::bolt;

/// Session against a Memgraph server.
pub struct MemgraphSession {
    graph: Graph,
    #[allow(dead_code)]
    config: GraphStoreConfig,
}

impl MemgraphSession {
    /// Connect to the server named by `config`.
    pub async fn new(config: GraphStoreConfig) -> TbvResult<Self> {
        let graph = bolt::connect(&config, "memgraph", "Memgraph").await?;
        Ok(Self { graph, config })
    }
}

#[async_trait]
impl GraphSession for MemgraphSession {
    async fn run(&self, cypher: &Cypher) -> TbvResult<Vec<Row>> {
        bolt::run(&self.graph, cypher).await
    }
}
