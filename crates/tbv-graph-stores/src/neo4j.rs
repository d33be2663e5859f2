//! Neo4j session.

use async_trait::async_trait;
use neo4rs::Graph;

use tbv_core::error::TbvResult;
use tbv_core::traits::{GraphSession, GraphStoreConfig};
use tbv_core::types::{Cypher, Row};

use crate::bolt;

/// Session against a Neo4j server over Bolt.
///
/// Every statement runs in its own auto-commit transaction, so a versioned
/// create commits or fails as a whole.
pub struct Neo4jSession {
    graph: Graph,
    #[allow(dead_code)]
    config: GraphStoreConfig,
}

impl Neo4jSession {
    /// Connect to the server named by `config`.
    pub async fn new(config: GraphStoreConfig) -> TbvResult<Self> {
        let graph = bolt::connect(&config, "neo4j", "Neo4j").await?;
        Ok(Self { graph, config })
    }
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(&self, cypher: &Cypher) -> TbvResult<Vec<Row>> {
        bolt::run(&self.graph, cypher).await
    }
}
