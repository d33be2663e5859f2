//! Storage session trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TbvResult;
use crate::types::{Cypher, Row};

/// A session against the graph storage engine.
///
/// Each `run` call is expected to execute as one atomic statement.
#[async_trait]
pub trait GraphSession: Send + Sync {
    /// Execute a statement and collect its rows.
    async fn run(&self, cypher: &Cypher) -> TbvResult<Vec<Row>>;
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Provider type.
    pub provider: GraphStoreProvider,
    /// Connection URL.
    pub url: String,
    /// Username for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Database name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            provider: GraphStoreProvider::Neo4j,
            url: "bolt://localhost:7687".to_string(),
            username: None,
            password: None,
            database: None,
        }
    }
}

/// Graph store provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GraphStoreProvider {
    #[default]
    Neo4j,
    Memgraph,
    /// Records statements in memory instead of executing them.
    Recording,
}
