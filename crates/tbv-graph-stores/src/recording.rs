//! In-memory session that records statements instead of executing them.
//!
//! Useful for inspecting the Cypher a run would submit, and as a test double
//! with scripted result rows.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use tbv_core::error::TbvResult;
use tbv_core::traits::{GraphSession, GraphStoreConfig};
use tbv_core::types::{Cypher, Row};

/// Records every submitted statement; answers with scripted rows in order.
#[derive(Default, Clone)]
pub struct RecordingSession {
    statements: Arc<RwLock<Vec<Cypher>>>,
    responses: Arc<RwLock<VecDeque<Vec<Row>>>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recording session. The connection settings are ignored.
    pub async fn from_config(_config: GraphStoreConfig) -> TbvResult<Self> {
        Ok(Self::new())
    }

    /// Queue the rows returned by the next unanswered statement.
    pub async fn respond_with(&self, rows: Vec<Row>) {
        self.responses.write().await.push_back(rows);
    }

    /// Statements submitted so far, in order.
    pub async fn statements(&self) -> Vec<Cypher> {
        self.statements.read().await.clone()
    }

    pub async fn clear(&self) {
        self.statements.write().await.clear();
        self.responses.write().await.clear();
    }
}

#[async_trait]
impl GraphSession for RecordingSession {
    async fn run(&self, cypher: &Cypher) -> TbvResult<Vec<Row>> {
        self.statements.write().await.push(cypher.clone());
        let rows = self.responses.write().await.pop_front().unwrap_or_default();
        tracing::debug!("Recorded statement, answering with {} rows", rows.len());
        Ok(rows)
    }
}
