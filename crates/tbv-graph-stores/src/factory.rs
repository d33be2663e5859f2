//! Factory for creating graph sessions.

use std::sync::Arc;

use tbv_core::error::{TbvError, TbvResult};
use tbv_core::traits::{GraphSession, GraphStoreConfig, GraphStoreProvider};

use crate::recording::RecordingSession;

/// Factory for creating graph sessions.
pub struct SessionFactory;

impl SessionFactory {
    /// Create a session for the configured provider.
    pub async fn create(config: GraphStoreConfig) -> TbvResult<Arc<dyn GraphSession>> {
        tracing::debug!("Creating {:?} session for {}", config.provider, config.url);
        match config.provider {
            #[cfg(feature = "neo4j")]
            GraphStoreProvider::Neo4j => {
                let session = crate::neo4j::Neo4jSession::new(config).await?;
                Ok(Arc::new(session))
            }

            #[cfg(feature = "memgraph")]
            GraphStoreProvider::Memgraph => {
                let session = crate::memgraph::MemgraphSession::new(config).await?;
                Ok(Arc::new(session))
            }

            GraphStoreProvider::Recording => {
                let session = RecordingSession::from_config(config).await?;
                Ok(Arc::new(session))
            }

            #[allow(unreachable_patterns)]
            provider => Err(TbvError::UnsupportedProvider {
                provider: format!("{:?}", provider),
            }),
        }
    }

    /// Create a Neo4j session.
    #[cfg(feature = "neo4j")]
    pub async fn neo4j(uri: &str, username: &str, password: &str) -> TbvResult<Arc<dyn GraphSession>> {
        let config = GraphStoreConfig {
            provider: GraphStoreProvider::Neo4j,
            url: uri.to_string(),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            database: None,
        };
        Self::create(config).await
    }
}
