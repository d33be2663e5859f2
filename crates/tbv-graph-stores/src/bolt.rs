//! Shared Bolt plumbing for Neo4j-compatible servers.

use neo4rs::{
    query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    ConfigBuilder, Graph,
};
use serde_json::Value;

use tbv_core::error::{TbvError, TbvResult};
use tbv_core::traits::GraphStoreConfig;
use tbv_core::types::{Cypher, Row};

/// Open a connection pool for `config`, using `default_user` when none is set.
pub(crate) async fn connect(
    config: &GraphStoreConfig,
    default_user: &str,
    server: &str,
) -> TbvResult<Graph> {
    let username = config
        .username
        .clone()
        .unwrap_or_else(|| default_user.to_string());
    let password = config.password.clone().unwrap_or_default();

    let mut builder = ConfigBuilder::default()
        .uri(config.url.as_str())
        .user(username.as_str())
        .password(password.as_str());
    if let Some(database) = &config.database {
        builder = builder.db(database.as_str());
    }
    let bolt_config = builder
        .build()
        .map_err(|e| TbvError::graph_connection(format!("Invalid {} configuration", server), e))?;

    let graph = Graph::connect(bolt_config)
        .await
        .map_err(|e| TbvError::graph_connection(format!("Failed to connect to {}", server), e))?;

    tracing::info!("Connected to {} at {}", server, config.url);
    Ok(graph)
}

/// Run one statement in auto-commit mode and collect its rows.
pub(crate) async fn run(graph: &Graph, cypher: &Cypher) -> TbvResult<Vec<Row>> {
    let mut statement = query(&cypher.query);
    for (key, value) in &cypher.params {
        statement = statement.param(key.as_str(), to_bolt(value));
    }

    let mut result = graph
        .execute(statement)
        .await
        .map_err(|e| TbvError::graph_store(format!("Failed to run statement: {}", e)))?;

    let mut rows = Vec::new();
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| TbvError::graph_store(format!("Failed to fetch row: {}", e)))?
    {
        let row: Row = row
            .to()
            .map_err(|e| TbvError::graph_store(format!("Failed to decode row: {}", e)))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Convert a JSON parameter to its Bolt counterpart.
pub(crate) fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or_default())),
        },
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => {
            BoltType::List(BoltList::from(items.iter().map(to_bolt).collect::<Vec<_>>()))
        }
        Value::Object(map) => {
            let mut bolt = BoltMap::new();
            for (key, value) in map {
                bolt.put(BoltString::new(key), to_bolt(value));
            }
            BoltType::Map(bolt)
        }
    }
}
