//! Configuration system for tbv.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{TbvError, TbvResult};
use crate::traits::{GraphStoreConfig, GraphStoreProvider};

/// Labels and relationship types of the versioned storage layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionLabels {
    /// Appended to the entity kind to form the resource kind label.
    pub resource_suffix: String,
    /// Generic marker on every resource node.
    pub resource: String,
    /// Generic marker on every instance node.
    pub instance: String,
    /// Relationship type of version edges.
    pub version_edge: String,
    /// Marker on embedded value nodes.
    pub embedded: String,
}

impl Default for VersionLabels {
    fn default() -> Self {
        Self {
            resource_suffix: "_R".to_string(),
            resource: "RESOURCE".to_string(),
            instance: "INSTANCE".to_string(),
            version_edge: "VERSION_OF".to_string(),
            embedded: "EMBEDDED".to_string(),
        }
    }
}

impl VersionLabels {
    /// Label pair of a resource node, e.g. `Person_R:RESOURCE`.
    pub fn resource_labels(&self, type_name: &str) -> String {
        format!("{}{}:{}", type_name, self.resource_suffix, self.resource)
    }

    /// Label pair of an instance node, e.g. `Person:INSTANCE`.
    pub fn instance_labels(&self, type_name: &str) -> String {
        format!("{}:{}", type_name, self.instance)
    }
}

/// Names of the schema directives tbv reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectiveNames {
    /// Marks a field resolved through version resolution.
    pub link: String,
    /// Computed field; carries a `statement` argument.
    pub cypher: String,
    /// Named association; carries a `name` argument.
    pub relation: String,
    /// Marks a type whose queries are exposed.
    pub domain: String,
}

impl Default for DirectiveNames {
    fn default() -> Self {
        Self {
            link: "link".to_string(),
            cypher: "cypher".to_string(),
            relation: "relation".to_string(),
            domain: "domain".to_string(),
        }
    }
}

/// What to do when a rewrite pattern is not found in compiler output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Leave the fragment unchanged and log a warning.
    #[default]
    Lenient,
    /// Fail the operation.
    Strict,
}

/// Main tbv configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TbvConfig {
    /// Storage layout labels.
    pub labels: VersionLabels,
    /// Directive names.
    pub directives: DirectiveNames,
    /// Argument added to link fields.
    pub version_argument: String,
    /// Declared type of the version argument.
    pub version_argument_type: String,
    /// Query parameter carrying the version instant.
    pub version_param: String,
    /// Non-match handling for rewrite patterns.
    pub match_policy: MatchPolicy,
    /// Only expose queries for types carrying the domain directive.
    pub domain_queries_only: bool,
    /// Seconds between a run's write instant and its read instant.
    pub read_offset_secs: i64,
    /// Serialize create mutations per resource within this process.
    pub serialize_writes: bool,
    /// Graph store configuration (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_store: Option<GraphStoreConfig>,
}

impl Default for TbvConfig {
    fn default() -> Self {
        Self {
            labels: VersionLabels::default(),
            directives: DirectiveNames::default(),
            version_argument: "ver".to_string(),
            version_argument_type: "String".to_string(),
            version_param: "_version".to_string(),
            match_policy: MatchPolicy::Lenient,
            domain_queries_only: false,
            read_offset_secs: 1,
            serialize_writes: true,
            graph_store: None,
        }
    }
}

impl TbvConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> TbvResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| TbvError::Configuration(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| TbvError::Configuration(e.to_string()))
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| TbvError::Configuration(e.to_string()))
            }
            _ => Err(TbvError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(policy) = std::env::var("TBV_MATCH_POLICY") {
            if let Ok(policy) = policy.to_lowercase().parse() {
                config.match_policy = policy;
            }
        }
        if let Ok(offset) = std::env::var("TBV_READ_OFFSET_SECS") {
            if let Ok(offset) = offset.parse() {
                config.read_offset_secs = offset;
            }
        }
        if let Ok(value) = std::env::var("TBV_DOMAIN_QUERIES_ONLY") {
            config.domain_queries_only = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Ok(value) = std::env::var("TBV_SERIALIZE_WRITES") {
            config.serialize_writes = !matches!(value.as_str(), "0" | "false" | "no");
        }

        // Graph store configuration
        if let Ok(url) = std::env::var("TBV_GRAPH_URL") {
            let provider = match std::env::var("TBV_GRAPH_PROVIDER")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "memgraph" => GraphStoreProvider::Memgraph,
                "recording" => GraphStoreProvider::Recording,
                _ => GraphStoreProvider::Neo4j,
            };
            config.graph_store = Some(GraphStoreConfig {
                provider,
                url,
                username: std::env::var("TBV_GRAPH_USERNAME").ok(),
                password: std::env::var("TBV_GRAPH_PASSWORD").ok(),
                database: std::env::var("TBV_GRAPH_DATABASE").ok(),
            });
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> TbvConfigBuilder {
        TbvConfigBuilder::default()
    }
}

/// Builder for TbvConfig.
#[derive(Default)]
pub struct TbvConfigBuilder {
    config: TbvConfig,
}

impl TbvConfigBuilder {
    /// Set storage layout labels.
    pub fn labels(mut self, labels: VersionLabels) -> Self {
        self.config.labels = labels;
        self
    }

    /// Set directive names.
    pub fn directives(mut self, directives: DirectiveNames) -> Self {
        self.config.directives = directives;
        self
    }

    /// Set the declared type of the version argument.
    pub fn version_argument_type(mut self, type_name: impl Into<String>) -> Self {
        self.config.version_argument_type = type_name.into();
        self
    }

    /// Set the rewrite non-match policy.
    pub fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.config.match_policy = policy;
        self
    }

    /// Only expose queries for domain types.
    pub fn domain_queries_only(mut self, enabled: bool) -> Self {
        self.config.domain_queries_only = enabled;
        self
    }

    /// Set the read offset in seconds.
    pub fn read_offset_secs(mut self, secs: i64) -> Self {
        self.config.read_offset_secs = secs;
        self
    }

    /// Enable or disable per-resource write serialization.
    pub fn serialize_writes(mut self, enabled: bool) -> Self {
        self.config.serialize_writes = enabled;
        self
    }

    /// Set graph store configuration.
    pub fn graph_store(mut self, config: GraphStoreConfig) -> Self {
        self.config.graph_store = Some(config);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TbvConfig {
        self.config
    }
}
