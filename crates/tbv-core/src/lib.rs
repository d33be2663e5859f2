//! tbv-core - Time-based versioning for graph-backed schemas.
//!
//! Entities are stored as a stable resource node plus one instance node per
//! version, linked by version edges carrying a half-open window
//! `[from, to)`. This crate rewrites a schema registry so cross-entity links
//! resolve through those windows, and rewrites the Cypher an external
//! schema compiler generates so reads select the version valid at an instant
//! and creates write a new version while keeping windows contiguous.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tbv_core::{FieldCall, TbvConfig, TypeRegistry, VersionedRunner, VersionedSchema};
//!
//! let registry = TypeRegistry::from_file("schema.yaml")?;
//! let schema = VersionedSchema::from_registry(&registry, &compiler, TbvConfig::default())?;
//! let runner = VersionedRunner::new(Arc::new(schema), session);
//!
//! runner
//!     .run_mutations(vec![FieldCall::new("createPerson").param("id", "ne").param("name", "Neo")])
//!     .await;
//! let rows = runner.run_queries(vec![FieldCall::new("person").param("id", "ne")]).await;
//! ```

pub mod config;
pub mod error;
pub mod pattern;
pub mod rewrite;
pub mod runner;
pub mod schema;
pub mod traits;
pub mod types;
pub mod versioning;

// Re-export commonly used types
pub use config::{DirectiveNames, MatchPolicy, TbvConfig, VersionLabels};
pub use error::{ErrorCode, TbvError, TbvResult};
pub use pattern::replace_group;
pub use rewrite::{RewritePlan, VersionedSchema};
pub use runner::VersionedRunner;
pub use schema::{strip_type_directive, transform_registry, SchemaTransformer};
pub use traits::{
    CompiledField, CompiledSchema, CypherResolver, GraphSession, GraphStoreConfig,
    GraphStoreProvider, ResolverKind, SchemaCompiler,
};
pub use types::{
    Cypher, Directive, FieldCall, FieldDefinition, Params, Row, TypeDefinition, TypeKind, TypeRef,
    TypeRegistry,
};
pub use versioning::{VersionClock, VersionTimeline, VersionWindow};
