//! Schema compiler trait and compiled-schema types.
//!
//! The compiler that turns a registry into per-field Cypher generators is an
//! external collaborator. tbv only needs the field sets of the query and
//! mutation root types, each field's return type, what kind of handler
//! resolves it, and a way to ask that handler for Cypher.

use std::fmt;
use std::sync::Arc;

use crate::error::TbvResult;
use crate::types::{Cypher, FieldCall, TypeRef, TypeRegistry};

/// Produces the baseline Cypher for one top-level field.
pub trait CypherResolver: Send + Sync {
    /// Translate a runtime call into Cypher text and parameters.
    fn resolve(&self, call: &FieldCall) -> TbvResult<Cypher>;
}

impl<F> CypherResolver for F
where
    F: Fn(&FieldCall) -> TbvResult<Cypher> + Send + Sync,
{
    fn resolve(&self, call: &FieldCall) -> TbvResult<Cypher> {
        self(call)
    }
}

/// The kind of handler the compiler generated for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverKind {
    /// Reads entities of the return type.
    Query,
    /// Creates a new entity.
    Create,
    /// Creates an association from an existing entity to existing targets.
    AddRelation {
        /// Bare type name of the association's target entity.
        target_type: String,
    },
    /// Any other handler.
    Other,
}

/// A field of the query or mutation root type.
#[derive(Clone)]
pub struct CompiledField {
    pub name: String,
    pub return_type: TypeRef,
    pub kind: ResolverKind,
    pub resolver: Arc<dyn CypherResolver>,
}

impl CompiledField {
    pub fn new(
        name: impl Into<String>,
        return_type: TypeRef,
        kind: ResolverKind,
        resolver: Arc<dyn CypherResolver>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            kind,
            resolver,
        }
    }
}

impl fmt::Debug for CompiledField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledField")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Executable schema as seen by tbv.
#[derive(Debug, Clone, Default)]
pub struct CompiledSchema {
    pub queries: Vec<CompiledField>,
    pub mutations: Vec<CompiledField>,
}

/// Compiles a type registry into an executable schema.
pub trait SchemaCompiler {
    fn compile(&self, registry: &TypeRegistry) -> TbvResult<CompiledSchema>;
}
