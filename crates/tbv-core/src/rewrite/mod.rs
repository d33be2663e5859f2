//! Operation rewriting over compiler-generated Cypher.
//!
//! [`VersionedSchema`] wraps the compiled schema's per-field resolvers. The
//! dispatch table is decided once at build time: query fields read the
//! instance valid at `$_version`, `create*` mutations write a new version and
//! maintain version windows, `add*` mutations attach associations to target
//! resources. Every other mutation is rejected.

mod attach;
mod create;
mod read;

pub use attach::AttachRewrite;
pub use create::CreateRewrite;
pub use read::ReadRewrite;

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{MatchPolicy, TbvConfig};
use crate::error::{ErrorCode, TbvError, TbvResult};
use crate::pattern::try_replace_group;
use crate::schema::{strip_type_directive, transform_registry};
use crate::traits::{CompiledField, ResolverKind, SchemaCompiler};
use crate::types::{Cypher, FieldCall, TypeKind, TypeRegistry};

const CREATE_PREFIX: &str = "create";
const ADD_PREFIX: &str = "add";

/// How the output of one field's resolver is rewritten.
#[derive(Debug, Clone)]
pub enum RewritePlan {
    Read(ReadRewrite),
    Create(CreateRewrite),
    Attach(AttachRewrite),
    /// A mutation with no versioning semantics; calls are rejected.
    Unsupported,
}

impl RewritePlan {
    pub fn name(&self) -> &'static str {
        match self {
            RewritePlan::Read(_) => "read",
            RewritePlan::Create(_) => "create",
            RewritePlan::Attach(_) => "attach",
            RewritePlan::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone)]
struct Dispatch {
    field: CompiledField,
    plan: RewritePlan,
}

/// Executable schema whose resolvers emit version-aware Cypher.
#[derive(Debug, Clone)]
pub struct VersionedSchema {
    registry: TypeRegistry,
    config: TbvConfig,
    dispatch: HashMap<String, Dispatch>,
    query_fields: BTreeSet<String>,
    mutation_fields: BTreeSet<String>,
}

impl VersionedSchema {
    /// Transform `registry`, compile it and build the dispatch table.
    pub fn from_registry(
        registry: &TypeRegistry,
        compiler: &dyn SchemaCompiler,
        config: TbvConfig,
    ) -> TbvResult<Self> {
        let transformed = transform_registry(registry, &config)?;
        Self::build(&transformed, compiler, config)
    }

    /// Compile an already transformed registry and build the dispatch table.
    pub fn build(
        registry: &TypeRegistry,
        compiler: &dyn SchemaCompiler,
        config: TbvConfig,
    ) -> TbvResult<Self> {
        let (registry, domain_types) = strip_type_directive(registry, &config.directives.domain);
        let compiled = compiler.compile(&registry)?;

        let mut dispatch = HashMap::new();
        let mut query_fields = BTreeSet::new();
        let mut mutation_fields = BTreeSet::new();

        for field in compiled.queries {
            let type_name = entity_type(&registry, &field)?;
            if config.domain_queries_only && !domain_types.contains(&type_name) {
                debug!(
                    "Dropping query '{}': {} is not a domain type",
                    field.name, type_name
                );
                continue;
            }
            let plan = RewritePlan::Read(ReadRewrite::new(&field.name, &type_name)?);
            query_fields.insert(field.name.clone());
            dispatch.insert(field.name.clone(), Dispatch { field, plan });
        }

        for field in compiled.mutations {
            if dispatch.contains_key(&field.name) {
                warn!(
                    "Mutation '{}' shadowed by a query of the same name",
                    field.name
                );
                continue;
            }
            let plan = mutation_plan(&registry, &field, &config)?;
            mutation_fields.insert(field.name.clone());
            dispatch.insert(field.name.clone(), Dispatch { field, plan });
        }

        info!(
            "Built versioned schema: {} queries, {} mutations",
            query_fields.len(),
            mutation_fields.len()
        );

        Ok(Self {
            registry,
            config,
            dispatch,
            query_fields,
            mutation_fields,
        })
    }

    /// Resolve a call to its version-aware Cypher.
    pub fn resolve(&self, call: &FieldCall) -> TbvResult<Cypher> {
        let entry = self.dispatch.get(&call.field).ok_or_else(|| {
            TbvError::unsupported_operation(&call.field, "not a query or mutation of this schema")
        })?;
        let baseline = || entry.field.resolver.resolve(call);
        let rewritten = match &entry.plan {
            RewritePlan::Read(rewrite) => rewrite.apply(call, baseline()?, &self.config)?,
            RewritePlan::Create(rewrite) => rewrite.apply(call, baseline()?, &self.config)?,
            RewritePlan::Attach(rewrite) => rewrite.apply(call, baseline()?, &self.config)?,
            RewritePlan::Unsupported => {
                return Err(TbvError::unsupported_operation(
                    &call.field,
                    "only create and add mutations are versioned",
                ))
            }
        };

        debug!(
            field = %call.field,
            plan = entry.plan.name(),
            "Rewrote operation: {}",
            rewritten.query
        );
        Ok(rewritten)
    }

    /// The rewrite decided for a field.
    pub fn plan(&self, field: &str) -> Option<&RewritePlan> {
        self.dispatch.get(field).map(|entry| &entry.plan)
    }

    pub fn is_query(&self, field: &str) -> bool {
        self.query_fields.contains(field)
    }

    pub fn is_mutation(&self, field: &str) -> bool {
        self.mutation_fields.contains(field)
    }

    pub fn query_fields(&self) -> &BTreeSet<String> {
        &self.query_fields
    }

    pub fn mutation_fields(&self) -> &BTreeSet<String> {
        &self.mutation_fields
    }

    /// Registry handed to the compiler.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TbvConfig {
        &self.config
    }
}

fn mutation_plan(
    registry: &TypeRegistry,
    field: &CompiledField,
    config: &TbvConfig,
) -> TbvResult<RewritePlan> {
    if field.name.starts_with(CREATE_PREFIX) {
        if field.kind != ResolverKind::Create {
            return Err(resolver_mismatch(field, "create"));
        }
        let type_name = entity_type(registry, field)?;
        return Ok(RewritePlan::Create(CreateRewrite::new(&type_name)));
    }

    if field.name.starts_with(ADD_PREFIX) {
        let ResolverKind::AddRelation { target_type } = &field.kind else {
            return Err(resolver_mismatch(field, "relation-creation"));
        };
        return Ok(RewritePlan::Attach(AttachRewrite::new(target_type, config)?));
    }

    debug!("Mutation '{}' has no versioning rewrite", field.name);
    Ok(RewritePlan::Unsupported)
}

fn resolver_mismatch(field: &CompiledField, expected: &str) -> TbvError {
    TbvError::internal_consistency(
        ErrorCode::IntResolverMismatch,
        format!(
            "resolver of '{}' is {:?}, expected a {} handler",
            field.name, field.kind, expected
        ),
    )
}

/// Bare name of the object type a field returns.
fn entity_type(registry: &TypeRegistry, field: &CompiledField) -> TbvResult<String> {
    let name = field.return_type.base_name();
    match registry.get(name) {
        Some(definition) if definition.kind == TypeKind::Object => Ok(name.to_string()),
        _ => Err(TbvError::internal_consistency(
            ErrorCode::IntUnsupportedReturnType,
            format!(
                "'{}' returns {}, which is not an object type",
                field.name, field.return_type
            ),
        )),
    }
}

/// Replace `group` of the first match of `regex`, applying the match policy
/// when there is none.
pub(crate) fn substitute(
    config: &TbvConfig,
    operation: &str,
    regex: &Regex,
    source: &str,
    group: usize,
    replacement: &str,
) -> TbvResult<Option<String>> {
    match try_replace_group(regex, source, group, 1, replacement) {
        Some(rewritten) => Ok(Some(rewritten)),
        None => unmatched(config, operation, regex.as_str()).map(|_| None),
    }
}

/// Report a pattern that did not match: an error when strict, a warning otherwise.
pub(crate) fn unmatched(config: &TbvConfig, operation: &str, pattern: &str) -> TbvResult<()> {
    match config.match_policy {
        MatchPolicy::Strict => Err(TbvError::pattern_not_found(operation, pattern)),
        MatchPolicy::Lenient => {
            warn!(
                operation,
                pattern, "Rewrite pattern not found, fragment left unversioned"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::traits::CompiledSchema;
    use crate::types::{Directive, FieldDefinition, TypeDefinition, TypeRef};

    struct StubCompiler {
        calls: Arc<AtomicUsize>,
        add_kind: ResolverKind,
    }

    impl StubCompiler {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                add_kind: ResolverKind::AddRelation {
                    target_type: "Movie".to_string(),
                },
            }
        }

        fn field(&self, name: &str, type_name: &str, kind: ResolverKind, query: &str) -> CompiledField {
            let calls = self.calls.clone();
            let query = query.to_string();
            CompiledField::new(
                name,
                TypeRef::named(type_name),
                kind,
                Arc::new(move |call: &FieldCall| -> TbvResult<Cypher> {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Cypher::with_params(query.clone(), call.params.clone()))
                }),
            )
        }
    }

    impl SchemaCompiler for StubCompiler {
        fn compile(&self, registry: &TypeRegistry) -> TbvResult<CompiledSchema> {
            assert!(registry.names_with_directive("domain").is_empty());
            Ok(CompiledSchema {
                queries: vec![
                    self.field(
                        "person",
                        "Person",
                        ResolverKind::Query,
                        "MATCH (person:Person) WHERE person.id = $id RETURN person",
                    ),
                    self.field(
                        "movie",
                        "Movie",
                        ResolverKind::Query,
                        "MATCH (movie:Movie) WHERE movie.id = $id RETURN movie",
                    ),
                ],
                mutations: vec![
                    self.field(
                        "createPerson",
                        "Person",
                        ResolverKind::Create,
                        "CREATE (createPerson:Person { id: $id }) WITH createPerson RETURN createPerson",
                    ),
                    self.field(
                        "addPersonActedIn",
                        "Person",
                        self.add_kind.clone(),
                        "MATCH (from:Person { id: $id }) MATCH (to:Movie { id: $toActedIn }) \
                         MERGE (from)-[:actedIn]->(to) RETURN from",
                    ),
                    self.field("deletePerson", "Person", ResolverKind::Other, "MATCH (n) DELETE n"),
                    self.field("person", "Person", ResolverKind::Other, "RETURN 1"),
                ],
            })
        }
    }

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(
                TypeDefinition::object("Person")
                    .with_directive(Directive::new("domain"))
                    .with_field(FieldDefinition::new("id", TypeRef::named("ID").non_null())),
            )
            .with_type(
                TypeDefinition::object("Movie")
                    .with_field(FieldDefinition::new("id", TypeRef::named("ID").non_null())),
            )
    }

    #[test]
    fn test_dispatch_is_decided_at_build() {
        let schema = VersionedSchema::build(&registry(), &StubCompiler::new(), TbvConfig::default())
            .unwrap();

        assert!(matches!(schema.plan("person"), Some(RewritePlan::Read(_))));
        assert!(matches!(schema.plan("createPerson"), Some(RewritePlan::Create(_))));
        assert!(matches!(schema.plan("addPersonActedIn"), Some(RewritePlan::Attach(_))));
        assert!(matches!(schema.plan("deletePerson"), Some(RewritePlan::Unsupported)));
        assert!(schema.is_query("person"));
        assert!(!schema.is_mutation("person"));
        assert!(schema.registry().names_with_directive("domain").is_empty());
    }

    #[test]
    fn test_resolve_applies_plan() {
        let schema = VersionedSchema::build(&registry(), &StubCompiler::new(), TbvConfig::default())
            .unwrap();
        let read = schema
            .resolve(&FieldCall::new("person").param("id", "ne"))
            .unwrap();
        assert!(read
            .query
            .starts_with("MATCH (_r:Person_R:RESOURCE)<-[_v:VERSION_OF]-(person:Person:INSTANCE) WHERE"));

        let create = schema
            .resolve(&FieldCall::new("createPerson").param("id", "ne"))
            .unwrap();
        assert!(create.query.starts_with("MERGE (_r:Person_R:RESOURCE {id: $id})"));
    }

    #[test]
    fn test_unsupported_mutation_never_reaches_resolver() {
        let compiler = StubCompiler::new();
        let schema = VersionedSchema::build(&registry(), &compiler, TbvConfig::default()).unwrap();

        let err = schema.resolve(&FieldCall::new("deletePerson")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OpUnsupportedMutation);
        assert!(!err.is_fatal());

        let err = schema.resolve(&FieldCall::new("unknownField")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OpUnsupportedMutation);
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_add_with_foreign_resolver_fails_build() {
        let compiler = StubCompiler {
            add_kind: ResolverKind::Other,
            ..StubCompiler::new()
        };
        let err = VersionedSchema::build(&registry(), &compiler, TbvConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntResolverMismatch);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_domain_queries_only() {
        let config = TbvConfig::builder().domain_queries_only(true).build();
        let schema = VersionedSchema::build(&registry(), &StubCompiler::new(), config).unwrap();
        assert_eq!(
            schema.query_fields().iter().collect::<Vec<_>>(),
            vec!["person"]
        );
        assert!(schema.plan("movie").is_none());
    }

    #[test]
    fn test_scalar_return_type_fails_build() {
        struct ScalarCompiler;
        impl SchemaCompiler for ScalarCompiler {
            fn compile(&self, _registry: &TypeRegistry) -> TbvResult<CompiledSchema> {
                Ok(CompiledSchema {
                    queries: vec![CompiledField::new(
                        "version",
                        TypeRef::named("String"),
                        ResolverKind::Query,
                        Arc::new(|_: &FieldCall| -> TbvResult<Cypher> { Ok(Cypher::new("RETURN 1")) }),
                    )],
                    mutations: Vec::new(),
                })
            }
        }
        let err = VersionedSchema::build(&registry(), &ScalarCompiler, TbvConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntUnsupportedReturnType);
    }
}
