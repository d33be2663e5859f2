//! Registry transformation for version-aware field resolution.
//!
//! Link fields are turned into computed fields whose statement walks from
//! the owning instance to the target resource and back down to the target
//! instance valid at the `ver` argument. Every other field pointing at an
//! object or interface type gets an explicit relation directive named after
//! the field, so association edges created by mutations use the same type
//! the link traversal follows.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::TbvConfig;
use crate::error::{ErrorCode, TbvError, TbvResult};
use crate::types::{
    is_valid_name, Directive, FieldDefinition, InputValue, ResolvedType, TypeDefinition, TypeKind,
    TypeRef, TypeRegistry,
};

/// Rewrites schema registries for time-based versioning.
#[derive(Debug, Clone)]
pub struct SchemaTransformer {
    config: TbvConfig,
}

impl SchemaTransformer {
    pub fn new(config: TbvConfig) -> Self {
        Self { config }
    }

    /// Return a transformed copy of `source`.
    ///
    /// The source registry is left untouched. Object types without a changed
    /// field are shared with the source rather than copied.
    pub fn transform(&self, source: &TypeRegistry) -> TbvResult<TypeRegistry> {
        let mut transformed = source.clone();

        for definition in source.object_types() {
            check_names(definition)?;
            let mut changed = false;
            let mut fields = Vec::with_capacity(definition.fields.len());

            for field in &definition.fields {
                match self.transform_field(source, definition, field)? {
                    Some(rewritten) => {
                        changed = true;
                        fields.push(rewritten);
                    }
                    None => fields.push(field.clone()),
                }
            }

            if changed {
                let rewritten = TypeDefinition {
                    fields,
                    ..TypeDefinition::clone(definition)
                };
                transformed.add_shared(Arc::new(rewritten));
            }
        }

        Ok(transformed)
    }

    fn transform_field(
        &self,
        registry: &TypeRegistry,
        owner: &TypeDefinition,
        field: &FieldDefinition,
    ) -> TbvResult<Option<FieldDefinition>> {
        if field.has_directive(&self.config.directives.link) {
            return self.transform_link_field(owner, field).map(Some);
        }

        match registry.resolve(&field.type_ref) {
            ResolvedType::BuiltinScalar => Ok(None),
            ResolvedType::Undeclared => {
                debug!(
                    "{}.{}: type '{}' is not declared, treating it as a scalar",
                    owner.name,
                    field.name,
                    field.type_ref.base_name()
                );
                Ok(None)
            }
            ResolvedType::Declared(target) => match target.kind {
                TypeKind::Object | TypeKind::Interface => Ok(self.with_relation(field)),
                TypeKind::Scalar | TypeKind::Enum | TypeKind::Union | TypeKind::InputObject => {
                    Ok(None)
                }
                TypeKind::Unknown => Err(TbvError::internal_consistency(
                    ErrorCode::IntUnknownTypeKind,
                    format!(
                        "{}.{} targets '{}' whose definition kind is not recognized",
                        owner.name, field.name, target.name
                    ),
                )),
            },
        }
    }

    fn transform_link_field(
        &self,
        owner: &TypeDefinition,
        field: &FieldDefinition,
    ) -> TbvResult<FieldDefinition> {
        let target_type = if field.type_ref.is_list() {
            field
                .type_ref
                .list_element()
                .and_then(TypeRef::as_named)
                .ok_or_else(|| {
                    TbvError::schema_validation(
                        &owner.name,
                        &field.name,
                        format!(
                            "list element of link field type {} is not a named type",
                            field.type_ref
                        ),
                    )
                })?
        } else {
            field.type_ref.base_name()
        };

        let statement = self.link_statement(&field.name, target_type);
        debug!(
            "{}.{}: resolving link to {} through version edges",
            owner.name, field.name, target_type
        );

        let directives = &self.config.directives;
        let mut rewritten = field.clone();
        for directive in rewritten.directives.iter_mut() {
            if directive.name == directives.link {
                *directive =
                    Directive::new(&directives.cypher).with_argument("statement", statement.as_str());
            }
        }
        set_relation(&mut rewritten, &directives.relation);

        let version_argument = &self.config.version_argument;
        rewritten.arguments.retain(|a| &a.name != version_argument);
        rewritten.arguments.push(InputValue::new(
            version_argument,
            TypeRef::named(&self.config.version_argument_type),
        ));

        Ok(rewritten)
    }

    /// Traversal statement resolving a link field to the target instance
    /// valid at the version argument.
    pub fn link_statement(&self, relation: &str, target_type: &str) -> String {
        let labels = &self.config.labels;
        let ver = &self.config.version_argument;
        format!(
            "MATCH (this)-[:{relation}]->(:{resource})<-[v:{edge}]-(n:{instance}) \
             WHERE v.from <= ${ver} AND coalesce(${ver} < v.to, true) RETURN n",
            relation = relation,
            resource = labels.resource_labels(target_type),
            edge = labels.version_edge,
            instance = labels.instance_labels(target_type),
            ver = ver,
        )
    }

    fn with_relation(&self, field: &FieldDefinition) -> Option<FieldDefinition> {
        let relation = &self.config.directives.relation;
        let already_named = field
            .directives
            .iter()
            .filter(|d| &d.name == relation)
            .all(|d| d.argument_str("name") == Some(field.name.as_str()));
        if field.has_directive(relation) && already_named {
            return None;
        }

        let mut rewritten = field.clone();
        set_relation(&mut rewritten, relation);
        Some(rewritten)
    }
}

/// Type and field names end up unquoted in Cypher labels and relationship types.
fn check_names(definition: &TypeDefinition) -> TbvResult<()> {
    if !is_valid_name(&definition.name) {
        return Err(TbvError::invalid_name(&definition.name, ""));
    }
    match definition.fields.iter().find(|f| !is_valid_name(&f.name)) {
        Some(field) => Err(TbvError::invalid_name(&definition.name, &field.name)),
        None => Ok(()),
    }
}

/// Make the field carry exactly one relation directive, named after the field.
fn set_relation(field: &mut FieldDefinition, relation: &str) {
    let directive = Directive::new(relation).with_argument("name", field.name.as_str());
    match field.directives.iter().position(|d| d.name == relation) {
        Some(index) => {
            field.directives[index] = directive;
            let mut seen = false;
            field.directives.retain(|d| {
                if d.name != relation {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        None => field.directives.push(directive),
    }
}

/// Transform `source` with the given configuration.
pub fn transform_registry(source: &TypeRegistry, config: &TbvConfig) -> TbvResult<TypeRegistry> {
    SchemaTransformer::new(config.clone()).transform(source)
}

/// Remove a type-level directive the compiler does not understand.
///
/// Returns the stripped copy and the names of the types that carried it.
pub fn strip_type_directive(
    source: &TypeRegistry,
    directive: &str,
) -> (TypeRegistry, BTreeSet<String>) {
    let marked = source.names_with_directive(directive);
    let mut stripped = source.clone();
    for name in &marked {
        if let Some(definition) = source.get(name) {
            let mut definition = TypeDefinition::clone(definition);
            definition.directives.retain(|d| d.name != directive);
            stripped.add(definition);
        }
    }
    (stripped, marked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_movie() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(
                TypeDefinition::object("Person")
                    .with_field(FieldDefinition::new("id", TypeRef::named("ID").non_null()))
                    .with_field(FieldDefinition::new("name", TypeRef::named("String")))
                    .with_field(
                        FieldDefinition::new("address", TypeRef::named("Address"))
                            .with_directive(Directive::new("relation").with_argument("name", "ADDRESS")),
                    )
                    .with_field(FieldDefinition::new("born", TypeRef::named("_Neo4jDate")))
                    .with_field(
                        FieldDefinition::new("actedIn", TypeRef::named("Movie").list())
                            .with_directive(Directive::new("link"))
                            .with_directive(Directive::new("relation").with_argument("name", "ACTED_IN")),
                    ),
            )
            .with_type(
                TypeDefinition::object("Movie")
                    .with_field(FieldDefinition::new("id", TypeRef::named("ID").non_null()))
                    .with_field(FieldDefinition::new("title", TypeRef::named("String"))),
            )
            .with_type(
                TypeDefinition::object("Address")
                    .with_field(FieldDefinition::new("street", TypeRef::named("String"))),
            )
    }

    #[test]
    fn test_link_field_becomes_computed_field() {
        let transformed = transform_registry(&person_movie(), &TbvConfig::default()).unwrap();
        let field = transformed.get("Person").unwrap().field("actedIn").unwrap().clone();

        assert!(!field.has_directive("link"));
        let cypher = field.directive("cypher").unwrap();
        assert_eq!(
            cypher.argument_str("statement").unwrap(),
            "MATCH (this)-[:actedIn]->(:Movie_R:RESOURCE)<-[v:VERSION_OF]-(n:Movie:INSTANCE) \
             WHERE v.from <= $ver AND coalesce($ver < v.to, true) RETURN n"
        );
        assert_eq!(
            field.directive("relation").unwrap().argument_str("name"),
            Some("actedIn")
        );
        let ver = field.argument("ver").unwrap();
        assert_eq!(ver.type_ref, TypeRef::named("String"));
    }

    #[test]
    fn test_object_fields_get_relation_named_after_field() {
        let transformed = transform_registry(&person_movie(), &TbvConfig::default()).unwrap();
        let address = transformed.get("Person").unwrap().field("address").unwrap().clone();
        let relations: Vec<_> = address
            .directives
            .iter()
            .filter(|d| d.name == "relation")
            .collect();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].argument_str("name"), Some("address"));
    }

    #[test]
    fn test_scalars_and_undeclared_types_untouched() {
        let source = person_movie();
        let transformed = transform_registry(&source, &TbvConfig::default()).unwrap();
        let person = transformed.get("Person").unwrap();
        let original = source.get("Person").unwrap();
        assert_eq!(person.field("name"), original.field("name"));
        assert_eq!(person.field("born"), original.field("born"));
    }

    #[test]
    fn test_relation_injected_by_target_kind() {
        let source = TypeRegistry::new()
            .with_type(
                TypeDefinition::object("Person")
                    .with_field(FieldDefinition::new("friend", TypeRef::named("Person")))
                    .with_field(FieldDefinition::new("pet", TypeRef::named("Animal").list()))
                    .with_field(FieldDefinition::new("credit", TypeRef::named("Work")))
                    .with_field(FieldDefinition::new("mood", TypeRef::named("Mood").non_null()))
                    .with_field(FieldDefinition::new("filter", TypeRef::named("PersonFilter")))
                    .with_field(FieldDefinition::new("born", TypeRef::named("DateTime"))),
            )
            .with_type(TypeDefinition::new("Animal", TypeKind::Interface))
            .with_type(TypeDefinition::new("Work", TypeKind::Union))
            .with_type(TypeDefinition::new("Mood", TypeKind::Enum))
            .with_type(TypeDefinition::new("PersonFilter", TypeKind::InputObject))
            .with_type(TypeDefinition::new("DateTime", TypeKind::Scalar));

        let transformed = transform_registry(&source, &TbvConfig::default()).unwrap();
        let person = transformed.get("Person").unwrap();
        let relation = |field: &str| {
            person
                .field(field)
                .and_then(|f| f.directive("relation"))
                .and_then(|d| d.argument_str("name"))
                .map(str::to_string)
        };

        assert_eq!(relation("friend").as_deref(), Some("friend"));
        assert_eq!(relation("pet").as_deref(), Some("pet"));
        for unchanged in ["credit", "mood", "filter", "born"] {
            assert_eq!(relation(unchanged), None, "{unchanged}");
            assert_eq!(
                person.field(unchanged),
                source.get("Person").unwrap().field(unchanged)
            );
        }
    }

    #[test]
    fn test_source_not_mutated_and_untouched_types_shared() {
        let source = person_movie();
        let before = source.clone();
        let transformed = transform_registry(&source, &TbvConfig::default()).unwrap();

        assert_eq!(source, before);
        assert!(Arc::ptr_eq(
            source.get("Movie").unwrap(),
            transformed.get("Movie").unwrap()
        ));
        assert!(!Arc::ptr_eq(
            source.get("Person").unwrap(),
            transformed.get("Person").unwrap()
        ));
    }

    #[test]
    fn test_nested_list_link_is_rejected() {
        let source = TypeRegistry::new()
            .with_type(
                TypeDefinition::object("Person").with_field(
                    FieldDefinition::new("grid", TypeRef::named("Movie").list().list())
                        .with_directive(Directive::new("link")),
                ),
            )
            .with_type(TypeDefinition::object("Movie"));

        let err = transform_registry(&source, &TbvConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchNestedListTarget);
        assert!(err.to_string().contains("Person.grid"));
    }

    #[test]
    fn test_unknown_kind_is_internal_error() {
        let source = TypeRegistry::new()
            .with_type(
                TypeDefinition::object("Person")
                    .with_field(FieldDefinition::new("shape", TypeRef::named("Shape"))),
            )
            .with_type(TypeDefinition::new("Shape", TypeKind::Unknown));

        let err = transform_registry(&source, &TbvConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntUnknownTypeKind);
    }

    #[test]
    fn test_name_that_breaks_cypher_is_rejected() {
        let source = person_movie().with_type(
            TypeDefinition::object("Movie")
                .with_field(FieldDefinition::new("id", TypeRef::named("ID")))
                .with_field(FieldDefinition::new("x]->(y", TypeRef::named("Person"))),
        );
        let err = transform_registry(&source, &TbvConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchInvalidName);
        assert!(err.to_string().contains("Movie.x]->(y"));
    }

    #[test]
    fn test_second_pass_is_stable() {
        let config = TbvConfig::default();
        let once = transform_registry(&person_movie(), &config).unwrap();
        let twice = transform_registry(&once, &config).unwrap();
        assert_eq!(once, twice);
        for definition in once.types() {
            assert!(Arc::ptr_eq(definition, twice.get(&definition.name).unwrap()));
        }
    }

    #[test]
    fn test_strip_type_directive() {
        let source = person_movie().with_type(
            TypeDefinition::object("Dataset").with_directive(Directive::new("domain")),
        );
        let (stripped, marked) = strip_type_directive(&source, "domain");

        assert_eq!(marked.into_iter().collect::<Vec<_>>(), vec!["Dataset".to_string()]);
        assert!(!stripped.get("Dataset").unwrap().has_directive("domain"));
        assert!(source.get("Dataset").unwrap().has_directive("domain"));
    }
}
