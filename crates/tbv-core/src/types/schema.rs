//! Type-definition registry.
//!
//! An owned model of a parsed schema document. Definitions are held behind
//! `Arc` so a transformed copy of a registry shares every type it does not
//! change with its source.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{TbvError, TbvResult};

/// Scalars every schema understands without declaring them.
pub const BUILTIN_SCALARS: &[&str] = &["ID", "String", "Int", "Float", "Boolean"];

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").unwrap());

/// Whether `name` is a schema name, usable unquoted as a Cypher label,
/// relationship type or variable.
pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

/// Reference to a type from a field or argument declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// A bare type name.
    Named(String),
    /// `[T]`
    List(Box<TypeRef>),
    /// `T!`
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Wrap this type in a list.
    pub fn list(self) -> Self {
        Self::List(Box::new(self))
    }

    /// Wrap this type in a non-null marker.
    pub fn non_null(self) -> Self {
        Self::NonNull(Box::new(self))
    }

    /// The innermost type name, with every wrapper removed.
    pub fn base_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.base_name(),
        }
    }

    fn strip_non_null(&self) -> &TypeRef {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }

    /// Whether the type is a list, ignoring an outer non-null marker.
    pub fn is_list(&self) -> bool {
        matches!(self.strip_non_null(), Self::List(_))
    }

    /// For a list type, the element type with its non-null marker removed.
    ///
    /// Returns `None` when the type is not a list.
    pub fn list_element(&self) -> Option<&TypeRef> {
        match self.strip_non_null() {
            Self::List(inner) => Some(inner.strip_non_null()),
            _ => None,
        }
    }

    /// The name of a simple `T` or `T!` reference.
    pub fn as_named(&self) -> Option<&str> {
        match self.strip_non_null() {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::List(inner) => write!(f, "[{}]", inner),
            Self::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// Value of a directive argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectiveValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl From<&str> for DirectiveValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DirectiveValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A directive applied to a type or field, e.g. `@relation(name: "ACTED_IN")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, DirectiveValue>,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<DirectiveValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// String value of an argument, if present and a string.
    pub fn argument_str(&self, name: &str) -> Option<&str> {
        match self.arguments.get(name) {
            Some(DirectiveValue::String(value)) => Some(value),
            _ => None,
        }
    }
}

/// An argument declared on a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValue {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<Directive>,
}

impl InputValue {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            directives: Vec::new(),
        }
    }
}

/// A field declared on an object, interface or input type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<InputValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<Directive>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            arguments: Vec::new(),
            directives: Vec::new(),
        }
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn with_argument(mut self, argument: InputValue) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn directive(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directive(name).is_some()
    }

    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// Kind of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Enum,
    Scalar,
    InputObject,
    /// A kind this engine does not know how to treat.
    #[serde(other)]
    Unknown,
}

/// A named type declared in a schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<Directive>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            directives: Vec::new(),
        }
    }

    /// Shorthand for an object type.
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Object)
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.iter().any(|d| d.name == name)
    }
}

/// What a type reference resolves to within a registry.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedType<'a> {
    /// One of [`BUILTIN_SCALARS`].
    BuiltinScalar,
    /// A type declared in the registry.
    Declared(&'a TypeDefinition),
    /// A name the registry does not declare.
    Undeclared,
}

/// Registry of named type definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RegistryDocument", into = "RegistryDocument")]
pub struct TypeRegistry {
    types: BTreeMap<String, Arc<TypeDefinition>>,
}

/// On-disk shape of a registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    types: Vec<TypeDefinition>,
}

impl From<RegistryDocument> for TypeRegistry {
    fn from(doc: RegistryDocument) -> Self {
        doc.types.into_iter().collect()
    }
}

impl From<TypeRegistry> for RegistryDocument {
    fn from(registry: TypeRegistry) -> Self {
        Self {
            types: registry
                .types
                .into_values()
                .map(|t| Arc::try_unwrap(t).unwrap_or_else(|shared| (*shared).clone()))
                .collect(),
        }
    }
}

impl FromIterator<TypeDefinition> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = TypeDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for definition in iter {
            registry.add(definition);
        }
        registry
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a type definition.
    pub fn add(&mut self, definition: TypeDefinition) {
        self.types
            .insert(definition.name.clone(), Arc::new(definition));
    }

    /// Add or replace a shared type definition.
    pub fn add_shared(&mut self, definition: Arc<TypeDefinition>) {
        self.types.insert(definition.name.clone(), definition);
    }

    /// Builder-style [`add`](Self::add).
    pub fn with_type(mut self, definition: TypeDefinition) -> Self {
        self.add(definition);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<TypeDefinition>> {
        self.types.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDefinition>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All definitions, ordered by name.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDefinition>> {
        self.types.values()
    }

    /// Object type definitions, ordered by name.
    pub fn object_types(&self) -> impl Iterator<Item = &Arc<TypeDefinition>> {
        self.types.values().filter(|t| t.kind == TypeKind::Object)
    }

    /// Names of object types carrying the given type directive.
    pub fn names_with_directive(&self, directive: &str) -> BTreeSet<String> {
        self.object_types()
            .filter(|t| t.has_directive(directive))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Resolve a type reference to its base definition.
    pub fn resolve(&self, type_ref: &TypeRef) -> ResolvedType<'_> {
        let name = type_ref.base_name();
        if let Some(definition) = self.types.get(name) {
            ResolvedType::Declared(definition)
        } else if BUILTIN_SCALARS.contains(&name) {
            ResolvedType::BuiltinScalar
        } else {
            ResolvedType::Undeclared
        }
    }

    /// Parse a registry from a JSON document.
    pub fn from_json(content: &str) -> TbvResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a registry from a YAML document.
    pub fn from_yaml(content: &str) -> TbvResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a registry from a TOML document.
    pub fn from_toml(content: &str) -> TbvResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a registry from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> TbvResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            Some("yaml" | "yml") => Self::from_yaml(&content),
            _ => Err(TbvError::Configuration(
                "Unsupported registry file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }
}
