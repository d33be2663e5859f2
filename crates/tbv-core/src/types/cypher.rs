//! Storage-query text, parameters and the runtime call they were produced for.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Insertion-ordered query parameters.
pub type Params = serde_json::Map<String, Value>;

/// A single result row returned by a storage session.
pub type Row = serde_json::Map<String, Value>;

/// Cypher statement together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cypher {
    pub query: String,
    #[serde(default)]
    pub params: Params,
}

impl Cypher {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(query: impl Into<String>, params: Params) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Insert a parameter only when the key is absent. New keys go last.
    pub fn param_if_absent(&mut self, key: &str, value: impl Into<Value>) {
        if !self.params.contains_key(key) {
            self.params.insert(key.to_string(), value.into());
        }
    }
}

impl std::fmt::Display for Cypher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.query)?;
        if !self.params.is_empty() {
            write!(f, " {}", Value::Object(self.params.clone()))?;
        }
        Ok(())
    }
}

/// One top-level operation field invoked at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCall {
    /// Schema field name, e.g. `createPerson`.
    pub field: String,
    /// Alias the caller bound the result to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Caller-supplied parameters.
    #[serde(default)]
    pub params: Params,
}

impl FieldCall {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            alias: None,
            params: Params::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Variable the compiler binds the field's result to.
    pub fn result_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }

    /// Insert a parameter only when the key is absent. New keys go last.
    pub fn param_if_absent(&mut self, key: &str, value: impl Into<Value>) {
        if !self.params.contains_key(key) {
            self.params.insert(key.to_string(), value.into());
        }
    }
}
