//! Error types for tbv operations.
//!
//! Every variant carries a stable [`ErrorCode`] so callers can tell schema
//! problems, programming-contract violations and rejected operations apart
//! without matching on message text.

use thiserror::Error;

/// Result type alias for tbv operations.
pub type TbvResult<T> = Result<T, TbvError>;

/// Main error type for all tbv operations.
#[derive(Error, Debug)]
pub enum TbvError {
    /// The schema cannot be transformed as declared.
    #[error("Schema validation error in {type_name}.{field_name}: {message}")]
    SchemaValidation {
        type_name: String,
        field_name: String,
        message: String,
        code: ErrorCode,
    },

    /// A programming contract between the engine and a collaborator was broken.
    #[error("Internal consistency error: {message}")]
    InternalConsistency { message: String, code: ErrorCode },

    /// The operation has no versioning rewrite.
    #[error("Unsupported operation '{operation}': {message}")]
    UnsupportedOperation {
        operation: String,
        message: String,
        code: ErrorCode,
    },

    /// A rewrite pattern did not match the compiler output (strict policy only).
    #[error("Rewrite pattern not found for '{operation}': {pattern}")]
    PatternNotFound {
        operation: String,
        pattern: String,
        code: ErrorCode,
    },

    /// Version windows of a resource overlap or leave gaps.
    #[error("Version invariant violated: {message}")]
    InvariantViolation { message: String, code: ErrorCode },

    /// A version instant is not an RFC 3339 timestamp.
    #[error("Invalid instant '{value}': {message}")]
    InvalidInstant {
        value: String,
        message: String,
        code: ErrorCode,
    },

    /// Graph store operation failed.
    #[error("Graph store error: {message}")]
    GraphStore {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Schema (SCH_xxx)
    SchNestedListTarget,
    SchInvalidName,

    // Operations (OP_xxx)
    OpUnsupportedMutation,

    // Rewrite (RW_xxx)
    RwPatternNotFound,

    // Versioning (VER_xxx)
    VerOverlap,
    VerGap,
    VerMultipleOpen,
    VerInvalidWindow,
    VerInvalidInstant,

    // Graph (GRP_xxx)
    GrpConnectionFailed,
    GrpOperationFailed,

    // Internal
    Internal,
    IntUnknownTypeKind,
    IntResolverMismatch,
    IntUnsupportedReturnType,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SchNestedListTarget => "SCH_001",
            ErrorCode::SchInvalidName => "SCH_002",
            ErrorCode::OpUnsupportedMutation => "OP_001",
            ErrorCode::RwPatternNotFound => "RW_001",
            ErrorCode::VerOverlap => "VER_001",
            ErrorCode::VerGap => "VER_002",
            ErrorCode::VerMultipleOpen => "VER_003",
            ErrorCode::VerInvalidWindow => "VER_004",
            ErrorCode::VerInvalidInstant => "VER_005",
            ErrorCode::GrpConnectionFailed => "GRP_001",
            ErrorCode::GrpOperationFailed => "GRP_002",
            ErrorCode::Internal => "INT_001",
            ErrorCode::IntUnknownTypeKind => "INT_002",
            ErrorCode::IntResolverMismatch => "INT_003",
            ErrorCode::IntUnsupportedReturnType => "INT_004",
        }
    }
}

impl TbvError {
    /// Create a schema validation error for a field.
    pub fn schema_validation(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SchemaValidation {
            type_name: type_name.into(),
            field_name: field_name.into(),
            message: message.into(),
            code: ErrorCode::SchNestedListTarget,
        }
    }

    /// Create an error for a type or field name that cannot be used in Cypher.
    pub fn invalid_name(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::SchemaValidation {
            type_name: type_name.into(),
            field_name: field_name.into(),
            message: "not a valid name".to_string(),
            code: ErrorCode::SchInvalidName,
        }
    }

    /// Create an internal consistency error with a specific code.
    pub fn internal_consistency(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::InternalConsistency {
            message: message.into(),
            code,
        }
    }

    /// Create an unsupported mutation error.
    pub fn unsupported_operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            message: message.into(),
            code: ErrorCode::OpUnsupportedMutation,
        }
    }

    /// Create a pattern-not-found error.
    pub fn pattern_not_found(operation: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::PatternNotFound {
            operation: operation.into(),
            pattern: pattern.into(),
            code: ErrorCode::RwPatternNotFound,
        }
    }

    /// Create a version invariant error.
    pub fn invariant(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
            code,
        }
    }

    /// Create an invalid instant error.
    pub fn invalid_instant(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInstant {
            value: value.into(),
            message: message.into(),
            code: ErrorCode::VerInvalidInstant,
        }
    }

    /// Create a graph store error.
    pub fn graph_store(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpOperationFailed,
            source: None,
        }
    }

    /// Create a graph store connection error.
    pub fn graph_connection(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpConnectionFailed,
            source: Some(Box::new(source)),
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SchemaValidation { code, .. } => *code,
            Self::InternalConsistency { code, .. } => *code,
            Self::UnsupportedOperation { code, .. } => *code,
            Self::PatternNotFound { code, .. } => *code,
            Self::InvariantViolation { code, .. } => *code,
            Self::InvalidInstant { code, .. } => *code,
            Self::GraphStore { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error invalidates the whole schema rather than one call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SchemaValidation { .. } | Self::InternalConsistency { .. }
        )
    }
}

impl From<regex::Error> for TbvError {
    fn from(err: regex::Error) -> Self {
        Self::Internal(format!("invalid rewrite pattern: {}", err))
    }
}

impl From<serde_yaml::Error> for TbvError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<toml::de::Error> for TbvError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
