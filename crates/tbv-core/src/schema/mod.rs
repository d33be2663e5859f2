//! Schema transformation.

mod transform;

pub use transform::{strip_type_directive, transform_registry, SchemaTransformer};
