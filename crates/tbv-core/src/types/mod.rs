//! Core types for tbv.

mod cypher;
mod schema;

pub use cypher::*;
pub use schema::*;
