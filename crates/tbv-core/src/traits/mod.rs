//! Collaborator traits: the schema compiler and the storage session.

mod compiler;
mod session;

pub use compiler::*;
pub use session::*;
