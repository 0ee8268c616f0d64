//! Graph passes for validation and expression fusion.

mod fuse_expression;
mod validate;

pub use fuse_expression::{DEFAULT_NAME_PREFIX, FuseExpressionPass};
pub use validate::{ValidateGraphPass, topological_order};
