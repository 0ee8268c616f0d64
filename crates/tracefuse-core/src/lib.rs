//! Core intermediate representation and pass abstractions for traced graphs.
//!
//! This crate provides the foundational types the graph passes operate on:
//! - Arena-backed graph IR (`Graph`, `Operator`, `Operand`)
//! - Operator kind enumeration (`OpKind`) shared by every pass
//! - Parameter and attribute value model (`Parameter`, `Attribute`)
//! - Pass trait and stages (`Pass`, `Stage`)

pub mod ir;
pub mod operator;
pub mod pass;
pub mod types;

// Re-export commonly used types
pub use ir::{Graph, Operand, OperandId, Operator, OperatorId};
pub use operator::{Arity, BinaryOp, LogicalOp, OpKind, UnaryOp};
pub use pass::{Pass, Stage};
pub use types::{Attribute, DataType, Parameter, ParameterKind};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tracefuse operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Arity error: {0}")]
    Arity(String),

    #[error("Cycle detected: {0}")]
    Cycle(String),
}
