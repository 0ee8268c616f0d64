//! Operand classification used by expression fusion.
//!
//! Two read-only predicates decide how the expression builder treats an
//! operand:
//! - [`may_be_tensor`]: could the value be a tensor rather than a scalar or
//!   list? Unknown producers answer yes.
//! - [`is_foldable`]: is the value derived only from constants, so that a
//!   later constant-folding pass will collapse it anyway?

use std::collections::HashSet;

use tracefuse_core::{Error, Graph, OpKind, OperandId, Operator, Parameter, Result};

/// Get the `value` parameter of a `prim::Constant` operator.
pub(crate) fn constant_value(op: &Operator) -> Result<&Parameter> {
    op.param("value").ok_or_else(|| {
        Error::InvalidGraph(format!(
            "Constant operator '{}' has no 'value' parameter",
            op.name
        ))
    })
}

/// Check whether an operand's value may be a tensor.
///
/// Structurally scalar producers (size queries, list construction, scalar
/// extraction, literal constants) answer `false`. Casts and elementwise math
/// inherit the answer from their data inputs. Every other producer answers
/// `true`.
pub fn may_be_tensor(graph: &Graph, operand: OperandId) -> Result<bool> {
    let op = graph.operator(graph.producer(operand)?)?;

    let result = match op.kind() {
        OpKind::Constant => !constant_value(op)?.is_literal(),
        OpKind::ListConstruct | OpKind::Size | OpKind::ScalarImplicit => false,
        OpKind::NumToTensor | OpKind::Int | OpKind::To | OpKind::Detach | OpKind::Unary(_) => {
            may_be_tensor(graph, op.input(0)?)?
        }
        OpKind::Binary(_) | OpKind::Logical(_) => any_may_be_tensor(graph, op, 2)?,
        OpKind::Add | OpKind::Sub | OpKind::Rsub => any_may_be_tensor(graph, op, 3)?,
        OpKind::Input | OpKind::Output | OpKind::Expression | OpKind::Other(_) => true,
    };

    Ok(result)
}

/// `may_be_tensor` over the first `count` inputs of `op`, short-circuiting.
fn any_may_be_tensor(graph: &Graph, op: &Operator, count: usize) -> Result<bool> {
    for index in 0..count {
        if may_be_tensor(graph, op.input(index)?)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Check whether an operand can be folded into a constant.
///
/// An operand is foldable if its name is in `foldable_names`, or if it is not
/// a graph input and every input of its producer is foldable. Producers with
/// no inputs are therefore foldable.
pub fn is_foldable(
    graph: &Graph,
    operand: OperandId,
    foldable_names: &HashSet<String>,
) -> Result<bool> {
    if foldable_names.contains(&graph.operand(operand)?.name) {
        return Ok(true);
    }

    let op = graph.operator(graph.producer(operand)?)?;
    if op.kind() == &OpKind::Input {
        return Ok(false);
    }

    for &input in &op.inputs {
        if !is_foldable(graph, input, foldable_names)? {
            return Ok(false);
        }
    }

    Ok(true)
}
