//! Expression fusion pass.
//!
//! Collapses chains of scalar helper operators injected by tracing
//! (constants, size queries, casts, elementwise math) into single
//! `pnnx.Expression` operators carrying the chain as formula text.

use std::collections::HashSet;

use tracefuse_core::{Graph, OpKind, Operator, OperatorId, Parameter, Pass, Result, Stage};

use crate::expression::{ExpressionBuilder, FusedExpression};

/// Default prefix for the names of rewritten operators.
pub const DEFAULT_NAME_PREFIX: &str = "expr_";

/// Pass that fuses scalar helper chains into expression operators.
///
/// Repeatedly scans the program from the end and rewrites the last fusable
/// operator in place:
/// 1. Builds the expression for its first output
/// 2. Detaches it from its old inputs and attaches it to the expression's
///    external inputs, in slot order
/// 3. Renames it, changes its kind to `pnnx.Expression`, and replaces its
///    parameters and attributes with a single `expr` parameter
///
/// Constants holding a tensor or list are skipped and stay constants.
///
/// The output operand keeps its identity, so downstream consumers are
/// untouched. Operators that only fed the fused chain are left without
/// consumers for a later cleanup pass.
pub struct FuseExpressionPass {
    /// Operand names that constant folding will collapse later.
    foldable_names: HashSet<String>,

    name_prefix: String,
}

impl FuseExpressionPass {
    /// Create a new expression fusion pass.
    pub fn new(foldable_names: HashSet<String>) -> Self {
        Self {
            foldable_names,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }

    /// Set the prefix used to name fused operators (`<prefix>0`, `<prefix>1`, ...).
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Fuse every fusable operator in the graph.
    ///
    /// Returns the number of operators rewritten. Each rewrite removes one
    /// fusable operator, so the loop ends after at most that many scans.
    pub fn fuse(&self, graph: &mut Graph) -> Result<usize> {
        let mut fused = 0;

        while let Some(op_id) = last_fusable(graph) {
            self.rewrite(graph, op_id, fused)?;
            fused += 1;
        }

        Ok(fused)
    }

    fn rewrite(&self, graph: &mut Graph, op_id: OperatorId, index: usize) -> Result<()> {
        let op = graph.operator(op_id)?;
        let FusedExpression { expr, inputs } =
            ExpressionBuilder::new(graph, &self.foldable_names).build(op.output(0)?)?;

        let name = format!("{}{}", self.name_prefix, index);
        tracing::debug!(
            operator = %op.name,
            kind = %op.kind(),
            fused_name = %name,
            %expr,
            num_inputs = inputs.len(),
            "fused expression"
        );

        graph.replace_inputs(op_id, inputs)?;

        let op = graph.operator_mut(op_id)?;
        op.kind = OpKind::Expression;
        op.name = name;
        op.params.clear();
        op.attrs.clear();
        op.set_param("expr", expr);

        Ok(())
    }
}

/// Find the rewritable operator closest to the end of the program.
fn last_fusable(graph: &Graph) -> Option<OperatorId> {
    graph
        .operators()
        .rev()
        .find(|(_, op)| is_rewritable(op))
        .map(|(id, _)| id)
}

/// Check whether an operator can be rewritten into an expression.
///
/// A constant holding a tensor or list has no inline form; rewritten on its
/// own it would read its own output, so it is left in place and referenced
/// by slot from its consumers.
fn is_rewritable(op: &Operator) -> bool {
    match op.kind() {
        OpKind::Constant => op.param("value").is_none_or(Parameter::is_literal),
        kind => kind.is_fusable(),
    }
}

impl Pass for FuseExpressionPass {
    fn name(&self) -> &str {
        "fuse_expression"
    }

    fn stage(&self) -> Stage {
        Stage::Fusion
    }

    fn run(&self, graph: &mut Graph) -> Result<bool> {
        let fused = self.fuse(graph)?;
        tracing::info!(fused, "expression fusion complete");
        Ok(fused > 0)
    }
}
