//! Expression fusion for traced computation graphs.
//!
//! Tracing a model injects many scalar helper operators around the real
//! tensor operators: literal constants, shape queries, integer coercions and
//! elementwise arithmetic. This crate collapses maximal chains of those
//! helpers into single `pnnx.Expression` operators holding a compact formula,
//! e.g. `add(int(size(@0,0)),1)`, where `@N` refers to the operator's N-th
//! input.
//!
//! Passes run in stages:
//! 1. **Validation** - Reject cyclic graphs and operators with bad arity
//! 2. **Fusion** - Rewrite helper chains into expression operators
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use tracefuse_compiler::PassPipeline;
//! use tracefuse_core::{Graph, OpKind, Operator, Parameter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = Graph::new();
//! let x = graph.add_operand("x");
//! let mut input = Operator::new(OpKind::Input, "x");
//! input.add_output(x);
//! graph.add_operator(input)?;
//!
//! let c = graph.add_operand("c");
//! let mut constant = Operator::new("prim::Constant", "c");
//! constant.set_param("value", 3i64);
//! constant.add_output(c);
//! graph.add_operator(constant)?;
//!
//! let y = graph.add_operand("y");
//! let mut mul = Operator::new("aten::mul", "mul");
//! mul.add_input(x);
//! mul.add_input(c);
//! mul.add_output(y);
//! let mul_id = graph.add_operator(mul)?;
//!
//! PassPipeline::new(HashSet::new()).run(&mut graph)?;
//!
//! let fused = graph.operator(mul_id)?;
//! assert_eq!(fused.kind(), &OpKind::Expression);
//! assert_eq!(fused.param("expr"), Some(&Parameter::from("mul(@0,3)")));
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod expr_syntax;
pub mod expression;
pub mod passes;

pub use classify::{is_foldable, may_be_tensor};
pub use expression::{ExpressionBuilder, FusedExpression, SlotTable};
pub use passes::{FuseExpressionPass, ValidateGraphPass, topological_order};

// Re-export commonly used types from tracefuse-core
pub use tracefuse_core::{Error, Graph, Pass, Result, Stage};

use std::collections::HashSet;

/// Pass pipeline with pluggable passes.
///
/// Passes run in stage order (Validation → Fusion); within a stage they run
/// in registration order.
pub struct PassPipeline {
    /// All passes to run, ordered by (stage, registration order).
    passes: Vec<Box<dyn Pass>>,
}

impl PassPipeline {
    /// Create a pipeline with the built-in passes.
    ///
    /// The built-in passes are:
    /// - `ValidateGraphPass` (Validation stage)
    /// - `FuseExpressionPass` (Fusion stage), using `foldable_names` as the
    ///   operands constant folding will collapse later
    pub fn new(foldable_names: HashSet<String>) -> Self {
        let mut pipeline = Self::empty();
        pipeline.add_pass(ValidateGraphPass::new());
        pipeline.add_pass(FuseExpressionPass::new(foldable_names));
        pipeline
    }

    /// Create a pipeline with no passes.
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    /// Add a pass to the pipeline.
    ///
    /// The pass will be inserted into the appropriate stage (determined by
    /// `pass.stage()`).
    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Number of registered passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run all passes on `graph` in stage order.
    ///
    /// Returns `true` if any pass changed the graph.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first pass error. Passes that already ran
    /// keep their changes.
    #[tracing::instrument(skip_all, fields(num_operators = graph.operator_count(), num_operands = graph.operand_count()))]
    pub fn run(&mut self, graph: &mut Graph) -> Result<bool> {
        self.passes.sort_by_key(|p| p.stage());

        let mut changed = false;
        for pass in &self.passes {
            let _span =
                tracing::debug_span!("pass", name = pass.name(), stage = ?pass.stage()).entered();
            changed |= pass.run(graph)?;
        }

        Ok(changed)
    }
}

impl Default for PassPipeline {
    fn default() -> Self {
        Self::new(HashSet::new())
    }
}

/// Validate `graph` and fuse its scalar helper chains.
///
/// Returns the number of operators rewritten into expressions.
pub fn fuse_expressions(graph: &mut Graph, foldable_names: HashSet<String>) -> Result<usize> {
    ValidateGraphPass::new().run(graph)?;
    FuseExpressionPass::new(foldable_names).fuse(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingPass {
        stage: Stage,
    }

    impl Pass for CountingPass {
        fn name(&self) -> &str {
            "counting"
        }

        fn stage(&self) -> Stage {
            self.stage
        }

        fn run(&self, graph: &mut Graph) -> Result<bool> {
            // Fails if fusion already ran on a graph containing a constant.
            let fused = graph
                .operators()
                .any(|(_, op)| op.kind() == &tracefuse_core::OpKind::Expression);
            if fused && self.stage == Stage::Validation {
                return Err(Error::InvalidGraph("ran after fusion".to_string()));
            }
            Ok(false)
        }
    }

    fn constant_graph() -> Graph {
        let mut graph = Graph::new();
        let c = graph.add_operand("c");
        let mut op = tracefuse_core::Operator::new("prim::Constant", "c");
        op.set_param("value", 1i64);
        op.add_output(c);
        graph.add_operator(op).unwrap();
        graph
    }

    #[test]
    fn test_pipeline_runs_in_stage_order() {
        let mut graph = constant_graph();
        let mut pipeline = PassPipeline::new(HashSet::new());
        pipeline.add_pass(CountingPass {
            stage: Stage::Validation,
        });
        assert_eq!(pipeline.len(), 3);

        assert!(pipeline.run(&mut graph).unwrap());
    }

    #[test]
    fn test_empty_pipeline() {
        let mut graph = constant_graph();
        let mut pipeline = PassPipeline::empty();
        assert!(pipeline.is_empty());
        assert!(!pipeline.run(&mut graph).unwrap());
    }

    #[test]
    fn test_fuse_expressions_counts() {
        let mut graph = constant_graph();
        assert_eq!(fuse_expressions(&mut graph, HashSet::new()).unwrap(), 1);
        assert_eq!(fuse_expressions(&mut graph, HashSet::new()).unwrap(), 0);
    }
}
