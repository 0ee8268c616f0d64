//! Common test utilities for expression fusion tests.
//!
//! Provides a small graph builder that mirrors how a tracer emits operators:
//! one operator per call, each producing a single named operand.

#![allow(dead_code)]

use std::collections::HashSet;

pub use tracefuse_compiler::expr_syntax::parse_expr;
pub use tracefuse_core::{Graph, OpKind, OperandId, Operator, OperatorId, Parameter};

/// Initialize a test subscriber so pass logs show up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_test_writer()
        .try_init();
}

/// Graph builder for tests.
#[derive(Default)]
pub struct TestGraph {
    pub graph: Graph,
}

impl TestGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `pnnx.Input` producing `name`.
    pub fn input(&mut self, name: &str) -> OperandId {
        self.op("pnnx.Input", &[], name)
    }

    /// Add a `prim::Constant` producing `name` with the given value.
    pub fn constant(&mut self, name: &str, value: impl Into<Parameter>) -> OperandId {
        let output = self.op("prim::Constant", &[], name);
        let producer = self.graph.producer(output).unwrap();
        self.graph
            .operator_mut(producer)
            .unwrap()
            .set_param("value", value);
        output
    }

    /// Add an operator of `kind` reading `inputs` and producing `name`.
    pub fn op(&mut self, kind: &str, inputs: &[OperandId], name: &str) -> OperandId {
        let output = self.graph.add_operand(name);
        let mut op = Operator::new(kind, name);
        for &input in inputs {
            op.add_input(input);
        }
        op.add_output(output);
        self.graph.add_operator(op).unwrap();
        output
    }

    /// Add a `pnnx.Output` reading `inputs`.
    pub fn output(&mut self, inputs: &[OperandId]) -> OperatorId {
        let mut op = Operator::new(OpKind::Output, "out");
        for &input in inputs {
            op.add_input(input);
        }
        self.graph.add_operator(op).unwrap()
    }

    /// Get the producer of an operand.
    pub fn producer(&self, operand: OperandId) -> OperatorId {
        self.graph.producer(operand).unwrap()
    }

    pub fn finish(self) -> Graph {
        self.graph
    }
}

/// Get the `expr` text of an expression operator.
pub fn expr_of(graph: &Graph, id: OperatorId) -> String {
    let op = graph.operator(id).unwrap();
    assert_eq!(op.kind(), &OpKind::Expression, "operator '{}' was not fused", op.name);
    op.param("expr")
        .and_then(Parameter::as_str)
        .expect("expression operator should carry an expr string")
        .to_string()
}

/// Assert that every expression operator parses, numbers its slots densely
/// and has exactly one input per slot.
pub fn assert_well_formed(graph: &Graph) {
    for (id, op) in graph.operators() {
        if op.kind() != &OpKind::Expression {
            continue;
        }
        let text = expr_of(graph, id);
        let expr = parse_expr(&text).unwrap_or_else(|e| panic!("'{text}' does not parse: {e}"));
        assert!(expr.has_dense_slots(), "'{text}' has sparse slots");
        assert_eq!(expr.slot_count(), op.inputs.len(), "'{text}' slot count");

        let distinct: HashSet<_> = op.inputs.iter().collect();
        assert_eq!(distinct.len(), op.inputs.len(), "'{text}' has duplicate inputs");
    }
}
