//! Structural validation pass.
//!
//! Expression fusion recurses through producers and indexes operator inputs
//! by position, so it relies on an acyclic graph where every recognised
//! operator has the input count its kind expects. This pass checks those
//! assumptions up front and reports the first violation.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracefuse_core::{Error, Graph, OpKind, OperatorId, Pass, Result, Stage};

/// Pass that rejects graphs the fusion stage cannot handle.
///
/// Checks, in order:
/// 1. Producer/consumer links agree with operator inputs and outputs
/// 2. Every operand has a producer
/// 3. Every operator's input count matches its kind's arity, fusable
///    operators have an output, and constants carry a `value` parameter
/// 4. The graph is acyclic
///
/// Never mutates the graph.
pub struct ValidateGraphPass;

impl ValidateGraphPass {
    /// Create a new validation pass.
    pub fn new() -> Self {
        Self
    }

    fn check_operators(&self, graph: &Graph) -> Result<()> {
        for (_, op) in graph.operators() {
            let arity = op.kind().arity();
            if !arity.accepts(op.inputs.len()) {
                return Err(Error::Arity(format!(
                    "Operator '{}' ({}) expects {} inputs, got {}",
                    op.name,
                    op.kind(),
                    arity,
                    op.inputs.len()
                )));
            }

            if op.kind().is_fusable() && op.outputs.is_empty() {
                return Err(Error::InvalidGraph(format!(
                    "Operator '{}' ({}) has no outputs",
                    op.name,
                    op.kind()
                )));
            }

            if op.kind() == &OpKind::Constant && op.param("value").is_none() {
                return Err(Error::InvalidGraph(format!(
                    "Constant operator '{}' has no 'value' parameter",
                    op.name
                )));
            }
        }

        Ok(())
    }
}

impl Default for ValidateGraphPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ValidateGraphPass {
    fn name(&self) -> &str {
        "validate_graph"
    }

    fn stage(&self) -> Stage {
        Stage::Validation
    }

    fn run(&self, graph: &mut Graph) -> Result<bool> {
        graph.check_links()?;

        for (operand_id, _) in graph.operands() {
            graph.producer(operand_id)?;
        }

        self.check_operators(graph)?;
        topological_order(graph)?;

        tracing::debug!(
            num_operators = graph.operator_count(),
            num_operands = graph.operand_count(),
            "graph is valid"
        );

        Ok(false)
    }
}

/// Get the operators in an order where every producer precedes its consumers.
///
/// # Errors
///
/// Returns [`Error::Cycle`] naming one operator on a cycle.
pub fn topological_order(graph: &Graph) -> Result<Vec<OperatorId>> {
    let mut dag: DiGraph<OperatorId, ()> = DiGraph::with_capacity(graph.operator_count(), 0);
    let nodes: Vec<NodeIndex> = graph.operator_ids().map(|id| dag.add_node(id)).collect();

    for (consumer, op) in graph.operators() {
        for &input in &op.inputs {
            let producer = graph.producer(input)?;
            dag.add_edge(nodes[producer.index()], nodes[consumer.index()], ());
        }
    }

    let order = toposort(&dag, None).map_err(|cycle| {
        let id = dag[cycle.node_id()];
        let name = graph
            .operator(id)
            .map(|op| op.name.clone())
            .unwrap_or_default();
        Error::Cycle(format!("Operator '{}' ({:?}) is part of a cycle", name, id))
    })?;

    Ok(order.into_iter().map(|node| dag[node]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracefuse_core::{OperandId, Operator};

    fn add_op(graph: &mut Graph, kind: &str, inputs: &[OperandId], out: &str) -> OperandId {
        let output = graph.add_operand(out);
        let mut op = Operator::new(kind, out);
        for &input in inputs {
            op.add_input(input);
        }
        op.add_output(output);
        graph.add_operator(op).unwrap();
        output
    }

    #[test]
    fn test_valid_graph() {
        let mut graph = Graph::new();
        let x = add_op(&mut graph, "pnnx.Input", &[], "x");
        let y = add_op(&mut graph, "aten::abs", &[x], "y");
        add_op(&mut graph, "aten::neg", &[y], "z");

        let changed = ValidateGraphPass::new().run(&mut graph).unwrap();
        assert!(!changed);
        assert_eq!(
            topological_order(&graph).unwrap(),
            vec![OperatorId(0), OperatorId(1), OperatorId(2)]
        );
    }

    #[test]
    fn test_wrong_arity() {
        let mut graph = Graph::new();
        let x = add_op(&mut graph, "pnnx.Input", &[], "x");
        add_op(&mut graph, "aten::add", &[x, x], "y");

        let err = ValidateGraphPass::new().run(&mut graph).unwrap_err();
        assert!(matches!(err, Error::Arity(_)));
    }

    #[test]
    fn test_constant_without_value() {
        let mut graph = Graph::new();
        add_op(&mut graph, "prim::Constant", &[], "c");

        let err = ValidateGraphPass::new().run(&mut graph).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn test_operand_without_producer() {
        let mut graph = Graph::new();
        graph.add_operand("orphan");

        assert!(ValidateGraphPass::new().run(&mut graph).is_err());
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = Graph::new();
        let x = add_op(&mut graph, "pnnx.Input", &[], "x");
        let a = add_op(&mut graph, "aten::neg", &[x], "a");
        let b = add_op(&mut graph, "aten::abs", &[a], "b");

        // Rewire neg to read from abs, closing a -> b -> a.
        let neg = graph.producer(a).unwrap();
        graph.replace_inputs(neg, vec![b]).unwrap();

        let err = ValidateGraphPass::new().run(&mut graph).unwrap_err();
        assert!(matches!(err, Error::Cycle(_)));
    }
}
