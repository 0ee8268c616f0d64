//! Intermediate representation for traced computation graphs.
//!
//! The IR is an arena-backed directed acyclic graph where:
//! - **Operators** (`Operator`) are traced operations (e.g. `aten::mul`)
//! - **Operands** (`Operand`) are named values flowing between operators
//!
//! Every operand has exactly one producer and a list of consumers. Both
//! links are stored as handles into the graph's arenas, so operators and
//! operands are identified by `OperatorId` / `OperandId` rather than by name.

use crate::operator::OpKind;
use crate::types::{Attribute, Parameter};
use crate::{Error, Result};

use std::collections::BTreeMap;
use std::fmt;

/// Handle of an operand within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperandId(pub usize);

impl OperandId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for OperandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Handle of an operator within a [`Graph`].
///
/// Operators are never removed from the arena, so handle order is program
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperatorId(pub usize);

impl OperatorId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

// ──────────────────────────────── Graph ──────────────────────────────────

/// Traced computation graph.
///
/// Owns every operator and operand. Producer and consumer links are kept
/// consistent by the mutation methods on this type; callers should not edit
/// an operator's `inputs` directly once it is in the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    /// Operators in program order.
    operators: Vec<Operator>,

    /// Operand arena.
    operands: Vec<Operand>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Operator access ──

    /// Get an immutable reference to an operator.
    pub fn operator(&self, id: OperatorId) -> Result<&Operator> {
        self.operators
            .get(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Operator {:?} not found", id)))
    }

    /// Get a mutable reference to an operator.
    ///
    /// Changing `inputs` through this reference bypasses consumer
    /// bookkeeping; use [`Graph::replace_inputs`] for that.
    pub fn operator_mut(&mut self, id: OperatorId) -> Result<&mut Operator> {
        self.operators
            .get_mut(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Operator {:?} not found", id)))
    }

    /// Operator handles in program order.
    pub fn operator_ids(&self) -> impl DoubleEndedIterator<Item = OperatorId> + use<> {
        (0..self.operators.len()).map(OperatorId)
    }

    /// Iterate over all operators in program order.
    pub fn operators(&self) -> impl DoubleEndedIterator<Item = (OperatorId, &Operator)> {
        self.operators
            .iter()
            .enumerate()
            .map(|(i, op)| (OperatorId(i), op))
    }

    /// Get the number of operators in the graph.
    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    // ── Operand access ──

    /// Get an immutable reference to an operand.
    pub fn operand(&self, id: OperandId) -> Result<&Operand> {
        self.operands
            .get(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Operand {:?} not found", id)))
    }

    /// Iterate over all operands.
    pub fn operands(&self) -> impl Iterator<Item = (OperandId, &Operand)> {
        self.operands
            .iter()
            .enumerate()
            .map(|(i, operand)| (OperandId(i), operand))
    }

    /// Get the number of operands in the graph.
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Look up the first operand with the given name.
    ///
    /// Names are not guaranteed unique; passes must key on `OperandId`.
    pub fn operand_by_name(&self, name: &str) -> Option<OperandId> {
        self.operands()
            .find(|(_, operand)| operand.name == name)
            .map(|(id, _)| id)
    }

    /// Get the operator producing an operand.
    pub fn producer(&self, id: OperandId) -> Result<OperatorId> {
        let operand = self.operand(id)?;
        operand
            .producer
            .ok_or_else(|| Error::InvalidGraph(format!("Operand '{}' has no producer", operand.name)))
    }

    /// Get the operators consuming an operand, one entry per input slot.
    pub fn consumers(&self, id: OperandId) -> Result<&[OperatorId]> {
        Ok(&self.operand(id)?.consumers)
    }

    // ── Graph mutation ──

    /// Add an operand without a producer and return its ID.
    ///
    /// The operand gets its producer when an operator listing it as an
    /// output is added.
    pub fn add_operand(&mut self, name: impl Into<String>) -> OperandId {
        let id = OperandId(self.operands.len());
        self.operands.push(Operand::new(name.into()));
        id
    }

    /// Append an operator to the program and return its ID.
    ///
    /// Registers the operator as producer of its outputs and as consumer of
    /// its inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if an input or output handle is unknown, or if an
    /// output operand already has a producer.
    pub fn add_operator(&mut self, op: Operator) -> Result<OperatorId> {
        let id = OperatorId(self.operators.len());

        for &input in &op.inputs {
            self.operand(input)?;
        }
        for &output in &op.outputs {
            let operand = self.operand(output)?;
            if let Some(existing) = operand.producer {
                return Err(Error::InvalidGraph(format!(
                    "Operand '{}' already produced by operator {:?}",
                    operand.name, existing
                )));
            }
        }

        for &output in &op.outputs {
            self.operands[output.index()].producer = Some(id);
        }
        for &input in &op.inputs {
            self.operands[input.index()].consumers.push(id);
        }

        self.operators.push(op);
        Ok(id)
    }

    /// Replace an operator's inputs, keeping consumer lists in sync.
    ///
    /// Each old input drops one consumer entry for `id`; each new input gains
    /// one.
    pub fn replace_inputs(&mut self, id: OperatorId, inputs: Vec<OperandId>) -> Result<()> {
        for &input in &inputs {
            self.operand(input)?;
        }

        let old_inputs = std::mem::take(&mut self.operator_mut(id)?.inputs);
        for input in old_inputs {
            let consumers = &mut self.operands[input.index()].consumers;
            if let Some(pos) = consumers.iter().position(|&c| c == id) {
                consumers.remove(pos);
            }
        }

        for &input in &inputs {
            self.operands[input.index()].consumers.push(id);
        }
        self.operators[id.index()].inputs = inputs;

        Ok(())
    }

    // ── Graph queries ──

    /// Check that producer and consumer links agree with operator inputs and
    /// outputs.
    ///
    /// For every operand, the consumer list must equal (as a multiset) the
    /// input slots referencing it, and the producer must list it as an
    /// output.
    pub fn check_links(&self) -> Result<()> {
        let mut expected: Vec<BTreeMap<OperatorId, usize>> =
            vec![BTreeMap::new(); self.operands.len()];

        for (op_id, op) in self.operators() {
            for &input in &op.inputs {
                self.operand(input)?;
                *expected[input.index()].entry(op_id).or_default() += 1;
            }
            for &output in &op.outputs {
                let operand = self.operand(output)?;
                if operand.producer != Some(op_id) {
                    return Err(Error::InvalidGraph(format!(
                        "Operand '{}' is an output of operator '{}' but its producer is {:?}",
                        operand.name, op.name, operand.producer
                    )));
                }
            }
        }

        for (operand_id, operand) in self.operands() {
            let mut actual: BTreeMap<OperatorId, usize> = BTreeMap::new();
            for &consumer in &operand.consumers {
                *actual.entry(consumer).or_default() += 1;
            }
            if actual != expected[operand_id.index()] {
                return Err(Error::InvalidGraph(format!(
                    "Consumer list of operand '{}' is out of sync: recorded {:?}, expected {:?}",
                    operand.name, actual, expected[operand_id.index()]
                )));
            }
        }

        Ok(())
    }
}

// ─────────────────────────────── Operator ────────────────────────────────

/// A graph node representing one traced operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    /// Operator kind.
    pub kind: OpKind,

    /// Operator name (may be empty).
    pub name: String,

    /// Input operand IDs, in call order.
    pub inputs: Vec<OperandId>,

    /// Output operand IDs. The operator is the producer of each.
    pub outputs: Vec<OperandId>,

    /// Scalar and array parameters.
    pub params: BTreeMap<String, Parameter>,

    /// Constant attributes (e.g. traced weights).
    pub attrs: BTreeMap<String, Attribute>,
}

impl Operator {
    /// Create a new operator with no inputs, outputs or parameters.
    pub fn new(kind: impl Into<OpKind>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Get the operator kind.
    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    /// Get the input at `index`.
    pub fn input(&self, index: usize) -> Result<OperandId> {
        self.inputs.get(index).copied().ok_or_else(|| {
            Error::Arity(format!(
                "Operator '{}' ({}) has no input #{} (has {})",
                self.name,
                self.kind,
                index,
                self.inputs.len()
            ))
        })
    }

    /// Get the output at `index`.
    pub fn output(&self, index: usize) -> Result<OperandId> {
        self.outputs.get(index).copied().ok_or_else(|| {
            Error::Arity(format!(
                "Operator '{}' ({}) has no output #{} (has {})",
                self.name,
                self.kind,
                index,
                self.outputs.len()
            ))
        })
    }

    /// Add an input operand.
    pub fn add_input(&mut self, operand: OperandId) {
        self.inputs.push(operand);
    }

    /// Add an output operand.
    pub fn add_output(&mut self, operand: OperandId) {
        self.outputs.push(operand);
    }

    /// Set a parameter.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<Parameter>) {
        self.params.insert(key.into(), value.into());
    }

    /// Get a parameter.
    pub fn param(&self, key: &str) -> Option<&Parameter> {
        self.params.get(key)
    }

    /// Set an attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: Attribute) {
        self.attrs.insert(key.into(), value);
    }
}

// ──────────────────────────────── Operand ────────────────────────────────

/// A named value flowing between operators.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    /// Operand name (unique in well-formed traces, but not relied upon).
    pub name: String,

    producer: Option<OperatorId>,

    consumers: Vec<OperatorId>,
}

impl Operand {
    fn new(name: String) -> Self {
        Self {
            name,
            producer: None,
            consumers: Vec::new(),
        }
    }

    /// Producing operator, if one has been added.
    pub fn producer(&self) -> Option<OperatorId> {
        self.producer
    }

    /// Consuming operators, one entry per referencing input slot.
    pub fn consumers(&self) -> &[OperatorId] {
        &self.consumers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unary(
        graph: &mut Graph,
        kind: &str,
        input: OperandId,
        out: &str,
    ) -> (OperatorId, OperandId) {
        let output = graph.add_operand(out);
        let mut op = Operator::new(kind, out);
        op.add_input(input);
        op.add_output(output);
        (graph.add_operator(op).unwrap(), output)
    }

    fn input(graph: &mut Graph, name: &str) -> OperandId {
        let operand = graph.add_operand(name);
        let mut op = Operator::new(OpKind::Input, name);
        op.add_output(operand);
        graph.add_operator(op).unwrap();
        operand
    }

    #[test]
    fn test_create_empty_graph() {
        let graph = Graph::new();
        assert_eq!(graph.operator_count(), 0);
        assert_eq!(graph.operand_count(), 0);
        assert!(graph.check_links().is_ok());
    }

    #[test]
    fn test_add_operator_links() {
        let mut graph = Graph::new();
        let x = input(&mut graph, "x");
        let (abs_id, y) = unary(&mut graph, "aten::abs", x, "y");

        assert_eq!(graph.operator_count(), 2);
        assert_eq!(graph.producer(y).unwrap(), abs_id);
        assert_eq!(graph.consumers(x).unwrap(), &[abs_id]);
        assert!(graph.consumers(y).unwrap().is_empty());
        assert_eq!(graph.operand_by_name("y"), Some(y));
        assert!(graph.check_links().is_ok());
    }

    #[test]
    fn test_second_producer_rejected() {
        let mut graph = Graph::new();
        let x = input(&mut graph, "x");

        let mut op = Operator::new(OpKind::Input, "again");
        op.add_output(x);
        assert!(graph.add_operator(op).is_err());
        assert_eq!(graph.operator_count(), 1);
    }

    #[test]
    fn test_unknown_input_rejected() {
        let mut graph = Graph::new();
        let mut op = Operator::new("aten::neg", "neg");
        op.add_input(OperandId(7));
        assert!(graph.add_operator(op).is_err());
    }

    #[test]
    fn test_missing_producer() {
        let mut graph = Graph::new();
        let dangling = graph.add_operand("dangling");
        assert!(graph.producer(dangling).is_err());
    }

    #[test]
    fn test_replace_inputs_keeps_links() {
        let mut graph = Graph::new();
        let a = input(&mut graph, "a");
        let b = input(&mut graph, "b");

        let out = graph.add_operand("out");
        let mut mul = Operator::new("aten::mul", "mul");
        mul.add_input(a);
        mul.add_input(a);
        mul.add_output(out);
        let mul_id = graph.add_operator(mul).unwrap();
        assert_eq!(graph.consumers(a).unwrap(), &[mul_id, mul_id]);

        graph.replace_inputs(mul_id, vec![b, a]).unwrap();

        assert_eq!(graph.consumers(a).unwrap(), &[mul_id]);
        assert_eq!(graph.consumers(b).unwrap(), &[mul_id]);
        assert_eq!(graph.operator(mul_id).unwrap().inputs, vec![b, a]);
        assert!(graph.check_links().is_ok());
    }

    #[test]
    fn test_check_links_detects_desync() {
        let mut graph = Graph::new();
        let x = input(&mut graph, "x");
        let (abs_id, _) = unary(&mut graph, "aten::abs", x, "y");

        graph.operator_mut(abs_id).unwrap().inputs.clear();
        assert!(graph.check_links().is_err());
    }

    #[test]
    fn test_operator_accessors() {
        let mut op = Operator::new("prim::Constant", "c");
        op.set_param("value", 3i64);
        assert_eq!(op.kind(), &OpKind::Constant);
        assert_eq!(op.param("value"), Some(&Parameter::Int(3)));
        assert!(op.input(0).is_err());
        assert!(op.output(0).is_err());
    }
}
