//! Expression text builder.
//!
//! Expands the value of an operand into a compact formula by walking its
//! producers backwards. Scalar helper operators (constants, size queries,
//! casts, elementwise math) are written inline; every other value becomes a
//! slot reference `@N`, where `N` indexes the list of external inputs.
//!
//! ```text
//! literal := "None" | "True" | "False" | <int> | <scientific float> | <string>
//! slot    := "@" <index>
//! call    := <name> "(" expr {"," expr} ")"
//! list    := "[" [expr {"," expr}] "]"
//! ```

use std::collections::{HashMap, HashSet};

use tracefuse_core::{Error, Graph, OpKind, OperandId, Operator, Parameter, Result};

use crate::classify::{constant_value, is_foldable, may_be_tensor};

/// Formula text for one operand plus the operands its slots refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedExpression {
    /// Expression text.
    pub expr: String,

    /// External inputs; `inputs[i]` is the operand referenced by `@i`.
    pub inputs: Vec<OperandId>,
}

/// Ordered, deduplicated table of external inputs.
///
/// Slots are numbered densely in first-reference order and keyed on operand
/// identity, never on operand name.
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    inputs: Vec<OperandId>,
    index: HashMap<OperandId, usize>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the slot of `operand`, assigning the next free slot on first use.
    pub fn slot(&mut self, operand: OperandId) -> usize {
        if let Some(&slot) = self.index.get(&operand) {
            return slot;
        }
        let slot = self.inputs.len();
        self.inputs.push(operand);
        self.index.insert(operand, slot);
        slot
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Consume the table, returning operands in slot order.
    pub fn into_inputs(self) -> Vec<OperandId> {
        self.inputs
    }
}

/// Builds expression text for operands of a graph.
pub struct ExpressionBuilder<'a> {
    graph: &'a Graph,
    foldable_names: &'a HashSet<String>,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn new(graph: &'a Graph, foldable_names: &'a HashSet<String>) -> Self {
        Self {
            graph,
            foldable_names,
        }
    }

    /// Build the expression for `operand`.
    ///
    /// The operand itself is always expanded, even when it has several
    /// consumers. Values below it are expanded only while that is safe: a
    /// possibly-tensor value that is shared with other consumers, or that
    /// constant folding will collapse later, becomes a slot.
    pub fn build(&self, operand: OperandId) -> Result<FusedExpression> {
        let mut expr = String::new();
        let mut slots = SlotTable::new();
        self.emit(operand, &mut expr, &mut slots, false)?;

        Ok(FusedExpression {
            expr,
            inputs: slots.into_inputs(),
        })
    }

    fn emit(
        &self,
        operand: OperandId,
        out: &mut String,
        slots: &mut SlotTable,
        check_subgraph: bool,
    ) -> Result<()> {
        let op = self.graph.operator(self.graph.producer(operand)?)?;

        if check_subgraph
            && may_be_tensor(self.graph, operand)?
            && (self.is_branching(op)? || is_foldable(self.graph, operand, self.foldable_names)?)
        {
            push_slot(out, slots, operand);
            return Ok(());
        }

        match op.kind() {
            OpKind::Constant => match constant_value(op)? {
                Parameter::None => out.push_str("None"),
                Parameter::Bool(b) => out.push_str(if *b { "True" } else { "False" }),
                Parameter::Int(i) => out.push_str(&i.to_string()),
                Parameter::Float(f) => out.push_str(&format_scientific(*f)),
                Parameter::String(s) => out.push_str(s),
                _ => push_slot(out, slots, operand),
            },
            OpKind::NumToTensor | OpKind::To | OpKind::Detach | OpKind::ScalarImplicit => {
                self.emit(op.input(0)?, out, slots, true)?;
            }
            OpKind::ListConstruct => {
                out.push('[');
                for (i, &input) in op.inputs.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.emit(input, out, slots, true)?;
                }
                out.push(']');
            }
            OpKind::Int | OpKind::Unary(_) => self.emit_call(op, 1, out, slots)?,
            OpKind::Size | OpKind::Binary(_) | OpKind::Logical(_) => {
                self.emit_call(op, 2, out, slots)?
            }
            OpKind::Add | OpKind::Sub => {
                out.push_str(call_name(op)?);
                out.push('(');
                self.emit(op.input(0)?, out, slots, true)?;
                out.push(',');
                out.push_str(&self.scaled_other(op, slots)?);
                out.push(')');
            }
            OpKind::Rsub => {
                let scaled = self.scaled_other(op, slots)?;
                out.push_str("sub(");
                out.push_str(&scaled);
                out.push(',');
                self.emit(op.input(0)?, out, slots, true)?;
                out.push(')');
            }
            OpKind::Input | OpKind::Output | OpKind::Expression | OpKind::Other(_) => {
                push_slot(out, slots, operand);
            }
        }

        Ok(())
    }

    /// Check whether a value from `op` is also needed outside this expression.
    fn is_branching(&self, op: &Operator) -> Result<bool> {
        Ok(op.outputs.len() > 1 || self.graph.consumers(op.output(0)?)?.len() > 1)
    }

    /// Emit `name(in0, ..., in{arity-1})`.
    fn emit_call(
        &self,
        op: &Operator,
        arity: usize,
        out: &mut String,
        slots: &mut SlotTable,
    ) -> Result<()> {
        out.push_str(call_name(op)?);
        out.push('(');
        for index in 0..arity {
            if index > 0 {
                out.push(',');
            }
            self.emit(op.input(index)?, out, slots, true)?;
        }
        out.push(')');
        Ok(())
    }

    /// Build the `other * alpha` term of add/sub/rsub, dropping a unit alpha.
    fn scaled_other(&self, op: &Operator, slots: &mut SlotTable) -> Result<String> {
        let mut other = String::new();
        let mut alpha = String::new();
        self.emit(op.input(1)?, &mut other, slots, true)?;
        self.emit(op.input(2)?, &mut alpha, slots, true)?;

        if alpha == "1" {
            Ok(other)
        } else {
            Ok(format!("mul({other},{alpha})"))
        }
    }
}

fn call_name(op: &Operator) -> Result<&'static str> {
    op.kind().expression_name().ok_or_else(|| {
        Error::InvalidGraph(format!(
            "Operator '{}' ({}) has no expression form",
            op.name,
            op.kind()
        ))
    })
}

fn push_slot(out: &mut String, slots: &mut SlotTable, operand: OperandId) {
    let slot = slots.slot(operand);
    out.push('@');
    out.push_str(&slot.to_string());
}

/// Format a float in C `%e` style: six fraction digits and a signed,
/// at least two-digit exponent (`1.500000e+00`).
pub fn format_scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let formatted = format!("{value:.6e}");
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}
