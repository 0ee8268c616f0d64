//! Operator kinds recognised by the traced-graph passes.
//!
//! Traced graphs name operators by their TorchScript type (`aten::mul`,
//! `prim::Constant`, ...). `OpKind` turns those names into a closed
//! enumeration so that every pass dispatches on the same set of kinds, with
//! one catch-all arm for operators no pass knows about.

use std::fmt;

/// Elementwise math operators taking a single input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Abs,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atanh,
    Ceil,
    Cos,
    Cosh,
    Exp,
    Floor,
    Log,
    Neg,
    Reciprocal,
    Rsqrt,
    Sign,
    Sin,
    Sinh,
    Sqrt,
    Square,
    Tan,
    Tanh,
    Trunc,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 24] = [
        UnaryOp::Abs,
        UnaryOp::Acos,
        UnaryOp::Acosh,
        UnaryOp::Asin,
        UnaryOp::Asinh,
        UnaryOp::Atan,
        UnaryOp::Atanh,
        UnaryOp::Ceil,
        UnaryOp::Cos,
        UnaryOp::Cosh,
        UnaryOp::Exp,
        UnaryOp::Floor,
        UnaryOp::Log,
        UnaryOp::Neg,
        UnaryOp::Reciprocal,
        UnaryOp::Rsqrt,
        UnaryOp::Sign,
        UnaryOp::Sin,
        UnaryOp::Sinh,
        UnaryOp::Sqrt,
        UnaryOp::Square,
        UnaryOp::Tan,
        UnaryOp::Tanh,
        UnaryOp::Trunc,
    ];

    /// Bare operator name, without the `aten::` namespace.
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Abs => "abs",
            UnaryOp::Acos => "acos",
            UnaryOp::Acosh => "acosh",
            UnaryOp::Asin => "asin",
            UnaryOp::Asinh => "asinh",
            UnaryOp::Atan => "atan",
            UnaryOp::Atanh => "atanh",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Cos => "cos",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Exp => "exp",
            UnaryOp::Floor => "floor",
            UnaryOp::Log => "log",
            UnaryOp::Neg => "neg",
            UnaryOp::Reciprocal => "reciprocal",
            UnaryOp::Rsqrt => "rsqrt",
            UnaryOp::Sign => "sign",
            UnaryOp::Sin => "sin",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Square => "square",
            UnaryOp::Tan => "tan",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Trunc => "trunc",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Elementwise math operators taking two inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Atan2,
    Div,
    FloorDivide,
    Mul,
    Pow,
    Remainder,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 6] = [
        BinaryOp::Atan2,
        BinaryOp::Div,
        BinaryOp::FloorDivide,
        BinaryOp::Mul,
        BinaryOp::Pow,
        BinaryOp::Remainder,
    ];

    /// Bare operator name, without the `aten::` namespace.
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Atan2 => "atan2",
            BinaryOp::Div => "div",
            BinaryOp::FloorDivide => "floor_divide",
            BinaryOp::Mul => "mul",
            BinaryOp::Pow => "pow",
            BinaryOp::Remainder => "remainder",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Boolean/bitwise binary operators (`aten::__and__` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

impl LogicalOp {
    /// Normalized name used in expression text.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
            LogicalOp::Xor => "xor",
        }
    }

    fn from_dunder(name: &str) -> Option<Self> {
        match name {
            "__and__" => Some(LogicalOp::And),
            "__or__" => Some(LogicalOp::Or),
            "__xor__" => Some(LogicalOp::Xor),
            _ => None,
        }
    }
}

/// Number of inputs an operator kind expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    /// Check whether `count` inputs satisfy this arity.
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Kind of a graph operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Graph input boundary (`pnnx.Input`).
    Input,

    /// Graph output boundary (`pnnx.Output`).
    Output,

    /// Fused scalar/elementwise expression (`pnnx.Expression`), carrying its
    /// formula in the `expr` parameter.
    Expression,

    /// Literal constant (`prim::Constant`), value in the `value` parameter.
    Constant,

    /// Scalar to tensor wrap (`prim::NumToTensor`).
    NumToTensor,

    /// List construction (`prim::ListConstruct`).
    ListConstruct,

    /// Dimension size query (`aten::size`).
    Size,

    /// Integer coercion (`aten::Int`).
    Int,

    /// Type cast (`aten::to`); only the first input is data.
    To,

    /// Autograd detach (`aten::detach`).
    Detach,

    /// Tensor to scalar extraction (`aten::ScalarImplicit`).
    ScalarImplicit,

    Unary(UnaryOp),

    Binary(BinaryOp),

    Logical(LogicalOp),

    /// `aten::add(value, other, alpha)`.
    Add,

    /// `aten::sub(value, other, alpha)`.
    Sub,

    /// `aten::rsub(value, other, alpha)`, i.e. `other * alpha - value`.
    Rsub,

    /// Any operator without dedicated handling, keeping its type name.
    Other(String),
}

impl OpKind {
    /// Parse a traced operator type name.
    ///
    /// Unknown names map to [`OpKind::Other`].
    pub fn parse(type_name: &str) -> Self {
        match type_name {
            "pnnx.Input" => return OpKind::Input,
            "pnnx.Output" => return OpKind::Output,
            "pnnx.Expression" => return OpKind::Expression,
            "prim::Constant" => return OpKind::Constant,
            "prim::NumToTensor" => return OpKind::NumToTensor,
            "prim::ListConstruct" => return OpKind::ListConstruct,
            "aten::size" => return OpKind::Size,
            "aten::Int" => return OpKind::Int,
            "aten::to" => return OpKind::To,
            "aten::detach" => return OpKind::Detach,
            "aten::ScalarImplicit" => return OpKind::ScalarImplicit,
            "aten::add" => return OpKind::Add,
            "aten::sub" => return OpKind::Sub,
            "aten::rsub" => return OpKind::Rsub,
            _ => {}
        }

        if let Some(name) = type_name.strip_prefix("aten::") {
            if let Some(op) = UnaryOp::from_name(name) {
                return OpKind::Unary(op);
            }
            if let Some(op) = BinaryOp::from_name(name) {
                return OpKind::Binary(op);
            }
            if let Some(op) = LogicalOp::from_dunder(name) {
                return OpKind::Logical(op);
            }
        }

        OpKind::Other(type_name.to_string())
    }

    /// Input arity the passes rely on for this kind.
    pub fn arity(&self) -> Arity {
        match self {
            OpKind::Input | OpKind::Constant => Arity::Exact(0),
            OpKind::NumToTensor | OpKind::Int | OpKind::Detach | OpKind::Unary(_) => {
                Arity::Exact(1)
            }
            OpKind::To | OpKind::ScalarImplicit => Arity::AtLeast(1),
            OpKind::Size | OpKind::Binary(_) | OpKind::Logical(_) => Arity::Exact(2),
            OpKind::Add | OpKind::Sub | OpKind::Rsub => Arity::Exact(3),
            OpKind::Output | OpKind::Expression | OpKind::ListConstruct | OpKind::Other(_) => {
                Arity::Any
            }
        }
    }

    /// Check whether expression fusion rewrites operators of this kind.
    ///
    /// This is the only definition of the fusable set: the fusion driver
    /// scans for these kinds and the expression builder expands exactly
    /// these kinds.
    pub fn is_fusable(&self) -> bool {
        match self {
            OpKind::Constant
            | OpKind::NumToTensor
            | OpKind::ListConstruct
            | OpKind::Size
            | OpKind::Int
            | OpKind::To
            | OpKind::Detach
            | OpKind::ScalarImplicit
            | OpKind::Unary(_)
            | OpKind::Binary(_)
            | OpKind::Logical(_)
            | OpKind::Add
            | OpKind::Sub
            | OpKind::Rsub => true,
            OpKind::Input | OpKind::Output | OpKind::Expression | OpKind::Other(_) => false,
        }
    }

    /// Function name used for this kind in expression text.
    ///
    /// `None` for kinds that are written inline (constants, lists, casts) or
    /// never expanded.
    pub fn expression_name(&self) -> Option<&'static str> {
        match self {
            OpKind::Size => Some("size"),
            OpKind::Int => Some("int"),
            OpKind::Unary(op) => Some(op.name()),
            OpKind::Binary(op) => Some(op.name()),
            OpKind::Logical(op) => Some(op.name()),
            OpKind::Add => Some("add"),
            OpKind::Sub | OpKind::Rsub => Some("sub"),
            _ => None,
        }
    }
}

impl From<&str> for OpKind {
    fn from(type_name: &str) -> Self {
        OpKind::parse(type_name)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Input => f.write_str("pnnx.Input"),
            OpKind::Output => f.write_str("pnnx.Output"),
            OpKind::Expression => f.write_str("pnnx.Expression"),
            OpKind::Constant => f.write_str("prim::Constant"),
            OpKind::NumToTensor => f.write_str("prim::NumToTensor"),
            OpKind::ListConstruct => f.write_str("prim::ListConstruct"),
            OpKind::Size => f.write_str("aten::size"),
            OpKind::Int => f.write_str("aten::Int"),
            OpKind::To => f.write_str("aten::to"),
            OpKind::Detach => f.write_str("aten::detach"),
            OpKind::ScalarImplicit => f.write_str("aten::ScalarImplicit"),
            OpKind::Unary(op) => write!(f, "aten::{}", op.name()),
            OpKind::Binary(op) => write!(f, "aten::{}", op.name()),
            OpKind::Logical(op) => write!(f, "aten::__{}__", op.name()),
            OpKind::Add => f.write_str("aten::add"),
            OpKind::Sub => f.write_str("aten::sub"),
            OpKind::Rsub => f.write_str("aten::rsub"),
            OpKind::Other(name) => f.write_str(name),
        }
    }
}
