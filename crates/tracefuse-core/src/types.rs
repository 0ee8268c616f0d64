//! Core types for operator parameters and constant attributes.

/// Element type of a constant attribute payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    F32,
    F64,
    F16,
    I64,
    I32,
    I8,
    U8,
    Bool,
}

/// Discriminant of a [`Parameter`], as seen by the fusion passes.
///
/// The first five kinds are scalar literals that may be written inline into
/// an expression. `Other` covers every non-scalar constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    None,
    Bool,
    Int,
    Float,
    String,
    Other,
}

/// A tagged operator parameter value.
///
/// Traced graphs carry scalar constants (`prim::Constant` values, rounding
/// modes, dtype codes) as parameters. Arrays and embedded tensors are also
/// parameters, but they are never written into expression text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Parameter {
    /// Explicit `None`.
    #[default]
    None,

    Bool(bool),

    Int(i64),

    Float(f64),

    /// Raw string, emitted without quoting.
    String(String),

    Ints(Vec<i64>),

    Floats(Vec<f64>),

    Strings(Vec<String>),

    /// Tensor-valued constant; the payload lives in the operator's attributes.
    Tensor,
}

impl Parameter {
    /// Get the kind of this parameter.
    pub fn kind(&self) -> ParameterKind {
        match self {
            Parameter::None => ParameterKind::None,
            Parameter::Bool(_) => ParameterKind::Bool,
            Parameter::Int(_) => ParameterKind::Int,
            Parameter::Float(_) => ParameterKind::Float,
            Parameter::String(_) => ParameterKind::String,
            Parameter::Ints(_) | Parameter::Floats(_) | Parameter::Strings(_) | Parameter::Tensor => {
                ParameterKind::Other
            }
        }
    }

    /// Check whether this is one of the five scalar literal kinds.
    pub fn is_literal(&self) -> bool {
        self.kind() != ParameterKind::Other
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Parameter::Bool(value)
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Parameter::Int(value)
    }
}

impl From<i32> for Parameter {
    fn from(value: i32) -> Self {
        Parameter::Int(value.into())
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Parameter::Float(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::String(value.to_string())
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Parameter::String(value)
    }
}

impl From<Vec<i64>> for Parameter {
    fn from(value: Vec<i64>) -> Self {
        Parameter::Ints(value)
    }
}

impl From<Vec<f64>> for Parameter {
    fn from(value: Vec<f64>) -> Self {
        Parameter::Floats(value)
    }
}

/// Opaque constant attribute attached to an operator (e.g. a traced weight).
///
/// Expression fusion never looks inside attributes; it only clears them when
/// an operator is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub dtype: DataType,
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
}

impl Attribute {
    pub fn new(dtype: DataType, shape: Vec<usize>, data: Vec<u8>) -> Self {
        Self { dtype, shape, data }
    }
}
