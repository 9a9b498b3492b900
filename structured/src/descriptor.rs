//! Declarative schema of a structured operation.

use tessel_ir::{AffineMap, ConstValue};

/// Documentation attached to a generated operation.
#[derive(Debug, Clone, Default)]
pub struct OpDoc {
    pub summary: String,
    pub description: String,
}

impl OpDoc {
    pub fn new(summary: impl Into<String>, description: impl Into<String>) -> Self {
        Self { summary: summary.into(), description: description.into() }
    }
}

/// Role of a declared operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum OperandRole {
    /// Shaped value operand, read in the region body.
    Input,
    /// Shaped value operand, written by the region body's yield.
    Output,
    /// Rectangular integer-array attribute binding indexing-map symbols.
    IndexAttribute,
}

/// Per-dimension iteration semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum IteratorType {
    Parallel,
    Reduction,
}

/// One declared operand.
///
/// The operand's indexing map lives in
/// [`StructuredOpDescriptor::indexing_maps`] at the same position. For an
/// `IndexAttribute` operand that map only projects symbols; its results
/// enumerate, in order, the symbols the attribute's elements bind.
#[derive(Debug, Clone, bon::Builder)]
pub struct OperandDef {
    #[builder(into)]
    pub name: String,
    pub role: OperandRole,
    /// Type variable naming this operand's element type.
    #[builder(into)]
    pub element_type_var: Option<String>,
}

/// Scalar-expression tree describing a per-element computation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    /// Reference to a named operand's block argument.
    Arg(String),
    /// Literal constant.
    Const(ConstValue),
    /// Current iteration index of one iteration dimension.
    Index(usize),
    /// Signed or unsigned conversion to the type a variable resolves to.
    Cast { signed: bool, type_var: String, operand: Box<ScalarExpr> },
    /// Application of a named scalar function.
    Apply { func: String, operands: Vec<ScalarExpr> },
}

impl ScalarExpr {
    pub fn arg(name: impl Into<String>) -> Self {
        Self::Arg(name.into())
    }

    pub fn constant(value: ConstValue) -> Self {
        Self::Const(value)
    }

    pub fn index(dim: usize) -> Self {
        Self::Index(dim)
    }

    pub fn cast_signed(type_var: impl Into<String>, operand: ScalarExpr) -> Self {
        Self::Cast { signed: true, type_var: type_var.into(), operand: operand.into() }
    }

    pub fn cast_unsigned(type_var: impl Into<String>, operand: ScalarExpr) -> Self {
        Self::Cast { signed: false, type_var: type_var.into(), operand: operand.into() }
    }

    pub fn apply(func: impl Into<String>, operands: impl IntoIterator<Item = ScalarExpr>) -> Self {
        Self::Apply { func: func.into(), operands: operands.into_iter().collect() }
    }
}

/// One output assignment: `output = value`.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub output: String,
    pub value: ScalarExpr,
}

impl Assignment {
    pub fn new(output: impl Into<String>, value: ScalarExpr) -> Self {
        Self { output: output.into(), value }
    }
}

/// Declarative schema of one structured operation.
#[derive(Debug, Clone, bon::Builder)]
pub struct StructuredOpDescriptor {
    #[builder(into)]
    pub name: String,
    /// Generated type name, used in emitted declarations.
    #[builder(into)]
    pub class_name: String,
    #[builder(default)]
    pub doc: OpDoc,
    pub operands: Vec<OperandDef>,
    /// One affine map per operand, over a shared iteration space.
    pub indexing_maps: Vec<AffineMap>,
    /// One tag per iteration dimension.
    pub iterator_types: Vec<IteratorType>,
    /// One scalar-expression tree per output operand.
    pub assignments: Vec<Assignment>,
}

impl StructuredOpDescriptor {
    pub fn operand_named(&self, name: &str) -> Option<(usize, &OperandDef)> {
        self.operands.iter().enumerate().find(|(_, o)| o.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (usize, &OperandDef)> {
        self.operands.iter().enumerate().filter(|(_, o)| o.role == OperandRole::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (usize, &OperandDef)> {
        self.operands.iter().enumerate().filter(|(_, o)| o.role == OperandRole::Output)
    }

    pub fn index_attributes(&self) -> impl Iterator<Item = (usize, &OperandDef)> {
        self.operands.iter().enumerate().filter(|(_, o)| o.role == OperandRole::IndexAttribute)
    }

    /// Value operands (inputs then outputs is NOT implied here; this is
    /// declaration order filtered to runtime operands).
    pub fn value_operands(&self) -> impl Iterator<Item = (usize, &OperandDef)> {
        self.operands.iter().enumerate().filter(|(_, o)| o.role != OperandRole::IndexAttribute)
    }

    /// Full operation name under the `structured` dialect.
    pub fn op_name(&self) -> String {
        format!("structured.{}", self.name)
    }
}
