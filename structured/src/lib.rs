//! Structured-operation descriptors and their code generator.
//!
//! A [`StructuredOpDescriptor`] declaratively describes an operation over
//! shaped operands: named operands tagged Input/Output/IndexAttribute,
//! per-operand affine indexing maps over a shared iteration space, iterator
//! types, and one scalar-expression tree per output describing the
//! per-element computation.
//!
//! [`generate`] turns a descriptor into a [`GeneratedOp`]: the argument
//! contract, a builder that wires operand segments, static/dynamic
//! indexing-map accessors, a per-instance verifier and a region body
//! builder. Generation is pure and deterministic; every definition-time
//! invariant is checked up front so instances never hit them.

pub mod descriptor;
pub mod generate;
pub mod region;

#[cfg(test)]
mod test;

pub use descriptor::{
    Assignment, IteratorType, OpDoc, OperandDef, OperandRole, ScalarExpr, StructuredOpDescriptor,
};
pub use generate::{ArgumentContract, GeneratedOp, IndexAttrDecl, generate};
pub use region::{ScalarFnRegistry, TypeBindings};
