//! Core IR for the Tessel compiler framework.
//!
//! This crate defines the structural layer every dialect builds on: an
//! interning [`Context`] that owns canonical attribute and type instances,
//! the declarative attribute descriptor model, affine maps, the generic
//! [`Operation`] container, and the pattern rewrite driver.
//!
//! # Module Organization
//!
//! - [`context`] - Interning context (attribute instance store, type store)
//! - [`attr`] - Attribute descriptors, instances, element/sub-element views
//! - [`types`] - Interned IR value types and compile-time constant values
//! - [`affine`] - Affine expressions and maps with symbol substitution
//! - [`op`] - Generic operation container, values, blocks and builders
//! - [`pattern`] - Rewrite pattern interface and name-indexed pattern sets
//! - [`rewrite`] - Fixed-point rewrite driver over blocks
//! - [`diagnostics`] - Per-context diagnostic sink
//! - [`error`] - Error taxonomy (definition / construction / verification)

pub mod affine;
pub mod attr;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod op;
pub mod pattern;
pub mod prelude;
pub mod rewrite;
pub mod types;

#[cfg(any(test, feature = "proptest"))]
pub mod test;

pub use affine::{AffineExpr, AffineMap};
pub use attr::{
    AttrDescriptor, AttrDescriptorRef, AttrInstance, AttrRef, AttrTraitSet, AttrValue, ElementRepr, ElementSpec,
    ParamSpec, ParamType,
};
pub use context::Context;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{ConstructionError, DefinitionError, VerificationError};
pub use op::{Block, BlockBuilder, OpBuilder, OpName, Operation, Region, Value};
pub use pattern::{MatchFailure, MatchResult, PatternSet, Rewrite, RewritePattern, pattern};
pub use rewrite::{RewriteOutcome, apply_patterns};
pub use types::{ConstValue, ConstValueHash, FragmentKind, Type, TypeKind};

// Re-export element types for convenience
pub use tessel_dtype::{AddrSpace, DType, ScalarDType};
