//! Common imports for working with the IR.
//!
//! ```rust,ignore
//! use tessel_ir::prelude::*;
//! ```

pub use crate::affine::{AffineExpr, AffineMap};
pub use crate::attr::{AttrDescriptor, AttrDescriptorRef, AttrRef, AttrValue, ElementRepr, ParamType};
pub use crate::context::Context;
pub use crate::op::{Block, BlockBuilder, OpBuilder, OpName, Operation, Region, Value};
pub use crate::pattern::{MatchFailure, MatchResult, PatternSet, Rewrite, RewritePattern};
pub use crate::rewrite::apply_patterns;
pub use crate::types::{ConstValue, FragmentKind, Type, TypeKind};

// Re-exports from dependencies
pub use tessel_dtype::{AddrSpace, DType, ScalarDType};
